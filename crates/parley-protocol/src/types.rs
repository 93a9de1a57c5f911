//! Envelope types: the structures that travel inside each frame.
//!
//! Every message between a client and the relay is one [`Envelope`]. The
//! [`MessageKind`] tag decides which of the other fields carry meaning:
//!
//! | kind      | `from`            | `to`       | `body`                 |
//! |-----------|-------------------|------------|------------------------|
//! | `join`    | desired name      | -          | -                      |
//! | `leave`   | -                 | -          | -                      |
//! | `chat`    | sender (server)   | -          | text                   |
//! | `pm`      | sender (server)   | recipient  | text                   |
//! | `system`  | empty             | -          | notice text            |
//! | `roster`  | empty             | -          | comma-joined names     |
//!
//! "sender (server)" means the relay overwrites whatever the client put
//! there with the authoritative session name.

// Serde does the heavy lifting: `Serialize`/`Deserialize` derive the
// JSON mapping, and field attributes below tune the wire shape.
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The kind tag carried by every envelope.
///
/// On the wire these are short lowercase strings (`"chat"`, `"pm"`, ...).
/// `#[serde(alias = ...)]` lets the decoder also accept the spellings older
/// clients used (`"msg"`, `"sys"`, `"users"`), while encoding always emits
/// the canonical name.
///
/// A kind string that matches nothing here fails deserialization, so the
/// whole envelope is rejected. Unknown kinds are never coerced into a
/// known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// First envelope of every session; `from` is the desired name.
    Join,

    /// The client is leaving voluntarily.
    Leave,

    /// Broadcast chat text.
    #[serde(alias = "msg")]
    Chat,

    /// Directed message to the session named in `to`.
    #[serde(rename = "pm")]
    PrivateMessage,

    /// Server-originated notice (joins, departures, routing errors).
    #[serde(alias = "sys")]
    System,

    /// Server-originated list of the names currently online.
    #[serde(rename = "roster", alias = "users")]
    RosterUpdate,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 6] = [
        MessageKind::Join,
        MessageKind::Leave,
        MessageKind::Chat,
        MessageKind::PrivateMessage,
        MessageKind::System,
        MessageKind::RosterUpdate,
    ];

    /// Returns the canonical wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
            MessageKind::Chat => "chat",
            MessageKind::PrivateMessage => "pm",
            MessageKind::System => "system",
            MessageKind::RosterUpdate => "roster",
        }
    }

    /// Returns `true` for kinds only the server may originate.
    pub fn is_server_only(self) -> bool {
        matches!(self, MessageKind::System | MessageKind::RosterUpdate)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One logical message exchanged over the relay.
///
/// Only `kind` is required on the wire. Every other field falls back to
/// its empty value when missing (or `null`), and unknown fields are
/// ignored, so newer clients can add fields without breaking the relay.
///
/// `timestamp` is seconds since the Unix epoch. The relay stamps it on
/// everything it sends; whatever a client supplies is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// What this envelope is. Accepts `type` as an input alias.
    #[serde(alias = "type")]
    pub kind: MessageKind,

    /// Sender display name. Empty for server-originated envelopes.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub from: String,

    /// Recipient display name, only meaningful for private messages.
    ///
    /// `skip_serializing_if` keeps it off the wire when empty, which is
    /// every kind except `pm`.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "String::is_empty"
    )]
    pub to: String,

    /// Message text. Accepts `text` and `message` as input aliases.
    #[serde(
        default,
        alias = "text",
        alias = "message",
        deserialize_with = "null_as_empty"
    )]
    pub body: String,

    /// Send time in Unix seconds. Accepts `ts` as an input alias.
    #[serde(default, alias = "ts")]
    pub timestamp: i64,
}

/// Treats an explicit JSON `null` the same as a missing string field.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Envelope {
    /// Creates an empty envelope of the given kind.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            from: String::new(),
            to: String::new(),
            body: String::new(),
            timestamp: 0,
        }
    }

    /// A join request for the given desired name.
    pub fn join(name: impl Into<String>) -> Self {
        Self::new(MessageKind::Join).with_from(name)
    }

    /// A voluntary leave.
    pub fn leave() -> Self {
        Self::new(MessageKind::Leave)
    }

    /// A chat message. The relay fills in `from`.
    pub fn chat(body: impl Into<String>) -> Self {
        Self::new(MessageKind::Chat).with_body(body)
    }

    /// A private message to `to`.
    pub fn private(to: impl Into<String>, body: impl Into<String>) -> Self {
        let mut env = Self::new(MessageKind::PrivateMessage).with_body(body);
        env.to = to.into();
        env
    }

    /// A server notice.
    pub fn system(body: impl Into<String>) -> Self {
        Self::new(MessageKind::System).with_body(body)
    }

    /// A roster listing the given names, in the order given.
    pub fn roster<S: AsRef<str>>(names: &[S]) -> Self {
        let body = names
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        Self::new(MessageKind::RosterUpdate).with_body(body)
    }

    /// Sets `from`.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Sets `body`.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets `timestamp` to the current server time.
    pub fn stamped(mut self) -> Self {
        self.timestamp = now_secs();
        self
    }

    /// Splits a roster body back into names.
    pub fn roster_names(&self) -> Vec<&str> {
        self.body
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Checks the fields that `kind` makes mandatory.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] for a private message
    /// without a recipient.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.kind == MessageKind::PrivateMessage && self.to.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "private message requires a recipient".into(),
            ));
        }
        Ok(())
    }
}

/// Current wall-clock time in whole seconds since the Unix epoch.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
