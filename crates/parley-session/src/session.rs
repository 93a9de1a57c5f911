//! Session types: the server's record of one client connection.
//!
//! A session tracks:
//! - WHICH connection it belongs to (`ConnectionId`)
//! - WHAT state it's in (awaiting join, active, closed)
//! - WHO the client is, once the join has been accepted (display name)

use std::time::Duration;

use parley_transport::ConnectionId;

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
///
/// Sensible defaults are provided; override individual fields with
/// struct update syntax:
///
/// ```rust
/// use std::time::Duration;
/// use parley_session::SessionConfig;
///
/// let config = SessionConfig {
///     write_timeout: Duration::from_secs(1),
///     ..SessionConfig::default()
/// };
/// assert_eq!(config.default_name, "Anon");
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name given to clients that join with a blank name.
    pub default_name: String,

    /// Longest display name (in characters) before numeric suffixes.
    /// Longer requests are truncated.
    pub max_name_len: usize,

    /// Capacity of each session's outbound queue. A peer that falls this
    /// many envelopes behind is disconnected.
    pub outbound_capacity: usize,

    /// Upper bound on writing a single frame to a peer.
    pub write_timeout: Duration,

    /// How long a fresh connection may take to send its join.
    /// `None` waits indefinitely.
    pub join_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_name: "Anon".to_string(),
            max_name_len: 32,
            outbound_capacity: 64,
            write_timeout: Duration::from_secs(5),
            join_timeout: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle of a session.
///
/// ```text
///   AwaitingJoin ──(join accepted)──→ Active ──(close)──→ Closed
///        │                                                  ↑
///        └──────────────(eof / bad first message)───────────┘
/// ```
///
/// `Closed` is terminal. The name assigned on activation never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, but the join envelope hasn't arrived yet.
    AwaitingJoin,

    /// Joined and registered under `name`.
    Active { name: String },

    /// Done. The connection is being (or has been) torn down.
    Closed,
}

impl SessionState {
    fn label(&self) -> &'static str {
        match self {
            SessionState::AwaitingJoin => "AwaitingJoin",
            SessionState::Active { .. } => "Active",
            SessionState::Closed => "Closed",
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single client's session, owned by its connection's read loop.
#[derive(Debug, Clone)]
pub struct Session {
    id: ConnectionId,
    state: SessionState,
}

impl Session {
    /// Creates a session in [`SessionState::AwaitingJoin`].
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            state: SessionState::AwaitingJoin,
        }
    }

    /// The connection this session belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The assigned display name, once active.
    pub fn name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Active { name } => Some(name),
            _ => None,
        }
    }

    /// Moves `AwaitingJoin → Active` under the assigned name.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidTransition`] from any other state.
    pub fn activate(&mut self, name: String) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingJoin {
            return Err(SessionError::InvalidTransition {
                from: self.state.label(),
                to: "Active",
            });
        }
        self.state = SessionState::Active { name };
        Ok(())
    }

    /// Moves to `Closed`.
    ///
    /// Returns the display name only on the first close of an active
    /// session, so the caller deregisters and announces at most once.
    pub fn close(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Active { name } => Some(name),
            SessionState::AwaitingJoin | SessionState::Closed => None,
        }
    }
}
