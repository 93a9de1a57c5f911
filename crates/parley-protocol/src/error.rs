//! Error types for the protocol layer.
//!
//! A `ProtocolError` always concerns the *contents* of a single frame.
//! The frame boundaries themselves are the transport's business, which
//! is why a protocol error never poisons the rest of the stream: the
//! caller can drop the offending envelope and read the next frame.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an envelope into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into an envelope).
    ///
    /// Common causes: malformed JSON, invalid UTF-8, a missing or
    /// unknown `kind`.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope parsed but breaks a protocol rule, such as a
    /// private message with no recipient.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
