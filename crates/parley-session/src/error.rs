//! Error types for the session layer.

use parley_transport::ConnectionId;

/// Errors that can occur while managing a client session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session is closing or closed; nothing more can be queued.
    #[error("session {0} is closed")]
    Closed(ConnectionId),

    /// The session's outbound queue is full. The peer is not draining
    /// its socket, so the session is closed rather than stalling the
    /// sender.
    #[error("session {0} outbound queue is full")]
    Backpressure(ConnectionId),

    /// The connection didn't send its join within the configured
    /// `join_timeout`.
    #[error("session {0} did not join in time")]
    JoinTimeout(ConnectionId),

    /// A state change that the session state machine does not allow,
    /// e.g. activating a session twice.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
