//! Unified error type for Parley.

use parley_protocol::ProtocolError;
use parley_session::SessionError;
use parley_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `parley` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    /// A transport-level error (bind, accept, framing, socket I/O).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (closed, backpressure, bad transition).
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use parley_transport::ConnectionId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Transport(_)));
        assert!(parley_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Protocol(_)));
        assert_eq!(parley_err.to_string(), "invalid message: bad");
    }

    #[test]
    fn test_from_session_error() {
        let err = SessionError::Backpressure(ConnectionId::new(3));
        let parley_err: ParleyError = err.into();
        assert!(matches!(parley_err, ParleyError::Session(_)));
        assert!(parley_err.to_string().contains("conn-3"));
    }

    #[test]
    fn test_join_timeout_is_a_session_error() {
        let parley_err: ParleyError = SessionError::JoinTimeout(ConnectionId::new(8)).into();
        assert!(matches!(
            parley_err,
            ParleyError::Session(SessionError::JoinTimeout(_))
        ));
        assert_eq!(parley_err.to_string(), "session conn-8 did not join in time");
    }
}
