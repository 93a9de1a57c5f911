//! Outbound handle to a live session.
//!
//! Every joined session has exactly one writer task that owns the socket's
//! write half and drains a bounded queue. Everyone else (the relay
//! broadcasting, another session's private message) talks to the session
//! through a cloneable [`SessionHandle`] that only enqueues.
//!
//! Enqueueing never waits. If the queue is full the peer isn't keeping up,
//! and the session is closed instead of stalling the sender's fan-out.

use parley_protocol::Envelope;
use parley_transport::ConnectionId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::SessionError;

/// Cloneable, non-blocking sender for one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<Envelope>,
    closing: CancellationToken,
}

impl SessionHandle {
    /// Wraps an existing queue sender and closing token.
    pub fn new(
        id: ConnectionId,
        outbound: mpsc::Sender<Envelope>,
        closing: CancellationToken,
    ) -> Self {
        Self {
            id,
            outbound,
            closing,
        }
    }

    /// Creates a handle with a fresh bounded queue of `capacity` envelopes.
    ///
    /// The receiver goes to the session's writer task.
    pub fn channel(
        id: ConnectionId,
        capacity: usize,
        closing: CancellationToken,
    ) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx, closing), rx)
    }

    /// The connection this handle writes to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues one envelope for delivery.
    ///
    /// # Errors
    /// - [`SessionError::Closed`] if the session is closing or its writer
    ///   has gone away.
    /// - [`SessionError::Backpressure`] if the queue is full.
    ///
    /// Either error also marks the session closing, which sends it down
    /// its normal cleanup path.
    pub fn send(&self, envelope: Envelope) -> Result<(), SessionError> {
        if self.closing.is_cancelled() {
            return Err(SessionError::Closed(self.id));
        }
        match self.outbound.try_send(envelope) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(id = %self.id, "outbound queue full, closing session");
                self.close();
                Err(SessionError::Backpressure(self.id))
            }
            Err(TrySendError::Closed(_)) => {
                self.close();
                Err(SessionError::Closed(self.id))
            }
        }
    }

    /// Marks the session closing. Idempotent.
    pub fn close(&self) {
        self.closing.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }
}
