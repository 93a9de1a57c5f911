//! The relay dispatcher: decides who receives each envelope.
//!
//! The relay is stateless apart from the shared [`ClientRegistry`]. Each
//! connection's read loop calls into it with envelopes in the order they
//! were decoded, which is what keeps per-sender ordering intact.
//!
//! Every outbound send is a non-blocking enqueue onto the recipient's
//! queue (see [`parley_session::SessionHandle::send`]), so a fan-out
//! never waits on a slow peer. A recipient that can't take the envelope is logged, marked
//! closing, and skipped.

use std::sync::Arc;

use parley_protocol::{Envelope, MessageKind};
use parley_session::ClientRegistry;
use parley_transport::ConnectionId;

use crate::RelayConfig;

/// What the read loop should do after an envelope has been dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep reading.
    Continue,
    /// The client asked to leave; run the session's cleanup.
    Leave,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients whose queue accepted the envelope.
    pub delivered: usize,
    /// Recipients that were skipped because their session is going away.
    pub failed: usize,
}

/// Routes envelopes between registered sessions.
pub struct Relay {
    registry: Arc<ClientRegistry>,
    config: RelayConfig,
}

impl Relay {
    /// Creates a relay over a shared registry.
    pub fn new(registry: Arc<ClientRegistry>, config: RelayConfig) -> Self {
        Self { registry, config }
    }

    /// The registry this relay routes through.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Announces a session that has just been registered under `name`.
    ///
    /// Everyone, the joiner included, receives `"<name> joined"` followed
    /// by a roster update. Registration itself goes through
    /// [`ClientRegistry::join`] first, so the caller can take ownership of
    /// the name's cleanup before anything here awaits.
    pub async fn announce_join(&self, name: &str) {
        self.broadcast(self.notice(format!("{name} joined"))).await;
        self.broadcast_roster().await;
    }

    /// Handles one envelope from the active session `sender`.
    pub async fn dispatch(&self, sender: &str, envelope: Envelope) -> Dispatch {
        match envelope.kind {
            MessageKind::Chat => {
                self.relay_chat(sender, envelope).await;
                Dispatch::Continue
            }
            MessageKind::PrivateMessage => {
                self.relay_private(sender, envelope).await;
                Dispatch::Continue
            }
            MessageKind::Leave => Dispatch::Leave,
            kind @ (MessageKind::Join | MessageKind::System | MessageKind::RosterUpdate) => {
                let reason = if kind.is_server_only() {
                    "server-only kind from client"
                } else {
                    "duplicate join"
                };
                tracing::debug!(sender, %kind, reason, "dropping envelope");
                Dispatch::Continue
            }
        }
    }

    /// Deregisters `name` and tells the remaining sessions.
    ///
    /// Only the first call for a given session does anything; later calls
    /// (a Leave racing an EOF, a retry from a drop guard) find the name
    /// already gone and return `false` without broadcasting.
    pub async fn leave(&self, name: &str, id: ConnectionId) -> bool {
        if self.registry.leave_session(name, id).await.is_none() {
            return false;
        }
        self.broadcast(self.notice(format!("{name} left"))).await;
        self.broadcast_roster().await;
        true
    }

    /// Sends `envelope` to every registered session.
    ///
    /// Recipients are the registry snapshot at call time.
    pub async fn broadcast(&self, envelope: Envelope) -> Delivery {
        let recipients = self.registry.recipients().await;
        let mut delivery = Delivery::default();

        for (name, handle) in recipients {
            match handle.send(envelope.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(e) => {
                    tracing::debug!(recipient = %name, error = %e, "skipping recipient");
                    delivery.failed += 1;
                }
            }
        }

        if delivery.failed > 0 {
            tracing::debug!(
                kind = %envelope.kind,
                delivered = delivery.delivered,
                failed = delivery.failed,
                "broadcast partially delivered"
            );
        }
        delivery
    }

    /// Sends `envelope` to the session registered as `name`.
    ///
    /// Returns `false` if nobody has that name or the session is closing.
    pub async fn send_to(&self, name: &str, envelope: Envelope) -> bool {
        let Some(handle) = self.registry.lookup(name).await else {
            return false;
        };
        match handle.send(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(recipient = name, error = %e, "unicast failed");
                false
            }
        }
    }

    async fn relay_chat(&self, sender: &str, mut envelope: Envelope) {
        // Never trust client-supplied attribution.
        envelope.from = sender.to_string();
        envelope.to.clear();
        let envelope = envelope.stamped();

        let delivery = self.broadcast(envelope).await;
        tracing::debug!(sender, delivered = delivery.delivered, "chat relayed");
    }

    async fn relay_private(&self, sender: &str, mut envelope: Envelope) {
        if let Err(e) = envelope.validate() {
            self.send_to(sender, self.notice(e.to_string())).await;
            return;
        }

        envelope.from = sender.to_string();
        envelope.to = envelope.to.trim().to_string();
        let envelope = envelope.stamped();
        let recipient = envelope.to.clone();

        if self.registry.lookup(&recipient).await.is_none() {
            tracing::debug!(sender, %recipient, "private message to unknown recipient");
            self.send_to(sender, self.notice(format!("user '{recipient}' is not online")))
                .await;
            return;
        }

        let confirmation = (self.config.confirm_private && recipient != sender)
            .then(|| envelope.clone());

        if !self.send_to(&recipient, envelope).await {
            // Target vanished between lookup and send.
            self.send_to(sender, self.notice(format!("could not deliver to '{recipient}'")))
                .await;
            return;
        }

        if let Some(copy) = confirmation {
            self.send_to(sender, copy).await;
        }
    }

    async fn broadcast_roster(&self) -> Delivery {
        let names = self.registry.snapshot().await;
        let roster = Envelope::roster(&names)
            .with_from(self.config.system_sender.clone())
            .stamped();
        self.broadcast(roster).await
    }

    /// A stamped System envelope from the configured system sender.
    pub fn notice(&self, body: impl Into<String>) -> Envelope {
        Envelope::system(body)
            .with_from(self.config.system_sender.clone())
            .stamped()
    }
}
