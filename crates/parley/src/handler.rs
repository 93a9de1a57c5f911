//! Per-connection handler: join, message loop, cleanup.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Join → anything else is answered with a notice and closed
//!   2. Start the writer task → register and arm cleanup → announce
//!   3. Loop: receive envelopes → dispatch through the relay
//!   4. Deregister and announce the departure, exactly once

use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Codec, Envelope, MessageKind, ProtocolError};
use parley_relay::Dispatch;
use parley_session::{Session, SessionError, SessionHandle};
use parley_transport::{Connection, TcpConnection};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::ParleyError;
use crate::server::ServerState;

/// Owns a joined session's cleanup.
///
/// The normal exit path calls [`finish`](Self::finish). If the handler
/// unwinds before that, `Drop` runs the same deregistration on a spawned
/// task, since `Drop` can't await. [`Session::close`] hands out the name
/// once, so the two paths never both announce.
struct SessionGuard<C: Codec> {
    session: Session,
    closing: CancellationToken,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> SessionGuard<C> {
    /// Registers `handle` under a unique name and takes charge of its
    /// cleanup before anything else can await. From here on, however the
    /// task ends, the name is released.
    async fn register(
        state: &Arc<ServerState<C>>,
        desired: &str,
        handle: SessionHandle,
        closing: CancellationToken,
    ) -> Result<(Self, String), SessionError> {
        let mut session = Session::new(handle.id());
        let name = state.relay.registry().join(desired, handle).await;
        session.activate(name.clone())?;
        let guard = Self {
            session,
            closing,
            state: Arc::clone(state),
        };
        Ok((guard, name))
    }

    async fn finish(&mut self) {
        self.closing.cancel();
        if let Some(name) = self.session.close() {
            if self.state.relay.leave(&name, self.session.id()).await {
                tracing::info!(conn_id = %self.session.id(), %name, "client left");
            }
        }
    }
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        self.closing.cancel();
        if let Some(name) = self.session.close() {
            let id = self.session.id();
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                state.relay.leave(&name, id).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: TcpConnection,
    state: Arc<ServerState<C>>,
    shutdown: CancellationToken,
) -> Result<(), ParleyError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Join ---
    let desired = match await_join(&conn, &state, &shutdown).await {
        Ok(Some(desired)) => desired,
        Ok(None) => {
            tracing::debug!(%conn_id, "closed before joining");
            return Ok(());
        }
        Err(e) => {
            close_quietly(&conn).await;
            return Err(e);
        }
    };

    // --- Step 2: Writer + registration ---
    let closing = shutdown.child_token();
    let (handle, outbound) =
        SessionHandle::channel(conn_id, state.config.outbound_capacity, closing.clone());
    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound,
        Arc::clone(&state),
        closing.clone(),
    ));

    let (mut guard, name) =
        SessionGuard::register(&state, &desired, handle, closing.clone()).await?;
    tracing::info!(%conn_id, %name, "client joined");
    state.relay.announce_join(&name).await;

    // --- Step 3: Message loop ---
    loop {
        let frame = tokio::select! {
            biased;
            _ = closing.cancelled() => {
                tracing::debug!(%conn_id, %name, "session closing");
                break;
            }
            frame = conn.recv() => frame,
        };

        let data = match frame {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, %name, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, %name, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, %name, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        if state.relay.dispatch(&name, envelope).await == Dispatch::Leave {
            tracing::debug!(%conn_id, %name, "leave requested");
            break;
        }
    }

    // --- Step 4: Cleanup ---
    guard.finish().await;
    if let Err(e) = writer.await {
        tracing::debug!(%conn_id, error = %e, "writer task failed");
    }
    close_quietly(&conn).await;
    Ok(())
}

/// Waits for the first envelope and returns the desired name it carries.
///
/// `Ok(None)` means the peer went away (or the server is shutting down)
/// before saying anything.
async fn await_join<C: Codec>(
    conn: &TcpConnection,
    state: &ServerState<C>,
    shutdown: &CancellationToken,
) -> Result<Option<String>, ParleyError> {
    let frame = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return Ok(None),
        frame = recv_within(conn, state.config.join_timeout) => frame?,
    };
    let Some(data) = frame else {
        return Ok(None);
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    if envelope.kind != MessageKind::Join {
        let notice = state.relay.notice("expected join as the first message");
        conn.send(&state.codec.encode(&notice)?).await?;
        return Err(ProtocolError::InvalidMessage(format!(
            "first message was {}, not join",
            envelope.kind
        ))
        .into());
    }

    // Older clients put the name in the body.
    let desired = if envelope.from.trim().is_empty() {
        envelope.body
    } else {
        envelope.from
    };
    Ok(Some(desired))
}

async fn recv_within(
    conn: &TcpConnection,
    limit: Option<Duration>,
) -> Result<Option<bytes::Bytes>, ParleyError> {
    let Some(limit) = limit else {
        return Ok(conn.recv().await?);
    };
    match tokio::time::timeout(limit, conn.recv()).await {
        Ok(frame) => Ok(frame?),
        Err(_) => Err(SessionError::JoinTimeout(conn.id()).into()),
    }
}

/// Drains a session's outbound queue onto the socket, one frame per
/// envelope. This is the only task that writes to a joined connection.
///
/// Any write failure or timeout marks the session closing, which the read
/// loop turns into the normal cleanup.
async fn write_loop<C: Codec>(
    conn: Arc<TcpConnection>,
    mut outbound: mpsc::Receiver<Envelope>,
    state: Arc<ServerState<C>>,
    closing: CancellationToken,
) {
    let conn_id = conn.id();
    let write_timeout = state.config.write_timeout;

    loop {
        let envelope = tokio::select! {
            biased;
            _ = closing.cancelled() => break,
            next = outbound.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to encode envelope");
                continue;
            }
        };

        // A stalled peer can park us inside a write; don't outlive the
        // session waiting for it.
        let written = tokio::select! {
            biased;
            _ = closing.cancelled() => break,
            written = tokio::time::timeout(write_timeout, conn.send(&bytes)) => written,
        };

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "write failed");
                closing.cancel();
                break;
            }
            Err(_) => {
                tracing::warn!(%conn_id, ?write_timeout, "write timed out");
                closing.cancel();
                break;
            }
        }
    }
}

async fn close_quietly(conn: &TcpConnection) {
    if let Err(e) = conn.close().await {
        tracing::debug!(conn_id = %conn.id(), error = %e, "close failed");
    }
}

#[cfg(test)]
mod tests {
    use parley_protocol::JsonCodec;
    use parley_relay::{Relay, RelayConfig};
    use parley_session::{ClientRegistry, SessionConfig};
    use parley_transport::{ConnectionId, TcpTransport, Transport};

    use super::*;

    fn state() -> Arc<ServerState<JsonCodec>> {
        Arc::new(ServerState {
            relay: Relay::new(Arc::new(ClientRegistry::default()), RelayConfig::default()),
            codec: JsonCodec,
            config: SessionConfig::default(),
        })
    }

    async fn wait_until_gone(registry: &ClientRegistry, name: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.contains(name).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("name was never released");
    }

    #[tokio::test]
    async fn test_task_aborted_before_announce_releases_name() {
        let state = state();
        let closing = CancellationToken::new();
        let (handle, _rx) = SessionHandle::channel(ConnectionId::new(1), 8, closing.clone());
        let (registered_tx, registered_rx) = tokio::sync::oneshot::channel();

        let task_state = Arc::clone(&state);
        let task_closing = closing.clone();
        let task = tokio::spawn(async move {
            let (_guard, name) = SessionGuard::register(&task_state, "alice", handle, task_closing)
                .await
                .unwrap();
            registered_tx.send(name).unwrap();
            // Stand-in for the announcement broadcast still being awaited.
            std::future::pending::<()>().await;
        });

        let name = registered_rx.await.unwrap();
        assert!(state.relay.registry().contains(&name).await);

        task.abort();
        wait_until_gone(state.relay.registry(), &name).await;
        assert!(closing.is_cancelled());
    }

    #[tokio::test]
    async fn test_finish_then_drop_announces_once() {
        let state = state();
        let (observer, mut observer_rx) =
            SessionHandle::channel(ConnectionId::new(1), 8, CancellationToken::new());
        state.relay.registry().join("observer", observer).await;

        let closing = CancellationToken::new();
        let (handle, _rx) = SessionHandle::channel(ConnectionId::new(2), 8, closing.clone());
        let (mut guard, name) = SessionGuard::register(&state, "alice", handle, closing)
            .await
            .unwrap();

        guard.finish().await;
        drop(guard);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!state.relay.registry().contains(&name).await);
        let mut left = 0;
        while let Ok(env) = observer_rx.try_recv() {
            if env.kind == MessageKind::System && env.body == "alice left" {
                left += 1;
            }
        }
        assert_eq!(left, 1);
    }

    #[tokio::test]
    async fn test_silent_peer_hits_join_timeout() {
        let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        let _client = TcpConnection::connect(addr).await.unwrap();
        let conn = transport.accept().await.unwrap();

        let err = recv_within(&conn, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ParleyError::Session(SessionError::JoinTimeout(id)) if id == conn.id()
        ));
    }
}
