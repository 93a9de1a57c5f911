//! `ParleyServer` builder and accept loop.
//!
//! This is the entry point for running a Parley relay. It ties together
//! all the layers: transport → protocol → session → relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parley_protocol::{Codec, JsonCodec};
use parley_relay::{Relay, RelayConfig};
use parley_session::{ClientRegistry, SessionConfig};
use parley_transport::{Connection, DEFAULT_MAX_FRAME_LEN, TcpTransport, Transport};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::ParleyError;
use crate::handler::handle_connection;

/// Pause after a failed `accept()` before trying again, so a persistent
/// error such as running out of file descriptors doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The only
/// mutable state lives inside the relay's registry, which owns its lock.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) relay: Relay,
    pub(crate) codec: C,
    pub(crate) config: SessionConfig,
}

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,no_run
/// use parley::prelude::*;
///
/// # async fn demo() -> Result<(), ParleyError> {
/// let server = ParleyServer::builder()
///     .bind("0.0.0.0:11111")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ParleyServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    relay_config: RelayConfig,
    max_frame_len: usize,
    shutdown: Option<CancellationToken>,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:11111".to_string(),
            session_config: SessionConfig::default(),
            relay_config: RelayConfig::default(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            shutdown: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the relay configuration.
    pub fn relay_config(mut self, config: RelayConfig) -> Self {
        self.relay_config = config;
        self
    }

    /// Sets the largest frame payload accepted from clients.
    pub fn max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Uses `token` to stop the server. Cancelling it stops the accept
    /// loop and closes every live session.
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Binds the listener and builds the server with the JSON codec.
    pub async fn build(self) -> Result<ParleyServer<JsonCodec>, ParleyError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the listener and builds the server with a custom codec.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<ParleyServer<C>, ParleyError> {
        let transport = TcpTransport::bind(&self.bind_addr)
            .await?
            .with_max_frame_len(self.max_frame_len);

        let registry = Arc::new(ClientRegistry::new(&self.session_config));
        let state = Arc::new(ServerState {
            relay: Relay::new(registry, self.relay_config),
            codec,
            config: self.session_config,
        });

        Ok(ParleyServer {
            transport,
            state,
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

impl Default for ParleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parley relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParleyServer<C: Codec> {
    transport: TcpTransport,
    state: Arc<ServerState<C>>,
    shutdown: CancellationToken,
}

impl ParleyServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }
}

impl<C: Codec> ParleyServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ParleyError> {
        Ok(self.transport.local_addr()?)
    }

    /// The token that stops this server. Clone it before calling
    /// [`run()`](Self::run) to trigger shutdown from elsewhere.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The live name registry, for inspection.
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(self.state.relay.registry())
    }

    /// Runs the accept loop until the shutdown token is cancelled.
    ///
    /// Each accepted connection gets its own handler task, so the loop
    /// never waits on a client. Accept errors are logged and retried
    /// after a short back-off. On shutdown every session is closed and
    /// this returns once all handler tasks have finished.
    pub async fn run(mut self) -> Result<(), ParleyError> {
        let addr = self.transport.local_addr()?;
        tracing::info!(%addr, "Parley server running");

        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        let shutdown = self.shutdown.clone();
                        tasks.spawn(async move {
                            let conn_id = conn.id();
                            if let Err(e) = handle_connection(conn, state, shutdown).await {
                                tracing::debug!(
                                    %conn_id,
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_exit(joined);
                }
            }
        }

        tracing::info!(live = tasks.len(), "Parley server shutting down");
        while let Some(joined) = tasks.join_next().await {
            log_task_exit(joined);
        }
        tracing::info!("Parley server stopped");
        Ok(())
    }
}

fn log_task_exit(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "connection task failed");
    }
}
