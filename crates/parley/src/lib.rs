//! # Parley
//!
//! A minimal chat relay over TCP.
//!
//! Clients open a connection, send a join with the name they'd like, and
//! from then on exchange length-prefixed JSON envelopes: chat that is
//! broadcast to everyone, private messages to one named peer, and the
//! server's own notices and roster updates. The relay assigns each client
//! a unique display name and is the only authority on who said what.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn demo() -> Result<(), ParleyError> {
//! let server = ParleyServer::builder()
//!     .bind("0.0.0.0:11111")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::ParleyError;
pub use server::{ParleyServer, ParleyServerBuilder};

/// Re-exports of the sub-crates, for callers that need more than the
/// prelude.
pub use parley_protocol as protocol;
pub use parley_relay as relay;
pub use parley_session as session;
pub use parley_transport as transport;

/// Everything needed to run a server or write a client.
pub mod prelude {
    pub use crate::{ParleyError, ParleyServer, ParleyServerBuilder};
    pub use parley_protocol::{Codec, Envelope, JsonCodec, MessageKind};
    pub use parley_relay::RelayConfig;
    pub use parley_session::SessionConfig;
    pub use parley_transport::{Connection, TcpConnection};
    pub use tokio_util::sync::CancellationToken;
}
