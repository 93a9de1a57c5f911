//! Wire protocol for Parley.
//!
//! This crate defines what travels inside each frame:
//!
//! - **Types** ([`Envelope`], [`MessageKind`]): the chat messages
//!   exchanged between clients and the relay.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how an envelope becomes
//!   a frame payload and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong with one payload.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (whole frames of bytes)
//! and the session layer (named clients). It knows nothing about sockets
//! or registries.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session / Relay (names)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Envelope, MessageKind, now_secs};
