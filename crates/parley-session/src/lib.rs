//! Client sessions for Parley.
//!
//! This crate covers the life of one chat client on the server:
//!
//! 1. **State**: where a connection is in its lifecycle ([`Session`],
//!    [`SessionState`])
//! 2. **Delivery**: a cloneable, non-blocking outbound path to it
//!    ([`SessionHandle`])
//! 3. **Naming**: the registry that hands out unique display names and
//!    routes by them ([`ClientRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Relay (above)        ← routes envelopes by name through the registry
//!     ↕
//! Session (this crate) ← identity, lifecycle, per-session write queue
//!     ↕
//! Protocol (below)     ← Envelope
//! ```

mod error;
mod handle;
mod registry;
mod session;

pub use error::SessionError;
pub use handle::SessionHandle;
pub use registry::ClientRegistry;
pub use session::{Session, SessionConfig, SessionState};
