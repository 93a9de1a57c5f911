//! Message routing for Parley.
//!
//! Given an envelope and the authoritative name of the session that sent
//! it, the [`Relay`] decides between broadcast, unicast, and a system
//! notice:
//!
//! | Incoming       | Outcome                                             |
//! |----------------|-----------------------------------------------------|
//! | join (setup)   | `"<name> joined"` + roster to everyone              |
//! | chat           | re-attributed, stamped, broadcast (sender included) |
//! | pm             | to the named recipient only, or a notice to sender  |
//! | leave / close  | deregister once, `"<name> left"` + roster to rest   |
//! | system, roster | server-only, dropped                                |
//!
//! # Key types
//!
//! - [`Relay`]: the dispatcher
//! - [`Dispatch`]: tells the read loop whether to keep going
//! - [`Delivery`]: per-broadcast success/failure counts
//! - [`RelayConfig`]: system sender name, PM confirmations

mod config;
mod relay;

pub use config::RelayConfig;
pub use relay::{Delivery, Dispatch, Relay};
