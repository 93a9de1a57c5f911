//! Relay configuration.

/// Settings for how the relay phrases and routes its traffic.
#[derive(Debug, Clone, Default)]
pub struct RelayConfig {
    /// Value placed in `from` on server-originated envelopes
    /// (system notices and roster updates). Empty by default.
    pub system_sender: String,

    /// When `true`, a successfully delivered private message is also
    /// echoed back to its sender as a delivery confirmation. The sender
    /// never receives a copy when delivery fails.
    pub confirm_private: bool,
}
