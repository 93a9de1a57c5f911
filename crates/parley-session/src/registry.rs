//! The client registry: which display name belongs to which session.
//!
//! This is the only shared mutable state in the relay. Broadcast fan-out,
//! private-message lookup and roster snapshots all go through it.
//!
//! # Concurrency
//!
//! All operations run under one `tokio::sync::Mutex`, so join, leave,
//! lookup and snapshot always observe a consistent map. Critical sections
//! are pure map operations. Callers get cloned handles or name lists back
//! and do any sending *after* the lock is released, so a slow peer can
//! never hold up unrelated registry traffic.

use std::collections::BTreeMap;

use parley_transport::ConnectionId;
use tokio::sync::Mutex;

use crate::{SessionConfig, SessionHandle};

/// Maps unique, case-sensitive display names to live sessions.
///
/// A name is present exactly while its session is active:
///
/// ```text
/// join() ──→ [name → handle] ──→ leave() / leave_session()
/// ```
///
/// `BTreeMap` keeps names sorted, so snapshots come out in a stable order
/// without an extra sort.
pub struct ClientRegistry {
    clients: Mutex<BTreeMap<String, SessionHandle>>,
    default_name: String,
    max_name_len: usize,
}

impl ClientRegistry {
    /// Creates an empty registry using the naming rules in `config`.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            clients: Mutex::new(BTreeMap::new()),
            default_name: config.default_name.clone(),
            max_name_len: config.max_name_len.max(1),
        }
    }

    /// Cleans up a requested name before uniquing.
    ///
    /// Trims whitespace, substitutes the default name for blank input,
    /// replaces commas (the roster separator) with underscores, and caps
    /// the length.
    pub fn normalize_name(&self, desired: &str) -> String {
        let trimmed = desired.trim();
        let base = if trimmed.is_empty() {
            self.default_name.as_str()
        } else {
            trimmed
        };
        base.chars()
            .map(|c| if c == ',' { '_' } else { c })
            .take(self.max_name_len)
            .collect()
    }

    /// Registers `session` and returns the name it was given.
    ///
    /// The normalized name is used verbatim if free; otherwise `_1`, `_2`,
    /// ... are appended until an unused name turns up. The check and the
    /// insert happen under one lock acquisition, so two concurrent joins
    /// can never be handed the same name.
    pub async fn join(&self, desired: &str, session: SessionHandle) -> String {
        let base = self.normalize_name(desired);
        let id = session.id();

        let mut clients = self.clients.lock().await;
        let mut candidate = base.clone();
        let mut suffix: u64 = 1;
        while clients.contains_key(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        clients.insert(candidate.clone(), session);
        let online = clients.len();
        drop(clients);

        tracing::info!(%id, name = %candidate, online, "client registered");
        candidate
    }

    /// Removes `name` if present. Removing an absent name is a no-op.
    ///
    /// Returns the handle that was removed, if any.
    pub async fn leave(&self, name: &str) -> Option<SessionHandle> {
        let removed = self.clients.lock().await.remove(name);
        if let Some(handle) = &removed {
            tracing::info!(id = %handle.id(), name, "client deregistered");
        }
        removed
    }

    /// Removes `name` only if it still belongs to session `id`.
    ///
    /// The cleanup path uses this so a stale close can never evict a
    /// different session that has since taken the same name.
    pub async fn leave_session(&self, name: &str, id: ConnectionId) -> Option<SessionHandle> {
        let mut clients = self.clients.lock().await;
        if clients.get(name).map(SessionHandle::id) != Some(id) {
            return None;
        }
        let removed = clients.remove(name);
        drop(clients);

        tracing::info!(%id, name, "client deregistered");
        removed
    }

    /// Looks up the session registered under `name`.
    pub async fn lookup(&self, name: &str) -> Option<SessionHandle> {
        self.clients.lock().await.get(name).cloned()
    }

    /// Point-in-time copy of all registered names, sorted.
    pub async fn snapshot(&self) -> Vec<String> {
        self.clients.lock().await.keys().cloned().collect()
    }

    /// Point-in-time copy of every `(name, handle)` pair, for fan-out.
    pub async fn recipients(&self) -> Vec<(String, SessionHandle)> {
        self.clients
            .lock()
            .await
            .iter()
            .map(|(name, handle)| (name.clone(), handle.clone()))
            .collect()
    }

    /// Returns `true` if `name` is currently registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.clients.lock().await.contains_key(name)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Returns `true` if nobody is registered.
    pub async fn is_empty(&self) -> bool {
        self.clients.lock().await.is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}
