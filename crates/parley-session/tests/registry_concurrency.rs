//! Concurrency tests for the client registry.
//!
//! These run on a multi-threaded runtime so joins genuinely race.

use std::collections::HashSet;
use std::sync::Arc;

use parley_session::{ClientRegistry, SessionHandle};
use parley_transport::ConnectionId;
use tokio_util::sync::CancellationToken;

fn handle(id: u64) -> SessionHandle {
    let (h, _rx) = SessionHandle::channel(ConnectionId::new(id), 4, CancellationToken::new());
    h
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_colliding_joins_get_distinct_minimal_names() {
    let registry = Arc::new(ClientRegistry::default());
    registry.join("bob", handle(0)).await;

    let mut tasks = Vec::new();
    for id in 1..=2 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.join("bob", handle(id)).await }));
    }

    let mut assigned = HashSet::new();
    for task in tasks {
        assigned.insert(task.await.unwrap());
    }

    let expected: HashSet<String> = ["bob_1", "bob_2"].iter().map(|s| s.to_string()).collect();
    assert_eq!(assigned, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_joins_never_share_a_name() {
    const CLIENTS: u64 = 64;
    let registry = Arc::new(ClientRegistry::default());

    let mut tasks = Vec::new();
    for id in 0..CLIENTS {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move { registry.join("guest", handle(id)).await }));
    }

    let mut assigned = HashSet::new();
    for task in tasks {
        assert!(assigned.insert(task.await.unwrap()), "duplicate name assigned");
    }

    assert_eq!(registry.len().await as u64, CLIENTS);
    assert!(assigned.contains("guest"));
    assert!(assigned.contains(&format!("guest_{}", CLIENTS - 1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_leaves_remove_exactly_once() {
    let registry = Arc::new(ClientRegistry::default());
    registry.join("bob", handle(1)).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            registry.leave_session("bob", ConnectionId::new(1)).await.is_some()
        }));
    }

    let mut removals = 0;
    for task in tasks {
        if task.await.unwrap() {
            removals += 1;
        }
    }
    assert_eq!(removals, 1);
    assert!(registry.is_empty().await);
}
