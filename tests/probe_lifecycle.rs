//! Probe Lifecycle Integration Tests
//!
//! End-to-end coverage of the probing engine: single-writer semantics,
//! synchronous stop, delete completeness, cursor monotonicity, and the
//! null-on-unreachable / bounded-latency sample contracts.

use std::io::ErrorKind;
use std::time::Duration;

use tcpwatch::probe::Controller;
use tcpwatch::storage::{Database, SampleStore};
use tempfile::{TempDir, tempdir};
use tokio::net::TcpListener;

// =============================================================================
// Test Helpers
// =============================================================================

async fn open_store(dataset: &str) -> (SampleStore, TempDir) {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("lifecycle.db").display());
    let db = Database::connect(&url).await.unwrap();
    let store = SampleStore::open(db, dataset).await.unwrap();
    (store, dir)
}

/// A localhost port guaranteed to have no listener: bind, read, drop.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Bind a listener on a random port and keep accepting, or `None` in
/// sandboxes that forbid binding.
async fn spawn_listener() -> Option<std::net::SocketAddr> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) if e.kind() == ErrorKind::PermissionDenied => return None,
        Err(e) => panic!("Failed to bind test listener: {e}"),
    };
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let _ = listener.accept().await;
        }
    });
    Some(addr)
}

// =============================================================================
// Controller Properties
// =============================================================================

#[tokio::test]
async fn test_double_start_keeps_single_writer() {
    let (store, _dir) = open_store("writers").await;
    let controller = Controller::recover(store.clone()).await.unwrap();
    let target = format!("127.0.0.1:{}", closed_port().await);

    controller.start(&target).await;
    controller.start(&target).await;
    assert!(controller.is_running(&target).await);

    // One writer on a refused port emits roughly one sample per interval.
    // A second writer would double the count; allow slack for slow machines.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    controller.stop(&target).await;

    let batch = store.query(&target, None).await.unwrap();
    assert!(!batch.is_empty());
    assert!(
        batch.len() <= 3,
        "two live writers would have produced ~4 samples, got {}",
        batch.len()
    );
    assert!(!controller.is_running(&target).await);
}

#[tokio::test]
async fn test_stop_is_synchronous() {
    let (store, _dir) = open_store("sync_stop").await;
    let controller = Controller::recover(store.clone()).await.unwrap();
    let target = format!("127.0.0.1:{}", closed_port().await);

    controller.start(&target).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    controller.stop(&target).await;

    let settled = store.query(&target, None).await.unwrap();
    assert!(!settled.is_empty());

    // Several sampling intervals later, nothing new has appeared.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let later = store.query(&target, settled.last_fetched).await.unwrap();
    assert!(
        later.is_empty(),
        "samples written after stop() returned: {}",
        later.len()
    );
}

#[tokio::test]
async fn test_delete_purges_and_restart_is_fresh() {
    let (store, _dir) = open_store("deletion").await;
    let controller = Controller::recover(store.clone()).await.unwrap();
    let target = format!("127.0.0.1:{}", closed_port().await);

    controller.start(&target).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    controller.delete(&target).await.unwrap();
    let cutoff = chrono::Utc::now();

    assert!(store.query(&target, None).await.unwrap().is_empty());
    assert!(!controller.targets().await.contains(&target));

    // Restarting after delete builds an independent history.
    controller.start(&target).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    controller.stop(&target).await;

    let fresh = store.query(&target, None).await.unwrap();
    assert!(!fresh.is_empty());
    assert!(
        fresh.time.iter().all(|t| *t > cutoff),
        "resurrected rows predate the delete"
    );
}

#[tokio::test]
async fn test_bulk_start_and_stop_snapshot() {
    let (store, _dir) = open_store("bulk").await;
    let port_a = closed_port().await;
    let port_b = closed_port().await;
    store
        .insert(&format!("127.0.0.1:{port_a}"), None)
        .await
        .unwrap();
    store
        .insert(&format!("127.0.0.1:{port_b}"), None)
        .await
        .unwrap();

    let controller = Controller::recover(store.clone()).await.unwrap();
    assert_eq!(controller.targets().await.len(), 2);

    controller.start_all().await;
    for target in controller.targets().await {
        assert!(controller.is_running(&target).await);
    }

    controller.stop_all().await;
    for target in controller.targets().await {
        assert!(!controller.is_running(&target).await);
    }
}

// =============================================================================
// Cursor Contract
// =============================================================================

#[tokio::test]
async fn test_cursor_polling_is_idempotent() {
    let (store, _dir) = open_store("cursor").await;

    for delay in [Some(5.0), None, Some(7.5)] {
        store.insert("example.org", delay).await.unwrap();
    }

    // First poll: full history.
    let first = store.query("example.org", None).await.unwrap();
    assert_eq!(first.len(), 3);
    let mut cursor = first.last_fetched;
    assert_eq!(cursor, first.time.last().copied());

    // Polling with no new data returns empty batches, cursor unchanged.
    for _ in 0..3 {
        let batch = store.query("example.org", cursor).await.unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.last_fetched, cursor);
    }

    // Every new row is seen exactly once.
    for delay in [Some(9.0), None] {
        store.insert("example.org", delay).await.unwrap();
        let batch = store.query("example.org", cursor).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.delay[0], delay);
        assert!(batch.last_fetched > cursor);
        cursor = batch.last_fetched;
    }
}

// =============================================================================
// End-to-End Scenarios
// =============================================================================

#[tokio::test]
async fn test_unreachable_target_yields_null_samples_then_stops() {
    let (store, _dir) = open_store("unreachable").await;
    let controller = Controller::recover(store.clone()).await.unwrap();
    let target = format!("127.0.0.1:{}", closed_port().await);

    controller.start(&target).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;

    let batch = store.query(&target, None).await.unwrap();
    assert!(batch.len() >= 3, "expected >=3 samples, got {}", batch.len());
    assert!(batch.delay.iter().all(Option::is_none));
    assert!(batch.disconnected.iter().all(|d| *d == Some(1)));

    controller.stop(&target).await;
    let cursor = store.query(&target, None).await.unwrap().last_fetched;

    tokio::time::sleep(Duration::from_millis(2000)).await;
    let after_stop = store.query(&target, cursor).await.unwrap();
    assert!(after_stop.is_empty());
}

#[tokio::test]
async fn test_reachable_target_yields_bounded_latency() {
    let Some(addr) = spawn_listener().await else {
        return;
    };
    let (store, _dir) = open_store("reachable").await;
    let controller = Controller::recover(store.clone()).await.unwrap();
    let target = addr.to_string();

    controller.start(&target).await;
    tokio::time::sleep(Duration::from_millis(3500)).await;
    controller.stop(&target).await;

    let batch = store.query(&target, None).await.unwrap();
    assert!(batch.len() >= 3, "expected >=3 samples, got {}", batch.len());
    for delay in &batch.delay {
        let ms = delay.expect("reachable target must not record null latency");
        assert!(ms > 0.0);
        assert!(ms < 2000.0, "latency {ms} exceeds the connect timeout ceiling");
    }
    assert!(batch.disconnected.iter().all(|d| d.is_none()));
}
