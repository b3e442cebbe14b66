//! End-to-end allocation scenarios.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use vpn_allocator::allocator::{AllocationError, Allocator, AllocatorSettings};
use vpn_allocator::backend::{MemoryBackend, MemoryConnector, OutlineConnector};
use vpn_allocator::config::BackendConfig;
use vpn_allocator::pool::ServerPool;

const PREFIX: &str = "https://s3.amazonaws.com/outline-vpn/invite.html#";

fn settings(max_users: usize) -> AllocatorSettings {
    AllocatorSettings {
        max_users,
        traffic_limit_bytes: 8 * 1024 * 1024 * 1024,
        invite_prefix: PREFIX.to_string(),
        probe_timeout: Duration::from_secs(1),
        allocation_timeout: Duration::from_secs(5),
    }
}

fn pool_of(servers: &[&str]) -> Arc<ServerPool> {
    let path = common::servers_file(servers);
    let pool = ServerPool::open(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    Arc::new(pool)
}

#[tokio::test]
async fn test_concurrent_requests_create_one_credential() {
    let connector = Arc::new(MemoryConnector::new());
    let a = connector.register(MemoryBackend::new("mem://a"));
    let b = connector.register(MemoryBackend::new("mem://b"));
    a.set_delay(Duration::from_millis(20));
    b.set_delay(Duration::from_millis(20));

    let allocator = Arc::new(Allocator::new(
        pool_of(&["mem://a", "mem://b"]),
        connector.clone(),
        settings(100),
    ));

    let calls = (0..8).map(|_| {
        let allocator = allocator.clone();
        async move { allocator.generate_url("dana_d_7").await }
    });
    let urls: Vec<String> = join_all(calls)
        .await
        .into_iter()
        .map(|r| r.unwrap().into_string())
        .collect();

    assert!(urls.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(a.count_label("dana_d_7") + b.count_label("dana_d_7"), 1);
    assert_eq!(a.create_calls() + b.create_calls(), 1);
}

#[tokio::test]
async fn test_distinct_users_spread_across_backends() {
    let connector = Arc::new(MemoryConnector::new());
    let a = connector.register(MemoryBackend::new("mem://a"));
    let b = connector.register(MemoryBackend::new("mem://b"));

    let allocator = Allocator::new(pool_of(&["mem://a", "mem://b"]), connector.clone(), settings(100));
    for i in 0..6 {
        allocator.generate_url(&format!("user__{}", i)).await.unwrap();
    }

    assert_eq!(a.credential_count(), 3);
    assert_eq!(b.credential_count(), 3);
}

#[tokio::test]
async fn test_all_backends_down() {
    let connector = Arc::new(MemoryConnector::new());
    let a = connector.register(MemoryBackend::new("mem://a"));
    a.set_unreachable(true);

    let allocator = Allocator::new(pool_of(&["mem://a", "mem://gone"]), connector.clone(), settings(100));
    let err = allocator.generate_url("erin__9").await.unwrap_err();

    assert!(matches!(err, AllocationError::AllBackendsUnreachable { probed: 2 }));
}

#[tokio::test]
async fn test_outline_backend_end_to_end() {
    let healthy = common::start_mock_outline().await;
    let dead = common::dead_address().await;
    let connector = OutlineConnector::new(&BackendConfig::default(), Duration::from_secs(1)).unwrap();

    let allocator = Allocator::new(
        pool_of(&[&dead, &healthy.address]),
        Arc::new(connector),
        settings(100),
    );

    let url = allocator.generate_url("frank_f_11").await.unwrap();
    assert!(url.as_str().starts_with(PREFIX));

    let keys = healthy.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].name, "frank_f_11");
    assert_eq!(keys[0].limit, Some(8 * 1024 * 1024 * 1024));

    // Second call returns the same key without creating another.
    let again = allocator.generate_url("frank_f_11").await.unwrap();
    assert_eq!(url.as_str(), again.as_str());
    assert_eq!(healthy.keys().len(), 1);

    healthy.set_usage(&keys[0].id, 1_000);
    let report = allocator.usage("frank_f_11").await.unwrap().unwrap();
    assert_eq!(report.used_bytes, 1_000);
    assert_eq!(report.backend, healthy.address);
}

#[tokio::test]
async fn test_outline_create_failure() {
    let mock = common::start_mock_outline().await;
    mock.fail_create(true);
    let connector = OutlineConnector::new(&BackendConfig::default(), Duration::from_secs(1)).unwrap();

    let allocator = Allocator::new(pool_of(&[&mock.address]), Arc::new(connector), settings(100));
    let err = allocator.generate_url("gina__12").await.unwrap_err();

    assert!(matches!(err, AllocationError::AllocationFailed { .. }));
    assert!(mock.keys().is_empty());
}
