//! Cluster invalidation tests
//!
//! A memory provider subscribed to the local invalidation bus applies
//! by-key, by-pattern, and clear-all events published by peers.

use polycache::domain::ports::invalidation::{InvalidationBus, InvalidationEvent};
use polycache::infrastructure::invalidation::LocalInvalidationBus;
use polycache::infrastructure::metrics::CacheMetrics;
use polycache::{CacheProvider, CacheStatus, MemoryCacheConfig, MemoryCacheProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn wired_provider() -> (
    Arc<MemoryCacheProvider>,
    Arc<LocalInvalidationBus>,
    CancellationToken,
) {
    let provider = Arc::new(
        MemoryCacheProvider::new(MemoryCacheConfig::default(), Arc::new(CacheMetrics::new()))
            .unwrap(),
    );
    let bus = Arc::new(LocalInvalidationBus::with_default_capacity());
    let token = CancellationToken::new();
    Arc::clone(&provider).spawn_invalidation_listener(bus.clone(), token.clone());
    // Give the listener a beat to subscribe before anything publishes.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (provider, bus, token)
}

async fn eventually_absent(provider: &MemoryCacheProvider, key: &str, token: &CancellationToken) {
    for _ in 0..50 {
        if provider.get_value(key, None, token).await.status() == CacheStatus::NotFound {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("key '{}' was never invalidated", key);
}

#[tokio::test]
async fn test_by_key_invalidation_applied() {
    let (provider, bus, token) = wired_provider().await;

    provider.set_value("session_1", json!(1), None, &token).await;
    bus.publish(InvalidationEvent::ByKey {
        key: "session_1".to_string(),
    })
    .await
    .unwrap();

    eventually_absent(&provider, "session_1", &token).await;
}

#[tokio::test]
async fn test_by_pattern_invalidation_applied() {
    let (provider, bus, token) = wired_provider().await;

    provider.set_value("tenant_a_1", json!(1), None, &token).await;
    provider.set_value("tenant_a_2", json!(2), None, &token).await;
    provider.set_value("tenant_b_1", json!(3), None, &token).await;

    bus.publish(InvalidationEvent::ByPattern {
        prefix: "tenant_a_".to_string(),
    })
    .await
    .unwrap();

    eventually_absent(&provider, "tenant_a_1", &token).await;
    eventually_absent(&provider, "tenant_a_2", &token).await;
    assert!(provider.get_value("tenant_b_1", None, &token).await.is_success());
}

#[tokio::test]
async fn test_clear_all_invalidation_applied() {
    let (provider, bus, token) = wired_provider().await;

    for i in 0..5 {
        provider
            .set_value(&format!("k{}", i), json!(i), None, &token)
            .await;
    }
    bus.publish(InvalidationEvent::ClearAll).await.unwrap();

    for i in 0..5 {
        eventually_absent(&provider, &format!("k{}", i), &token).await;
    }
}

#[tokio::test]
async fn test_listener_stops_on_cancellation() {
    let (provider, bus, token) = wired_provider().await;

    token.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Events published after shutdown are ignored; a fresh token still
    // reaches the provider directly.
    let fresh = CancellationToken::new();
    provider.set_value("kept", json!(1), None, &fresh).await;
    bus.publish(InvalidationEvent::ByKey {
        key: "kept".to_string(),
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(provider.get_value("kept", None, &fresh).await.is_success());
}
