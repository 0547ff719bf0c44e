//! Telemetry provider decorator
//!
//! Wraps any provider, timing every operation and reporting dependency and
//! exception events to an external [`TelemetrySink`] without altering
//! behavior. The inner provider's before/after events are forwarded onto a
//! re-exposed bus by a subscription task; `shutdown` stops the forwarding
//! and is idempotent, and dropping the decorator performs the same cleanup
//! (the inner provider is released with the last `Arc`).

use crate::domain::entry::{CacheEntryDescriptor, CacheEntryOptions};
use crate::domain::ports::cache::{CacheOperation, CacheProvider};
use crate::domain::ports::telemetry::{DependencyTelemetry, ExceptionTelemetry, TelemetrySink};
use crate::domain::result::CacheOperationResult;
use crate::infrastructure::constants::CLEAR_ALL_EVENT_KEY;
use crate::infrastructure::events::CacheEventBus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Decorator reporting dependency telemetry for every operation
pub struct TelemetryCacheProvider {
    inner: Arc<dyn CacheProvider>,
    sink: Arc<dyn TelemetrySink>,
    events: CacheEventBus,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl TelemetryCacheProvider {
    /// Wrap a provider, subscribing to its event bus immediately.
    pub fn new(inner: Arc<dyn CacheProvider>, sink: Arc<dyn TelemetrySink>) -> Self {
        let events = CacheEventBus::with_default_capacity();
        let mut receiver = inner.events().subscribe();
        let forward_bus = events.clone();
        let forwarder = tokio::spawn(async move {
            while let Ok(event) = receiver.recv().await {
                forward_bus.publish(event);
            }
        });
        Self {
            inner,
            sink,
            events,
            forwarder: Mutex::new(Some(forwarder)),
        }
    }

    /// Stop forwarding the inner provider's events. Safe to call twice.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.forwarder.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    fn report<T>(
        &self,
        operation: CacheOperation,
        key: &str,
        started_at: DateTime<Utc>,
        started: Instant,
        result: &CacheOperationResult<T>,
    ) {
        let success = !result.status().is_error();
        self.sink.track_dependency(DependencyTelemetry {
            dependency_type: "Cache",
            operation,
            key: key.to_string(),
            success,
            started_at,
            duration: started.elapsed(),
        });
        if !success {
            self.sink.track_exception(ExceptionTelemetry {
                operation,
                key: key.to_string(),
                message: result
                    .details()
                    .unwrap_or("operation failed without details")
                    .to_string(),
            });
        }
    }
}

impl Drop for TelemetryCacheProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl CacheProvider for TelemetryCacheProvider {
    async fn get_value(
        &self,
        key: &str,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value> {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.inner.get_value(key, options, token).await;
        self.report(CacheOperation::Get, key, started_at, started, &result);
        result
    }

    async fn set_value(
        &self,
        key: &str,
        value: Value,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<()> {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.inner.set_value(key, value, options, token).await;
        self.report(CacheOperation::Set, key, started_at, started, &result);
        result
    }

    async fn remove(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<()> {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.inner.remove(key, token).await;
        self.report(CacheOperation::Remove, key, started_at, started, &result);
        result
    }

    async fn exists(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<bool> {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.inner.exists(key, token).await;
        self.report(CacheOperation::Exists, key, started_at, started, &result);
        result
    }

    async fn descriptor(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> CacheOperationResult<CacheEntryDescriptor> {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.inner.descriptor(key, token).await;
        self.report(CacheOperation::Descriptor, key, started_at, started, &result);
        result
    }

    async fn clear_all(&self, token: &CancellationToken) -> CacheOperationResult<()> {
        let started_at = Utc::now();
        let started = Instant::now();
        let result = self.inner.clear_all(token).await;
        self.report(
            CacheOperation::ClearAll,
            CLEAR_ALL_EVENT_KEY,
            started_at,
            started,
            &result,
        );
        result
    }

    fn events(&self) -> &CacheEventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::CacheStatus;
    use crate::infrastructure::cache::providers::memory::{
        MemoryCacheConfig, MemoryCacheProvider,
    };
    use crate::infrastructure::metrics::CacheMetrics;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingSink {
        dependencies: Mutex<Vec<DependencyTelemetry>>,
        exceptions: Mutex<Vec<ExceptionTelemetry>>,
    }

    impl TelemetrySink for RecordingSink {
        fn track_dependency(&self, telemetry: DependencyTelemetry) {
            self.dependencies.lock().unwrap().push(telemetry);
        }

        fn track_exception(&self, telemetry: ExceptionTelemetry) {
            self.exceptions.lock().unwrap().push(telemetry);
        }
    }

    fn wrapped() -> (TelemetryCacheProvider, Arc<RecordingSink>) {
        let inner = Arc::new(
            MemoryCacheProvider::new(MemoryCacheConfig::default(), Arc::new(CacheMetrics::new()))
                .unwrap(),
        );
        let sink = Arc::new(RecordingSink::default());
        let provider = TelemetryCacheProvider::new(inner, sink.clone());
        (provider, sink)
    }

    #[tokio::test]
    async fn test_dependency_tracked_per_operation() {
        let (provider, sink) = wrapped();
        let token = CancellationToken::new();

        provider.set_value("k1", json!(1), None, &token).await;
        provider.get_value("k1", None, &token).await;
        provider.get_value("missing", None, &token).await;

        let deps = sink.dependencies.lock().unwrap();
        assert_eq!(deps.len(), 3);
        assert!(deps.iter().all(|d| d.dependency_type == "Cache"));
        assert_eq!(deps[0].operation, CacheOperation::Set);
        assert!(deps[0].success);
        // A miss is still a successful dependency call.
        assert_eq!(deps[2].key, "missing");
        assert!(deps[2].success);
        assert!(sink.exceptions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exception_tracked_on_failure_status() {
        let (provider, sink) = wrapped();
        let token = CancellationToken::new();

        let result = provider.get_value("bad key!", None, &token).await;
        assert_eq!(result.status(), CacheStatus::ValidationError);

        let deps = sink.dependencies.lock().unwrap();
        assert_eq!(deps.len(), 1);
        assert!(!deps[0].success);

        let exceptions = sink.exceptions.lock().unwrap();
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].operation, CacheOperation::Get);
        assert_eq!(exceptions[0].key, "bad key!");
    }

    #[tokio::test]
    async fn test_behavior_is_unaltered() {
        let (provider, _sink) = wrapped();
        let token = CancellationToken::new();

        provider.set_value("k", json!({"v": 7}), None, &token).await;
        let result = provider.get_value("k", None, &token).await;
        assert_eq!(result.into_value(), Some(json!({"v": 7})));

        provider.remove("k", &token).await;
        assert_eq!(
            provider.get_value("k", None, &token).await.status(),
            CacheStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_inner_events_forwarded() {
        let (provider, _sink) = wrapped();
        let token = CancellationToken::new();
        let mut receiver = provider.events().subscribe();

        provider.set_value("k", json!(1), None, &token).await;

        // Before and After from the inner provider arrive on the decorator's bus.
        let first = receiver.recv().await.unwrap();
        assert_eq!(first.operation(), CacheOperation::Set);
        let second = receiver.recv().await.unwrap();
        assert_eq!(second.operation(), CacheOperation::Set);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let (provider, _sink) = wrapped();
        provider.shutdown();
        provider.shutdown();
    }
}
