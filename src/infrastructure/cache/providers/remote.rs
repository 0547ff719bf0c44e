//! Remote key-value provider adapter
//!
//! Implements the provider contract over an opaque
//! [`RemoteKeyValueBackend`] and a pluggable [`ValueCodec`]. Backend
//! failures surface as `ConnectionError` results, codec failures as
//! `SerializationError` - the adapter never panics or propagates.
//!
//! Remote backends keep their own expiration bookkeeping, so only the
//! time-to-live derived from the options crosses the port; sliding renewal
//! and per-entry metadata stay a memory-provider feature (`descriptor`
//! reports `NotFound` here, with details saying why).

use crate::domain::entry::{CacheEntryDescriptor, CacheEntryOptions};
use crate::domain::error::{Error, Result};
use crate::domain::ports::cache::{CacheOperation, CacheProvider};
use crate::domain::ports::remote::{RemoteKeyValueBackend, ValueCodec};
use crate::domain::result::CacheOperationResult;
use crate::domain::validation::validate_key;
use crate::infrastructure::constants::CLEAR_ALL_EVENT_KEY;
use crate::infrastructure::events::{CacheEvent, CacheEventBus};
use crate::infrastructure::metrics::CacheMetrics;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// JSON payload codec, the default for remote backends
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonValueCodec;

impl ValueCodec for JsonValueCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| Error::serialization(format!("failed to encode value: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::serialization(format!("failed to decode value: {}", e)))
    }
}

/// Provider adapter over a remote key-value backend
pub struct RemoteCacheProvider {
    backend: Arc<dyn RemoteKeyValueBackend>,
    codec: Arc<dyn ValueCodec>,
    events: CacheEventBus,
    metrics: Arc<CacheMetrics>,
}

impl RemoteCacheProvider {
    pub fn new(
        backend: Arc<dyn RemoteKeyValueBackend>,
        codec: Arc<dyn ValueCodec>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            backend,
            codec,
            events: CacheEventBus::with_default_capacity(),
            metrics,
        }
    }

    /// Round-trip latency of the backend
    pub async fn ping(&self) -> Result<Duration> {
        self.backend.ping().await
    }

    fn emit_before(&self, key: &str, operation: CacheOperation) {
        self.events.publish(CacheEvent::Before {
            key: key.to_string(),
            operation,
        });
    }

    fn finish<T>(
        &self,
        key: &str,
        operation: CacheOperation,
        result: CacheOperationResult<T>,
    ) -> CacheOperationResult<T> {
        let success = !result.status().is_error();
        if !success {
            self.metrics.record_error();
        }
        self.events.publish(CacheEvent::After {
            key: key.to_string(),
            operation,
            success,
        });
        result
    }

    async fn get_inner(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let fetched = tokio::select! {
            fetched = self.backend.get(key) => fetched,
            _ = token.cancelled() => return CacheOperationResult::cancelled(),
        };
        match fetched {
            Ok(Some(bytes)) => match self.codec.decode(&bytes) {
                Ok(value) => {
                    self.metrics.record_hit();
                    CacheOperationResult::success(value)
                }
                Err(e) => CacheOperationResult::serialization_error(e.to_string()),
            },
            Ok(None) => {
                self.metrics.record_miss();
                CacheOperationResult::not_found()
            }
            Err(e) => CacheOperationResult::connection_error(e.to_string()),
        }
    }

    async fn set_inner(
        &self,
        key: &str,
        value: Value,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<()> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let bytes = match self.codec.encode(&value) {
            Ok(bytes) => bytes,
            Err(e) => return CacheOperationResult::serialization_error(e.to_string()),
        };
        // The backend tracks a single TTL: the absolute expiration, or the
        // sliding window as an initial lifetime when only that is set.
        let ttl = options.and_then(|o| o.absolute_expiration().or(o.sliding_expiration()));
        let written = tokio::select! {
            written = self.backend.set(key, bytes, ttl) => written,
            _ = token.cancelled() => return CacheOperationResult::cancelled(),
        };
        match written {
            Ok(()) => CacheOperationResult::success(()),
            Err(e) => CacheOperationResult::connection_error(e.to_string()),
        }
    }

    async fn remove_inner(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<()> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let deleted = tokio::select! {
            deleted = self.backend.delete(key) => deleted,
            _ = token.cancelled() => return CacheOperationResult::cancelled(),
        };
        match deleted {
            // Deleting an absent key still reports success: removal is
            // idempotent across every provider.
            Ok(_) => CacheOperationResult::success(()),
            Err(e) => CacheOperationResult::connection_error(e.to_string()),
        }
    }

    async fn exists_inner(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> CacheOperationResult<bool> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let present = tokio::select! {
            present = self.backend.exists(key) => present,
            _ = token.cancelled() => return CacheOperationResult::cancelled(),
        };
        match present {
            Ok(found) => CacheOperationResult::success(found),
            Err(e) => CacheOperationResult::connection_error(e.to_string()),
        }
    }

    async fn clear_all_inner(&self, token: &CancellationToken) -> CacheOperationResult<()> {
        let flushed = tokio::select! {
            flushed = self.backend.flush_all() => flushed,
            _ = token.cancelled() => return CacheOperationResult::cancelled(),
        };
        match flushed {
            Ok(()) => CacheOperationResult::success(()),
            Err(e) => CacheOperationResult::connection_error(e.to_string()),
        }
    }
}

#[async_trait]
impl CacheProvider for RemoteCacheProvider {
    async fn get_value(
        &self,
        key: &str,
        _options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value> {
        self.emit_before(key, CacheOperation::Get);
        let result = self.get_inner(key, token).await;
        self.finish(key, CacheOperation::Get, result)
    }

    async fn set_value(
        &self,
        key: &str,
        value: Value,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<()> {
        self.emit_before(key, CacheOperation::Set);
        let result = self.set_inner(key, value, options, token).await;
        self.finish(key, CacheOperation::Set, result)
    }

    async fn remove(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<()> {
        self.emit_before(key, CacheOperation::Remove);
        let result = self.remove_inner(key, token).await;
        self.finish(key, CacheOperation::Remove, result)
    }

    async fn exists(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<bool> {
        self.emit_before(key, CacheOperation::Exists);
        let result = self.exists_inner(key, token).await;
        self.finish(key, CacheOperation::Exists, result)
    }

    async fn descriptor(
        &self,
        key: &str,
        _token: &CancellationToken,
    ) -> CacheOperationResult<CacheEntryDescriptor> {
        self.emit_before(key, CacheOperation::Descriptor);
        let result = if let Err(e) = validate_key(key) {
            CacheOperationResult::validation_error(e.to_string())
        } else {
            CacheOperationResult::not_found_with("remote backends do not track entry metadata")
        };
        self.finish(key, CacheOperation::Descriptor, result)
    }

    async fn clear_all(&self, token: &CancellationToken) -> CacheOperationResult<()> {
        self.emit_before(CLEAR_ALL_EVENT_KEY, CacheOperation::ClearAll);
        let result = self.clear_all_inner(token).await;
        self.finish(CLEAR_ALL_EVENT_KEY, CacheOperation::ClearAll, result)
    }

    fn events(&self) -> &CacheEventBus {
        &self.events
    }
}

/// In-process backend implementing the remote port
///
/// Serves tests and single-node setups; cluster deployments plug a real
/// coordinator-backed implementation into the same port.
#[derive(Debug, Default)]
pub struct MemoryRemoteBackend {
    entries: DashMap<String, (Vec<u8>, Option<Instant>)>,
}

impl MemoryRemoteBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn live(&self, key: &str) -> Option<Vec<u8>> {
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.value().1 {
                Some(deadline) => Instant::now() >= deadline,
                None => false,
            },
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value().0.clone())
    }
}

#[async_trait]
impl RemoteKeyValueBackend for MemoryRemoteBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.live(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let deadline = ttl.map(|d| Instant::now() + d);
        self.entries.insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }

    async fn flush_all(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<Duration> {
        Ok(Duration::ZERO)
    }
}
