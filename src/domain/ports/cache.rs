//! Cache Provider Interface
//!
//! The uniform contract implemented by every backend and decorator. The
//! trait is object-safe: payloads cross it as `serde_json::Value`
//! snapshots, which guarantees callers receive deep copies rather than
//! references into a store. Typed access comes from the blanket
//! [`CacheProviderExt`] extension.
//!
//! Expected conditions never surface as `Err`: every outcome is encoded in
//! the returned [`CacheOperationResult`] status. Removal is idempotent -
//! removing an absent key reports `Success`.

use crate::domain::entry::{CacheEntryDescriptor, CacheEntryOptions};
use crate::domain::result::CacheOperationResult;
use crate::infrastructure::events::CacheEventBus;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Kind of operation, carried by events and telemetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheOperation {
    Get,
    Set,
    Remove,
    Exists,
    Descriptor,
    ClearAll,
}

impl fmt::Display for CacheOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::Exists => "exists",
            Self::Descriptor => "descriptor",
            Self::ClearAll => "clear_all",
        };
        f.write_str(name)
    }
}

/// Cache provider contract
///
/// Operations on the same key are serialized; operations on different keys
/// run in parallel. Every operation honors the caller's cancellation token
/// as its only wait bound and fires before/after events on the bus exposed
/// by [`events`](CacheProvider::events), failure paths included.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Fetch a value. A hit refreshes sliding expiration and access
    /// metadata; the per-call sliding option, when present, replaces the
    /// stored window.
    async fn get_value(
        &self,
        key: &str,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value>;

    /// Store a value, deriving expiration from `options`.
    async fn set_value(
        &self,
        key: &str,
        value: Value,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<()>;

    /// Delete a key. Reports `Success` whether or not the key existed.
    async fn remove(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<()>;

    /// Check presence without touching access metadata.
    async fn exists(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<bool>;

    /// Snapshot an entry's metadata without mutating it.
    async fn descriptor(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> CacheOperationResult<CacheEntryDescriptor>;

    /// Remove every tracked key. Concurrent per-key operations either
    /// complete before their key is cleared or observe `NotFound` after.
    async fn clear_all(&self, token: &CancellationToken) -> CacheOperationResult<()>;

    /// Bus carrying before/after operation events.
    fn events(&self) -> &CacheEventBus;
}

/// Typed convenience layer over the value-level contract
///
/// Serialization failures surface as `SerializationError` results; they
/// never reach the underlying provider.
#[async_trait]
pub trait CacheProviderExt: CacheProvider {
    /// Fetch and deserialize a value.
    async fn get<T>(
        &self,
        key: &str,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let result = self.get_value(key, options, token).await;
        if !result.is_success() {
            return result.retype();
        }
        match result.into_value() {
            Some(value) => match serde_json::from_value(value) {
                Ok(typed) => CacheOperationResult::success(typed),
                Err(e) => CacheOperationResult::serialization_error(format!(
                    "failed to deserialize cached value: {}",
                    e
                )),
            },
            None => CacheOperationResult::not_found(),
        }
    }

    /// Serialize and store a value.
    async fn set<T>(
        &self,
        key: &str,
        value: &T,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<()>
    where
        T: Serialize + Sync,
    {
        match serde_json::to_value(value) {
            Ok(serialized) => self.set_value(key, serialized, options, token).await,
            Err(e) => CacheOperationResult::serialization_error(format!(
                "failed to serialize value: {}",
                e
            )),
        }
    }
}

// Blanket implementation - every provider gets the typed layer for free.
impl<P: CacheProvider + ?Sized> CacheProviderExt for P {}
