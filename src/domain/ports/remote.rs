//! Remote Key-Value Backend Interface
//!
//! The wire protocol behind a distributed cache (Redis or similar) is an
//! external collaborator; the core consumes it through this port. Values
//! cross as opaque bytes - the codec port decides the format.

use crate::domain::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Opaque remote key-value store
#[async_trait]
pub trait RemoteKeyValueBackend: Send + Sync {
    /// Fetch raw bytes for a key, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store raw bytes with an optional time-to-live.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Delete a key, reporting whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check presence without fetching the value.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove every key held by the backend.
    async fn flush_all(&self) -> Result<()>;

    /// Round-trip latency probe.
    async fn ping(&self) -> Result<Duration>;
}

/// Pluggable payload codec for remote backends
pub trait ValueCodec: Send + Sync {
    /// Encode a value into backend bytes.
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    /// Decode backend bytes into a value.
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}
