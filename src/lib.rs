//! polycache - a pluggable caching core
//!
//! One provider contract, several implementations: a concurrent in-memory
//! store with per-key locking and LRU eviction, a remote key-value adapter,
//! and composable decorators for telemetry and circuit breaking.

pub mod domain;
pub mod infrastructure;

pub use domain::entry::{CacheEntryDescriptor, CacheEntryOptions, CachePriority};
pub use domain::error::{Error, Result};
pub use domain::ports::cache::{CacheOperation, CacheProvider, CacheProviderExt};
pub use domain::result::{CacheOperationResult, CacheStatus};
pub use infrastructure::cache::providers::memory::{MemoryCacheConfig, MemoryCacheProvider};
pub use infrastructure::cache::stampede::StampedeProtector;
pub use infrastructure::metrics::{CacheMetrics, HealthStatus};
