//! Caching subsystem
//!
//! The concurrent in-memory provider and its supporting pieces: the
//! per-key lock table, the LRU eviction policy, stampede protection, and
//! the remote key-value adapter.
//!
//! # Concurrency model
//!
//! Operations on the same key serialize through a FIFO per-key lock;
//! operations on different keys run fully in parallel. The key→entry map
//! and the key→lock table are the only shared mutable structures, both
//! concurrent maps. Whole-store operations snapshot the key set and then
//! work key by key, so they cannot deadlock against in-flight single-key
//! operations.

pub mod eviction;
pub mod lock_table;
pub mod providers;
pub mod stampede;

pub use eviction::LruEvictionPolicy;
pub use providers::memory::{MemoryCacheConfig, MemoryCacheProvider};
pub use providers::remote::{JsonValueCodec, MemoryRemoteBackend, RemoteCacheProvider};
pub use stampede::StampedeProtector;
