//! Concurrent in-memory cache provider
//!
//! The core of the crate: a key→entry map with per-key FIFO locking,
//! absolute and sliding expiration checked lazily at access time, metadata
//! tracking, capacity-driven eviction, and a background sweep.
//!
//! Entries are owned exclusively by the store. Values cross the API as
//! `serde_json::Value` snapshots, so callers always hold deep copies.

use crate::domain::entry::{CacheEntryDescriptor, CacheEntryOptions, CachePriority};
use crate::domain::error::Result;
use crate::domain::ports::cache::{CacheOperation, CacheProvider};
use crate::domain::ports::invalidation::{InvalidationBus, InvalidationEvent};
use crate::domain::result::CacheOperationResult;
use crate::domain::validation::validate_key;
use crate::infrastructure::cache::eviction::LruEvictionPolicy;
use crate::infrastructure::cache::lock_table::KeyLockTable;
use crate::infrastructure::constants::{
    CACHE_DEFAULT_MAX_ENTRIES, CACHE_DEFAULT_TTL, CLEAR_ALL_EVENT_KEY, EVENT_BUS_CAPACITY,
    EVICTION_MAX_INACTIVE, EVICTION_MAX_ITEMS_PER_SWEEP, EVICTION_MAX_READ_COUNT,
};
use crate::infrastructure::events::{CacheEvent, CacheEventBus};
use crate::infrastructure::metrics::CacheMetrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A stored value with its metadata
#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    absolute_window: Option<Duration>,
    /// Fixed at write time; never moved by sliding renewals
    absolute_deadline: Option<Instant>,
    sliding_window: Option<Duration>,
    sliding_deadline: Option<Instant>,
    size_bytes: u64,
    read_count: u64,
    dirty: bool,
    priority: CachePriority,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        if let Some(deadline) = self.absolute_deadline {
            if now >= deadline {
                return true;
            }
        }
        if let Some(deadline) = self.sliding_deadline {
            if now >= deadline {
                return true;
            }
        }
        false
    }

    /// Record a read: bump access metadata and renew the sliding window.
    ///
    /// A per-call sliding value replaces the stored window before renewal.
    fn touch(&mut self, sliding_override: Option<Duration>) {
        self.last_accessed = Utc::now();
        self.read_count += 1;
        if let Some(window) = sliding_override {
            self.sliding_window = Some(window);
        }
        if let Some(window) = self.sliding_window {
            self.sliding_deadline = Some(Instant::now() + window);
        }
    }

    fn descriptor(&self, key: &str) -> CacheEntryDescriptor {
        CacheEntryDescriptor {
            key: key.to_string(),
            created_at: self.created_at,
            last_accessed: self.last_accessed,
            absolute_expiration: self.absolute_window,
            sliding_expiration: self.sliding_window,
            size_bytes: self.size_bytes,
            read_count: self.read_count,
            dirty: self.dirty,
            priority: self.priority,
        }
    }
}

/// Configuration for the in-memory provider
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Capacity bound; exceeding it triggers synchronous eviction
    pub max_entries: usize,
    /// Applied when options configure neither expiration (None = keep forever)
    pub default_ttl: Option<Duration>,
    /// Entries untouched for longer than this become sweep candidates
    pub max_inactive_time: Duration,
    /// Upper bound on evictions per sweep pass (0 = unbounded)
    pub max_items_per_sweep: usize,
    /// Read count above which an entry becomes evictable
    pub max_read_count: u64,
    /// Capacity of the before/after event bus
    pub events_capacity: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: CACHE_DEFAULT_MAX_ENTRIES,
            default_ttl: Some(CACHE_DEFAULT_TTL),
            max_inactive_time: EVICTION_MAX_INACTIVE,
            max_items_per_sweep: EVICTION_MAX_ITEMS_PER_SWEEP,
            max_read_count: EVICTION_MAX_READ_COUNT,
            events_capacity: EVENT_BUS_CAPACITY,
        }
    }
}

/// Concurrent in-memory cache provider
pub struct MemoryCacheProvider {
    entries: DashMap<String, StoredEntry>,
    locks: KeyLockTable,
    events: CacheEventBus,
    metrics: Arc<CacheMetrics>,
    policy: LruEvictionPolicy,
    max_entries: usize,
    default_ttl: Option<Duration>,
}

impl MemoryCacheProvider {
    /// Create a provider recording into the given metrics.
    pub fn new(config: MemoryCacheConfig, metrics: Arc<CacheMetrics>) -> Result<Self> {
        let policy = LruEvictionPolicy::new(
            config.max_inactive_time,
            config.max_items_per_sweep,
            config.max_read_count,
        )?;
        Ok(Self {
            entries: DashMap::new(),
            locks: KeyLockTable::new(),
            events: CacheEventBus::new(config.events_capacity),
            metrics,
            policy,
            max_entries: config.max_entries,
            default_ttl: config.default_ttl,
        })
    }

    /// Metrics this provider records into
    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Number of entries currently stored (expired-but-unswept included)
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Wait for a per-key lock, bailing out when the token fires.
    async fn acquire<'a>(
        lock: &'a Mutex<()>,
        token: &CancellationToken,
    ) -> Option<MutexGuard<'a, ()>> {
        tokio::select! {
            guard = lock.lock() => Some(guard),
            _ = token.cancelled() => None,
        }
    }

    fn emit_before(&self, key: &str, operation: CacheOperation) {
        self.events.publish(CacheEvent::Before {
            key: key.to_string(),
            operation,
        });
    }

    fn emit_after(&self, key: &str, operation: CacheOperation, success: bool) {
        self.events.publish(CacheEvent::After {
            key: key.to_string(),
            operation,
            success,
        });
    }

    /// Wrap an inner outcome with error accounting
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
        self.emit_after(key, operation, success);
        result
    }

    async fn get_inner(
        &self,
        key: &str,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let lock = self.locks.lock_for(key);
        let Some(guard) = Self::acquire(&lock, token).await else {
            self.locks.release(key, lock);
            return CacheOperationResult::cancelled();
        };

        let now = Instant::now();
        enum Lookup {
            Hit(Value),
            Expired,
            Missing,
        }
        let state = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if entry.is_expired(now) {
                    Lookup::Expired
                } else {
                    entry.touch(options.and_then(CacheEntryOptions::sliding_expiration));
                    Lookup::Hit(entry.value.clone())
                }
            }
            None => Lookup::Missing,
        };

        let outcome = match state {
            Lookup::Hit(value) => {
                self.metrics.record_hit();
                CacheOperationResult::success(value)
            }
            Lookup::Expired => {
                self.entries.remove(key);
                self.metrics.record_miss();
                CacheOperationResult::not_found()
            }
            Lookup::Missing => {
                self.metrics.record_miss();
                CacheOperationResult::not_found()
            }
        };
        drop(guard);
        self.locks.release(key, lock);
        outcome
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
        let lock = self.locks.lock_for(key);
        let Some(guard) = Self::acquire(&lock, token).await else {
            self.locks.release(key, lock);
            return CacheOperationResult::cancelled();
        };
        // The token may fire between acquisition and mutation; nothing has
        // been written yet, so bail out with no side effects.
        if token.is_cancelled() {
            drop(guard);
            self.locks.release(key, lock);
            return CacheOperationResult::cancelled();
        }

        let absolute = options.and_then(CacheEntryOptions::absolute_expiration);
        let sliding = options.and_then(CacheEntryOptions::sliding_expiration);
        let effective_absolute = match (absolute, sliding) {
            (None, None) => self.default_ttl,
            (a, _) => a,
        };
        let priority = options.map_or_else(CachePriority::default, CacheEntryOptions::priority);
        let size_bytes = serde_json::to_string(&value)
            .map(|s| s.len() as u64)
            .unwrap_or(0);

        let is_new = !self.entries.contains_key(key);
        if is_new && self.entries.len() >= self.max_entries {
            self.evict_for_capacity(key);
        }

        let now_instant = Instant::now();
        let now = Utc::now();
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                // Overwrite: expiration resets from the new options,
                // created_at is preserved.
                entry.value = value;
                entry.last_accessed = now;
                entry.absolute_window = effective_absolute;
                entry.absolute_deadline = effective_absolute.map(|d| now_instant + d);
                entry.sliding_window = sliding;
                entry.sliding_deadline = sliding.map(|d| now_instant + d);
                entry.size_bytes = size_bytes;
                entry.dirty = true;
                entry.priority = priority;
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    StoredEntry {
                        value,
                        created_at: now,
                        last_accessed: now,
                        absolute_window: effective_absolute,
                        absolute_deadline: effective_absolute.map(|d| now_instant + d),
                        sliding_window: sliding,
                        sliding_deadline: sliding.map(|d| now_instant + d),
                        size_bytes,
                        read_count: 0,
                        dirty: true,
                        priority,
                    },
                );
            }
        }

        drop(guard);
        self.locks.release(key, lock);
        CacheOperationResult::success(())
    }

    async fn remove_inner(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<()> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let lock = self.locks.lock_for(key);
        let Some(guard) = Self::acquire(&lock, token).await else {
            self.locks.release(key, lock);
            return CacheOperationResult::cancelled();
        };
        self.entries.remove(key);
        drop(guard);
        // Removal also retires the lock slot once no one else waits on it.
        self.locks.release(key, lock);
        // Removing an absent key is a success: removal is idempotent.
        CacheOperationResult::success(())
    }

    async fn exists_inner(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<bool> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let lock = self.locks.lock_for(key);
        let Some(guard) = Self::acquire(&lock, token).await else {
            self.locks.release(key, lock);
            return CacheOperationResult::cancelled();
        };

        let now = Instant::now();
        // Presence check must not touch access metadata.
        let state = self.entries.get(key).map(|entry| entry.is_expired(now));
        let outcome = match state {
            Some(false) => CacheOperationResult::success(true),
            Some(true) => {
                self.entries.remove(key);
                CacheOperationResult::success(false)
            }
            None => CacheOperationResult::success(false),
        };
        drop(guard);
        self.locks.release(key, lock);
        outcome
    }

    async fn descriptor_inner(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> CacheOperationResult<CacheEntryDescriptor> {
        if let Err(e) = validate_key(key) {
            return CacheOperationResult::validation_error(e.to_string());
        }
        let lock = self.locks.lock_for(key);
        let Some(guard) = Self::acquire(&lock, token).await else {
            self.locks.release(key, lock);
            return CacheOperationResult::cancelled();
        };

        let now = Instant::now();
        enum Snapshot {
            Found(CacheEntryDescriptor),
            Expired,
            Missing,
        }
        let state = match self.entries.get(key) {
            Some(entry) => {
                if entry.is_expired(now) {
                    Snapshot::Expired
                } else {
                    Snapshot::Found(entry.descriptor(key))
                }
            }
            None => Snapshot::Missing,
        };
        let outcome = match state {
            Snapshot::Found(descriptor) => CacheOperationResult::success(descriptor),
            Snapshot::Expired => {
                self.entries.remove(key);
                CacheOperationResult::not_found()
            }
            Snapshot::Missing => CacheOperationResult::not_found(),
        };
        drop(guard);
        self.locks.release(key, lock);
        outcome
    }

    async fn clear_all_inner(&self, token: &CancellationToken) -> CacheOperationResult<()> {
        if token.is_cancelled() {
            return CacheOperationResult::cancelled();
        }
        // Snapshot the key set, then remove key by key through the normal
        // locking path. Keys set concurrently after the snapshot survive.
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if token.is_cancelled() {
                return CacheOperationResult::cancelled();
            }
            let lock = self.locks.lock_for(&key);
            let Some(guard) = Self::acquire(&lock, token).await else {
                self.locks.release(&key, lock);
                return CacheOperationResult::cancelled();
            };
            self.entries.remove(&key);
            drop(guard);
            self.locks.release(&key, lock);
        }
        CacheOperationResult::success(())
    }

    /// Make room for one incoming key while its lock is held.
    ///
    /// Victims are taken with `try_lock` - a contended victim is skipped in
    /// favor of the next candidate, so no lock-order deadlock is possible.
    /// A transient overshoot when every candidate is contended is accepted.
    fn evict_for_capacity(&self, incoming_key: &str) {
        let descriptors = self.snapshot_descriptors();
        let mut victims = self.policy.eviction_candidates(&descriptors);
        if victims.is_empty() {
            // Nothing stale enough: fall back to the least recently used.
            victims = descriptors
                .iter()
                .filter(|d| d.key != incoming_key)
                .min_by_key(|d| d.last_accessed)
                .map(|d| vec![d.key.clone()])
                .unwrap_or_default();
        }

        for victim in victims {
            if victim == incoming_key {
                continue;
            }
            if self.entries.len() < self.max_entries {
                break;
            }
            let lock = self.locks.lock_for(&victim);
            let removed = match lock.try_lock() {
                Ok(guard) => {
                    self.entries.remove(&victim);
                    drop(guard);
                    true
                }
                Err(_) => false,
            };
            self.locks.release(&victim, lock);
            if removed {
                tracing::debug!(key = %victim, "evicted entry for capacity");
            }
        }
    }

    fn snapshot_descriptors(&self) -> Vec<CacheEntryDescriptor> {
        self.entries
            .iter()
            .map(|entry| entry.value().descriptor(entry.key()))
            .collect()
    }

    /// Remove expired entries and the eviction policy's candidates.
    ///
    /// Every candidate is re-checked under its per-key lock before removal;
    /// an entry touched since the snapshot is left alone. Returns the
    /// number of entries removed.
    pub async fn sweep_once(&self, token: &CancellationToken) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut live = Vec::new();
        for entry in self.entries.iter() {
            if entry.value().is_expired(now) {
                expired.push(entry.key().clone());
            } else {
                live.push(entry.value().descriptor(entry.key()));
            }
        }
        let mut victims = expired;
        victims.extend(self.policy.eviction_candidates(&live));

        let mut removed = 0_usize;
        for key in victims {
            if token.is_cancelled() {
                break;
            }
            let lock = self.locks.lock_for(&key);
            let Some(guard) = Self::acquire(&lock, token).await else {
                self.locks.release(&key, lock);
                break;
            };
            let evictable = self
                .entries
                .get(&key)
                .map(|e| e.is_expired(Instant::now()) || self.policy.should_evict(&e.descriptor(&key)))
                .unwrap_or(false);
            if evictable {
                self.entries.remove(&key);
                removed += 1;
            }
            drop(guard);
            self.locks.release(&key, lock);
        }
        removed
    }

    /// Remove every key starting with the prefix, returning the count.
    ///
    /// Distinct keys carry no ordering guarantee, so the removals run
    /// concurrently.
    pub async fn remove_by_prefix(&self, prefix: &str, token: &CancellationToken) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        let removals = keys.iter().map(|key| self.remove(key, token));
        futures::future::join_all(removals)
            .await
            .into_iter()
            .filter(CacheOperationResult::is_success)
            .count()
    }

    /// Spawn the periodic sweep task. The task stops when the token fires.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let provider = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it so a fresh provider
            // is not swept before it has served anything.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = provider.sweep_once(&token).await;
                        if removed > 0 {
                            tracing::debug!(removed, "cache sweep removed entries");
                        }
                    }
                }
            }
        })
    }

    /// Spawn a task applying cluster invalidation events to this store.
    pub fn spawn_invalidation_listener(
        self: Arc<Self>,
        bus: Arc<dyn InvalidationBus>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let provider = self;
        tokio::spawn(async move {
            let mut receiver = match bus.subscribe().await {
                Ok(receiver) => receiver,
                Err(e) => {
                    tracing::error!(error = %e, "failed to subscribe to invalidation bus");
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = receiver.recv() => match event {
                        Ok(InvalidationEvent::ByKey { key }) => {
                            let _ = provider.remove(&key, &token).await;
                        }
                        Ok(InvalidationEvent::ByPattern { prefix }) => {
                            let removed = provider.remove_by_prefix(&prefix, &token).await;
                            tracing::debug!(prefix = %prefix, removed, "applied pattern invalidation");
                        }
                        Ok(InvalidationEvent::ClearAll) => {
                            let _ = provider.clear_all(&token).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "invalidation subscription ended");
                            break;
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get_value(
        &self,
        key: &str,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value> {
        self.emit_before(key, CacheOperation::Get);
        let result = self.get_inner(key, options, token).await;
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
        token: &CancellationToken,
    ) -> CacheOperationResult<CacheEntryDescriptor> {
        self.emit_before(key, CacheOperation::Descriptor);
        let result = self.descriptor_inner(key, token).await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::CacheStatus;
    use serde_json::json;

    fn provider() -> MemoryCacheProvider {
        MemoryCacheProvider::new(MemoryCacheConfig::default(), Arc::new(CacheMetrics::new()))
            .unwrap()
    }

    fn small_provider(max_entries: usize) -> MemoryCacheProvider {
        let config = MemoryCacheConfig {
            max_entries,
            default_ttl: None,
            ..Default::default()
        };
        MemoryCacheProvider::new(config, Arc::new(CacheMetrics::new())).unwrap()
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let cache = provider();
        let token = CancellationToken::new();

        let set = cache
            .set_value("k1", json!({"a": 1}), None, &token)
            .await;
        assert!(set.is_success());

        let get = cache.get_value("k1", None, &token).await;
        assert!(get.is_success());
        assert_eq!(get.into_value(), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_get_missing_returns_not_found() {
        let cache = provider();
        let token = CancellationToken::new();
        let result = cache.get_value("absent", None, &token).await;
        assert_eq!(result.status(), CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_key_short_circuits() {
        let cache = provider();
        let token = CancellationToken::new();

        let result = cache.get_value("bad key!", None, &token).await;
        assert_eq!(result.status(), CacheStatus::ValidationError);

        let result = cache.set_value("bad key!", json!(1), None, &token).await;
        assert_eq!(result.status(), CacheStatus::ValidationError);
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_absolute_expiration_lapses() {
        let cache = provider();
        let token = CancellationToken::new();
        let options = CacheEntryOptions::new()
            .with_absolute_expiration(chrono::Duration::milliseconds(20))
            .unwrap();

        cache
            .set_value("ttl", json!("v"), Some(&options), &token)
            .await;
        assert!(cache.get_value("ttl", None, &token).await.is_success());

        tokio::time::sleep(Duration::from_millis(30)).await;
        let result = cache.get_value("ttl", None, &token).await;
        assert_eq!(result.status(), CacheStatus::NotFound);
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_sliding_expiration_renews_on_access() {
        let cache = provider();
        let token = CancellationToken::new();
        let options = CacheEntryOptions::new()
            .with_sliding_expiration(chrono::Duration::milliseconds(100))
            .unwrap();

        cache
            .set_value("slide", json!("v"), Some(&options), &token)
            .await;

        // Keep touching inside the window; the entry must stay alive past
        // the original deadline.
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(40)).await;
            assert!(cache.get_value("slide", None, &token).await.is_success());
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        let result = cache.get_value("slide", None, &token).await;
        assert_eq!(result.status(), CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn test_absolute_wins_over_sliding_renewal() {
        let cache = provider();
        let token = CancellationToken::new();
        let options = CacheEntryOptions::new()
            .with_absolute_expiration(chrono::Duration::milliseconds(120))
            .unwrap()
            .with_sliding_expiration(chrono::Duration::milliseconds(80))
            .unwrap();

        cache
            .set_value("both", json!("v"), Some(&options), &token)
            .await;

        // Renew the sliding window repeatedly; the absolute deadline still
        // removes the entry.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get_value("both", None, &token).await.is_success());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get_value("both", None, &token).await.is_success());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = cache.get_value("both", None, &token).await;
        assert_eq!(result.status(), CacheStatus::NotFound);
    }

    #[tokio::test]
    async fn test_descriptor_tracks_metadata() {
        let cache = provider();
        let token = CancellationToken::new();

        cache.set_value("meta", json!("v"), None, &token).await;
        cache.get_value("meta", None, &token).await;
        cache.get_value("meta", None, &token).await;

        let descriptor = cache
            .descriptor("meta", &token)
            .await
            .into_value()
            .unwrap();
        assert_eq!(descriptor.key, "meta");
        assert_eq!(descriptor.read_count, 2);
        assert!(descriptor.dirty);
        assert!(descriptor.size_bytes > 0);
        assert!(descriptor.last_accessed >= descriptor.created_at);

        // Descriptor reads must not count as accesses.
        let again = cache
            .descriptor("meta", &token)
            .await
            .into_value()
            .unwrap();
        assert_eq!(again.read_count, 2);
    }

    #[tokio::test]
    async fn test_exists_does_not_bump_read_count() {
        let cache = provider();
        let token = CancellationToken::new();

        cache.set_value("e1", json!(1), None, &token).await;
        assert_eq!(
            cache.exists("e1", &token).await.into_value(),
            Some(true)
        );
        assert_eq!(
            cache.exists("nope", &token).await.into_value(),
            Some(false)
        );

        let descriptor = cache.descriptor("e1", &token).await.into_value().unwrap();
        assert_eq!(descriptor.read_count, 0);
    }

    #[tokio::test]
    async fn test_overwrite_preserves_created_at() {
        let cache = provider();
        let token = CancellationToken::new();

        cache.set_value("ow", json!(1), None, &token).await;
        let first = cache.descriptor("ow", &token).await.into_value().unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.set_value("ow", json!(2), None, &token).await;
        let second = cache.descriptor("ow", &token).await.into_value().unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert!(second.last_accessed > first.last_accessed);
        assert_eq!(
            cache.get_value("ow", None, &token).await.into_value(),
            Some(json!(2))
        );
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recently_used() {
        let cache = small_provider(3);
        let token = CancellationToken::new();

        cache.set_value("a", json!(1), None, &token).await;
        cache.set_value("b", json!(2), None, &token).await;
        cache.set_value("c", json!(3), None, &token).await;

        // Touch "a" so "b" becomes the least recently used.
        cache.get_value("a", None, &token).await;

        cache.set_value("d", json!(4), None, &token).await;
        assert_eq!(cache.entry_count(), 3);
        assert_eq!(
            cache.get_value("b", None, &token).await.status(),
            CacheStatus::NotFound
        );
        assert!(cache.get_value("a", None, &token).await.is_success());
        assert!(cache.get_value("d", None, &token).await.is_success());
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let cache = small_provider(100);
        let token = CancellationToken::new();
        let options = CacheEntryOptions::new()
            .with_absolute_expiration(chrono::Duration::milliseconds(10))
            .unwrap();

        cache
            .set_value("gone", json!(1), Some(&options), &token)
            .await;
        cache.set_value("stays", json!(2), None, &token).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = cache.sweep_once(&token).await;
        assert_eq!(removed, 1);
        assert_eq!(cache.entry_count(), 1);
        assert!(cache.get_value("stays", None, &token).await.is_success());
    }

    #[tokio::test]
    async fn test_remove_by_prefix() {
        let cache = provider();
        let token = CancellationToken::new();

        cache.set_value("user_1", json!(1), None, &token).await;
        cache.set_value("user_2", json!(2), None, &token).await;
        cache.set_value("order_1", json!(3), None, &token).await;

        let removed = cache.remove_by_prefix("user_", &token).await;
        assert_eq!(removed, 2);
        assert_eq!(cache.entry_count(), 1);
        assert!(cache.get_value("order_1", None, &token).await.is_success());
    }

    #[tokio::test]
    async fn test_lock_table_drains_after_operations() {
        let cache = provider();
        let token = CancellationToken::new();

        cache.set_value("k", json!(1), None, &token).await;
        cache.get_value("k", None, &token).await;
        cache.remove("k", &token).await;
        assert!(cache.locks.is_empty());
    }
}
