//! LRU eviction policy
//!
//! Pure functions over descriptor snapshots: the policy never touches the
//! store. The background sweeper and the capacity check both consume
//! [`eviction_candidates`](LruEvictionPolicy::eviction_candidates).

use crate::domain::entry::CacheEntryDescriptor;
use crate::domain::error::{Error, Result};
use chrono::Utc;
use std::time::Duration;

/// Least-recently-used eviction policy with a read-count escape hatch
#[derive(Debug, Clone)]
pub struct LruEvictionPolicy {
    max_inactive_time: Duration,
    max_items_to_evict: usize,
    max_read_count: u64,
}

impl LruEvictionPolicy {
    /// Create a policy.
    ///
    /// `max_items_to_evict == 0` means unbounded. A zero `max_inactive_time`
    /// would make every entry a candidate on every sweep and is rejected.
    pub fn new(
        max_inactive_time: Duration,
        max_items_to_evict: usize,
        max_read_count: u64,
    ) -> Result<Self> {
        if max_inactive_time.is_zero() {
            return Err(Error::invalid_argument(
                "max_inactive_time must be greater than zero",
            ));
        }
        Ok(Self {
            max_inactive_time,
            max_items_to_evict,
            max_read_count,
        })
    }

    pub fn max_inactive_time(&self) -> Duration {
        self.max_inactive_time
    }

    /// Keys to evict, highest priority (least recently used) first.
    ///
    /// Entries whose `last_accessed` is older than `now - max_inactive_time`
    /// are selected, ordered oldest first, truncated to `max_items_to_evict`
    /// when that bound is non-zero.
    pub fn eviction_candidates(&self, entries: &[CacheEntryDescriptor]) -> Vec<String> {
        let inactive = chrono::Duration::from_std(self.max_inactive_time)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let cutoff = Utc::now() - inactive;

        let mut stale: Vec<&CacheEntryDescriptor> = entries
            .iter()
            .filter(|d| d.last_accessed < cutoff)
            .collect();
        stale.sort_by_key(|d| d.last_accessed);

        if self.max_items_to_evict > 0 {
            stale.truncate(self.max_items_to_evict);
        }
        stale.into_iter().map(|d| d.key.clone()).collect()
    }

    /// Monotonic importance signal: higher means less evictable.
    pub fn retention_priority(&self, descriptor: &CacheEntryDescriptor) -> u64 {
        descriptor.read_count
    }

    /// Whether a single entry should be evicted right now.
    ///
    /// Two independent triggers, either alone sufficient: the entry has
    /// been inactive past the policy window, or its read count exceeds the
    /// configured maximum.
    pub fn should_evict(&self, descriptor: &CacheEntryDescriptor) -> bool {
        let inactive = chrono::Duration::from_std(self.max_inactive_time)
            .unwrap_or_else(|_| chrono::Duration::MAX);
        let cutoff = Utc::now() - inactive;
        descriptor.last_accessed < cutoff || descriptor.read_count > self.max_read_count
    }
}
