//! Cache entry metadata types
//!
//! Options are validated when they are built, not when they are used: a
//! non-positive expiration never reaches a provider. Descriptors are
//! serializable snapshots of entry metadata; callers never see references
//! into a store's internal state.

use crate::domain::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relative importance of an entry, available to external rankers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Per-operation expiration and priority options
///
/// Both expirations may be configured at once; the absolute deadline wins
/// once elapsed, regardless of sliding renewals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntryOptions {
    absolute_expiration: Option<Duration>,
    sliding_expiration: Option<Duration>,
    priority: CachePriority,
}

impl CacheEntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fixed time-to-live measured from entry creation.
    ///
    /// Fails with a validation error when the duration is zero or negative.
    pub fn with_absolute_expiration(mut self, expiration: chrono::Duration) -> Result<Self> {
        self.absolute_expiration = Some(positive_duration("absolute expiration", expiration)?);
        Ok(self)
    }

    /// Set a time-to-live that resets on every access.
    ///
    /// Fails with a validation error when the duration is zero or negative.
    pub fn with_sliding_expiration(mut self, expiration: chrono::Duration) -> Result<Self> {
        self.sliding_expiration = Some(positive_duration("sliding expiration", expiration)?);
        Ok(self)
    }

    pub fn with_priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn absolute_expiration(&self) -> Option<Duration> {
        self.absolute_expiration
    }

    pub fn sliding_expiration(&self) -> Option<Duration> {
        self.sliding_expiration
    }

    pub fn priority(&self) -> CachePriority {
        self.priority
    }
}

fn positive_duration(field: &str, value: chrono::Duration) -> Result<Duration> {
    if value <= chrono::Duration::zero() {
        return Err(Error::validation(format!(
            "{} must be positive, got {}ms",
            field,
            value.num_milliseconds()
        )));
    }
    value
        .to_std()
        .map_err(|e| Error::validation(format!("{} out of range: {}", field, e)))
}

/// Serializable metadata snapshot for a single entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryDescriptor {
    /// The validated cache key
    pub key: String,
    /// When the entry was first written
    pub created_at: DateTime<Utc>,
    /// When the entry was last read or written
    pub last_accessed: DateTime<Utc>,
    /// Configured fixed time-to-live, if any
    pub absolute_expiration: Option<Duration>,
    /// Configured sliding window, if any
    pub sliding_expiration: Option<Duration>,
    /// Serialized payload size
    pub size_bytes: u64,
    /// Number of successful reads
    pub read_count: u64,
    /// True once the entry has been written at least once since creation
    pub dirty: bool,
    /// Priority recorded at set time
    pub priority: CachePriority,
}
