//! Cache configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file,
//! then `POLYCACHE_`-prefixed environment variables (highest priority,
//! nested fields separated by `__`, e.g. `POLYCACHE_MEMORY__MAX_ENTRIES`).

use crate::domain::error::{Error, Result};
use crate::infrastructure::cache::providers::memory::MemoryCacheConfig;
use crate::infrastructure::constants::{
    CACHE_DEFAULT_MAX_ENTRIES, CACHE_DEFAULT_TTL, CACHE_SWEEP_INTERVAL,
    CIRCUIT_BREAKER_BREAK_DURATION, CIRCUIT_BREAKER_FAILURE_THRESHOLD, EVENT_BUS_CAPACITY,
    EVICTION_MAX_INACTIVE, EVICTION_MAX_ITEMS_PER_SWEEP, EVICTION_MAX_READ_COUNT,
};
use crate::infrastructure::resilience::CircuitBreakerConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// In-memory provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Capacity bound for the entry map
    pub max_entries: usize,
    /// TTL applied when options configure no expiration (None = keep forever)
    pub default_ttl_seconds: Option<u64>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_entries: CACHE_DEFAULT_MAX_ENTRIES,
            default_ttl_seconds: Some(CACHE_DEFAULT_TTL.as_secs()),
        }
    }
}

/// Eviction policy settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionSettings {
    /// Inactivity window before an entry becomes a sweep candidate
    pub max_inactive_seconds: u64,
    /// Candidates removed per sweep pass (0 = unbounded)
    pub max_items_per_sweep: usize,
    /// Read count above which an entry becomes evictable
    pub max_read_count: u64,
}

impl Default for EvictionSettings {
    fn default() -> Self {
        Self {
            max_inactive_seconds: EVICTION_MAX_INACTIVE.as_secs(),
            max_items_per_sweep: EVICTION_MAX_ITEMS_PER_SWEEP,
            max_read_count: EVICTION_MAX_READ_COUNT,
        }
    }
}

/// Circuit breaker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds an open circuit rejects calls before probing
    pub break_seconds: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            break_seconds: CIRCUIT_BREAKER_BREAK_DURATION.as_secs(),
        }
    }
}

/// Top-level cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub memory: MemorySettings,
    pub eviction: EvictionSettings,
    pub breaker: BreakerSettings,
    /// Seconds between background sweep passes
    pub sweep_interval_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            memory: MemorySettings::default(),
            eviction: EvictionSettings::default(),
            breaker: BreakerSettings::default(),
            sweep_interval_seconds: CACHE_SWEEP_INTERVAL.as_secs(),
        }
    }
}

impl CacheSettings {
    /// Load settings: defaults, then the optional file, then environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("POLYCACHE_").split("__"));

        let settings: Self = figment
            .extract()
            .map_err(|e| Error::config(format!("failed to load configuration: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.memory.max_entries == 0 {
            return Err(Error::config("memory.max_entries must be greater than zero"));
        }
        if self.memory.default_ttl_seconds == Some(0) {
            return Err(Error::config(
                "memory.default_ttl_seconds must be greater than zero when set",
            ));
        }
        if self.eviction.max_inactive_seconds == 0 {
            return Err(Error::config(
                "eviction.max_inactive_seconds must be greater than zero",
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(Error::config(
                "breaker.failure_threshold must be greater than zero",
            ));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(Error::config(
                "sweep_interval_seconds must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Memory provider configuration derived from these settings
    pub fn memory_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_entries: self.memory.max_entries,
            default_ttl: self.memory.default_ttl_seconds.map(Duration::from_secs),
            max_inactive_time: Duration::from_secs(self.eviction.max_inactive_seconds),
            max_items_per_sweep: self.eviction.max_items_per_sweep,
            max_read_count: self.eviction.max_read_count,
            events_capacity: EVENT_BUS_CAPACITY,
        }
    }

    /// Circuit breaker configuration derived from these settings
    pub fn breaker_config(&self, name: impl Into<String>) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new(name)
            .with_failure_threshold(self.breaker.failure_threshold)
            .with_break_duration(Duration::from_secs(self.breaker.break_seconds))
    }

    /// Interval between background sweep passes
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}
