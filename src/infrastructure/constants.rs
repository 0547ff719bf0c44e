//! Crate-wide default values and tuning constants

use std::time::Duration;

// ============================================================================
// Memory store
// ============================================================================

/// Default maximum number of entries held by the in-memory provider
pub const CACHE_DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default time-to-live applied when options configure no expiration
pub const CACHE_DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Interval between background sweep passes
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Key used in events emitted by whole-store operations
pub const CLEAR_ALL_EVENT_KEY: &str = "*";

// ============================================================================
// Eviction policy
// ============================================================================

/// Entries untouched for longer than this are eviction candidates
pub const EVICTION_MAX_INACTIVE: Duration = Duration::from_secs(3600);

/// Upper bound on candidates returned per sweep (0 = unbounded)
pub const EVICTION_MAX_ITEMS_PER_SWEEP: usize = 100;

/// Read count above which an entry becomes evictable regardless of age
pub const EVICTION_MAX_READ_COUNT: u64 = 1_000_000;

// ============================================================================
// Circuit breaker
// ============================================================================

/// Consecutive failures before the circuit opens
pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// How long an open circuit rejects calls before probing
pub const CIRCUIT_BREAKER_BREAK_DURATION: Duration = Duration::from_secs(60);

// ============================================================================
// Events
// ============================================================================

/// Broadcast channel capacity for the cache event bus
pub const EVENT_BUS_CAPACITY: usize = 100;

/// Broadcast channel capacity for the local invalidation bus
pub const INVALIDATION_BUS_CAPACITY: usize = 100;

// ============================================================================
// Health
// ============================================================================

/// Hit ratio below which the cache is reported as degraded
pub const HEALTH_HIT_RATIO_DEGRADED: f64 = 0.5;

/// Error rate at or above which the cache is reported as unhealthy
pub const HEALTH_ERROR_RATE_UNHEALTHY: f64 = 0.25;

/// Minimum number of requests before health thresholds apply
pub const HEALTH_MIN_SAMPLES: u64 = 10;
