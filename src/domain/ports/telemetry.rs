//! Telemetry Sink Interface
//!
//! Consumed by the telemetry decorator. Transports (Application-Insights
//! style exporters, log pipelines) live outside this crate; sinks are
//! expected to buffer internally, so the calls are synchronous.

use crate::domain::ports::cache::CacheOperation;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Dependency-tracking event for one cache operation
#[derive(Debug, Clone)]
pub struct DependencyTelemetry {
    /// Dependency classification, always `"Cache"` for this crate
    pub dependency_type: &'static str,
    /// Which operation ran
    pub operation: CacheOperation,
    /// The key the operation targeted
    pub key: String,
    /// False for validation/connection/serialization/cancellation outcomes
    pub success: bool,
    /// Wall-clock start of the operation
    pub started_at: DateTime<Utc>,
    /// Elapsed time
    pub duration: Duration,
}

/// Exception-tracking event emitted on failure outcomes
#[derive(Debug, Clone)]
pub struct ExceptionTelemetry {
    /// Which operation failed
    pub operation: CacheOperation,
    /// The key the operation targeted
    pub key: String,
    /// Failure detail, typically the result's `details`
    pub message: String,
}

/// External telemetry sink
pub trait TelemetrySink: Send + Sync {
    /// Record a dependency call.
    fn track_dependency(&self, telemetry: DependencyTelemetry);

    /// Record a failure with operation context.
    fn track_exception(&self, telemetry: ExceptionTelemetry);
}
