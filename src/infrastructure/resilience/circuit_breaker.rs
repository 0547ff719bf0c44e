//! Circuit breaker implementation
//!
//! Classic three-state breaker: Closed (normal operation), Open (failing
//! fast), HalfOpen (probing recovery). Failures below the threshold leave
//! the circuit closed; once the break duration elapses the next call runs
//! as a half-open probe - success closes the circuit, failure re-opens it.
//!
//! The breaker wraps arbitrary operations, not just the cache contract, so
//! it preserves error semantics: an operation's error propagates to the
//! caller after bookkeeping, never swallowed.

use crate::domain::entry::{CacheEntryDescriptor, CacheEntryOptions};
use crate::domain::ports::cache::CacheProvider;
use crate::domain::result::{CacheOperationResult, CacheStatus};
use crate::infrastructure::constants::{
    CIRCUIT_BREAKER_BREAK_DURATION, CIRCUIT_BREAKER_FAILURE_THRESHOLD,
};
use crate::infrastructure::events::CacheEventBus;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed = 0,
    /// Failing fast - calls are diverted to the fallback
    Open = 1,
    /// Probing recovery - the next call decides the direction
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            // Default to the safest state
            _ => CircuitState::Open,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures needed to trip the circuit
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before probing
    pub break_duration: Duration,
    /// Breaker name for logging
    pub name: String,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: CIRCUIT_BREAKER_FAILURE_THRESHOLD,
            break_duration: CIRCUIT_BREAKER_BREAK_DURATION,
            name: "default".to_string(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the break duration
    pub fn with_break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }
}

/// Three-state circuit breaker with atomic state management
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    /// Time of the most recent trip, for break-duration checks
    opened_at: RwLock<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        tracing::info!(
            breaker = %config.name,
            failure_threshold = config.failure_threshold,
            break_secs = config.break_duration.as_secs(),
            "circuit breaker initialized"
        );
        Self {
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            opened_at: RwLock::new(None),
        }
    }

    /// Current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Current consecutive-failure count
    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Execute `action` under breaker protection.
    ///
    /// While the circuit is open and the break has not elapsed - or the
    /// token has already fired - `fallback` runs instead and no bookkeeping
    /// happens. Otherwise `action` runs; its error propagates to the caller
    /// after the failure is recorded.
    pub async fn execute<T, E, F, Fut, FB, FutB>(
        &self,
        action: F,
        fallback: FB,
        token: &CancellationToken,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        FB: FnOnce() -> FutB,
        FutB: Future<Output = std::result::Result<T, E>>,
    {
        if token.is_cancelled() || !self.call_permitted() {
            return fallback().await;
        }
        let result = action().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        result
    }

    /// Whether a call may proceed right now.
    ///
    /// An open circuit whose break duration has elapsed transitions to
    /// half-open and admits the call as a probe.
    pub fn call_permitted(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if self.break_elapsed() {
                    self.transition_to(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call: reset the failure count and close.
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if self.state() != CircuitState::Closed {
            self.transition_to(CircuitState::Closed);
        }
    }

    /// Record a failed call, tripping the circuit at the threshold.
    ///
    /// A failure during a half-open probe re-opens immediately.
    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        match self.state() {
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open),
            CircuitState::Closed => {
                if failures >= self.config.failure_threshold {
                    self.transition_to(CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn break_elapsed(&self) -> bool {
        match self.opened_at.read() {
            Ok(opened_at) => match *opened_at {
                Some(opened) => opened.elapsed() >= self.config.break_duration,
                None => true,
            },
            Err(_) => false,
        }
    }

    fn transition_to(&self, new_state: CircuitState) {
        let old_state = self.state();
        if old_state == new_state {
            return;
        }
        self.state.store(new_state as u8, Ordering::Release);
        match new_state {
            CircuitState::Open => {
                if let Ok(mut opened_at) = self.opened_at.write() {
                    *opened_at = Some(Instant::now());
                }
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
                if let Ok(mut opened_at) = self.opened_at.write() {
                    *opened_at = None;
                }
            }
            CircuitState::HalfOpen => {}
        }
        tracing::info!(
            breaker = %self.config.name,
            from = %old_state,
            to = %new_state,
            "circuit breaker state transition"
        );
    }
}

/// Provider decorator applying a circuit breaker to the cache contract
///
/// `ConnectionError` results count as failures; every other status counts
/// as success (a miss is a working cache). While the circuit is open,
/// operations short-circuit to a `ConnectionError` result without touching
/// the inner provider.
pub struct CircuitBreakerProvider {
    inner: Arc<dyn CacheProvider>,
    breaker: CircuitBreaker,
}

impl CircuitBreakerProvider {
    pub fn new(inner: Arc<dyn CacheProvider>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config),
        }
    }

    /// The wrapped breaker, for state inspection
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn open_result<T>(&self) -> CacheOperationResult<T> {
        CacheOperationResult::connection_error(format!(
            "circuit breaker '{}' is open",
            self.breaker.config.name
        ))
    }

    fn record<T>(&self, result: CacheOperationResult<T>) -> CacheOperationResult<T> {
        if result.status() == CacheStatus::ConnectionError {
            self.breaker.record_failure();
        } else {
            self.breaker.record_success();
        }
        result
    }
}

#[async_trait]
impl CacheProvider for CircuitBreakerProvider {
    async fn get_value(
        &self,
        key: &str,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<Value> {
        if !self.breaker.call_permitted() {
            return self.open_result();
        }
        let result = self.inner.get_value(key, options, token).await;
        self.record(result)
    }

    async fn set_value(
        &self,
        key: &str,
        value: Value,
        options: Option<&CacheEntryOptions>,
        token: &CancellationToken,
    ) -> CacheOperationResult<()> {
        if !self.breaker.call_permitted() {
            return self.open_result();
        }
        let result = self.inner.set_value(key, value, options, token).await;
        self.record(result)
    }

    async fn remove(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<()> {
        if !self.breaker.call_permitted() {
            return self.open_result();
        }
        let result = self.inner.remove(key, token).await;
        self.record(result)
    }

    async fn exists(&self, key: &str, token: &CancellationToken) -> CacheOperationResult<bool> {
        if !self.breaker.call_permitted() {
            return self.open_result();
        }
        let result = self.inner.exists(key, token).await;
        self.record(result)
    }

    async fn descriptor(
        &self,
        key: &str,
        token: &CancellationToken,
    ) -> CacheOperationResult<CacheEntryDescriptor> {
        if !self.breaker.call_permitted() {
            return self.open_result();
        }
        let result = self.inner.descriptor(key, token).await;
        self.record(result)
    }

    async fn clear_all(&self, token: &CancellationToken) -> CacheOperationResult<()> {
        if !self.breaker.call_permitted() {
            return self.open_result();
        }
        let result = self.inner.clear_all(token).await;
        self.record(result)
    }

    fn events(&self) -> &CacheEventBus {
        self.inner.events()
    }
}
