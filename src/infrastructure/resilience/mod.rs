//! Resilience patterns
//!
//! Fault isolation for callers of unreliable backends: a classic
//! three-state circuit breaker and a provider decorator applying it to the
//! cache contract.

mod circuit_breaker;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerProvider, CircuitState,
};
