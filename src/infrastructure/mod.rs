//! Infrastructure layer - cache providers and cross-cutting concerns
//!
//! This module contains:
//! - The concurrent in-memory cache provider and its lock table
//! - The remote key-value provider adapter
//! - Eviction policy and stampede protection
//! - Circuit breaker and telemetry decorators
//! - Event bus, metrics, invalidation bus, and configuration

pub mod cache;
pub mod config;
pub mod constants;
pub mod events;
pub mod invalidation;
pub mod metrics;
pub mod resilience;
pub mod telemetry;
