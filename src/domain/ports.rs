//! Port interfaces
//!
//! Contracts between the caching core and its collaborators: the provider
//! contract itself, the remote key-value backend, the telemetry sink, and
//! the cluster invalidation bus. Implementations live in the
//! infrastructure layer or in the host application.

pub mod cache;
pub mod invalidation;
pub mod remote;
pub mod telemetry;
