//! Cache provider implementations
//!
//! Concrete implementations of the CacheProvider contract:
//! - Memory: concurrent in-process store (default, single-node)
//! - Remote: adapter over an external key-value backend (cluster deployments)

pub mod memory;
pub mod remote;
