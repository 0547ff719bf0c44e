//! Cluster Invalidation Bus Interface
//!
//! Cross-process invalidation is delegated to an external coordinator;
//! this port is what the core consumes. Delivery is best-effort - the
//! non-goals explicitly exclude exactly-once broadcast semantics.

use crate::domain::error::Result;
use async_trait::async_trait;

/// Invalidation messages exchanged across cache instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// Remove a single key
    ByKey { key: String },
    /// Remove every key starting with the prefix
    ByPattern { prefix: String },
    /// Remove everything
    ClearAll,
}

/// Publish/subscribe bus for invalidation events
#[async_trait]
pub trait InvalidationBus: Send + Sync {
    /// Publish an event, returning the number of receivers reached.
    async fn publish(&self, event: InvalidationEvent) -> Result<usize>;

    /// Subscribe to future events.
    async fn subscribe(&self) -> Result<Box<dyn InvalidationReceiver>>;

    /// Number of active subscribers.
    fn subscriber_count(&self) -> usize;
}

/// Receiving side of an invalidation subscription
#[async_trait]
pub trait InvalidationReceiver: Send {
    /// Wait for the next event. Fails once the bus is closed.
    async fn recv(&mut self) -> Result<InvalidationEvent>;
}
