//! Cache operation event bus
//!
//! Before/after notifications for every provider operation, published over
//! tokio::sync::broadcast. Decorators subscribe to observe the inner
//! provider; hosts subscribe for diagnostics. Delivery to a lagging
//! subscriber may drop events - the bus is a notification channel, not a
//! durable log.

use crate::domain::ports::cache::CacheOperation;
use crate::infrastructure::constants::EVENT_BUS_CAPACITY;
use tokio::sync::broadcast::{self, Receiver, Sender};

/// Notification fired around every cache operation
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// Fired before the operation touches any state
    Before {
        /// Target key (`*` for whole-store operations)
        key: String,
        /// Operation kind
        operation: CacheOperation,
    },
    /// Fired after the operation resolves, failure paths included
    After {
        /// Target key (`*` for whole-store operations)
        key: String,
        /// Operation kind
        operation: CacheOperation,
        /// False for validation/connection/serialization/cancellation outcomes
        success: bool,
    },
}

impl CacheEvent {
    /// The key the event refers to
    pub fn key(&self) -> &str {
        match self {
            Self::Before { key, .. } | Self::After { key, .. } => key,
        }
    }

    /// The operation the event refers to
    pub fn operation(&self) -> CacheOperation {
        match self {
            Self::Before { operation, .. } | Self::After { operation, .. } => *operation,
        }
    }
}

/// Broadcast bus for cache operation events
#[derive(Debug, Clone)]
pub struct CacheEventBus {
    sender: Sender<CacheEvent>,
}

impl CacheEventBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a bus with the default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }

    /// Publish an event, returning the number of receivers that got it.
    ///
    /// Returns 0 when nobody is subscribed; publishing is never an error.
    pub fn publish(&self, event: CacheEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> Receiver<CacheEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CacheEventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
