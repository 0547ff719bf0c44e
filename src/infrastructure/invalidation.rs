//! Local invalidation bus
//!
//! In-process implementation of the cluster invalidation port using
//! tokio::sync::broadcast. Multi-process deployments swap in a coordinator
//! backed implementation behind the same trait.

use crate::domain::error::{Error, Result};
use crate::domain::ports::invalidation::{InvalidationBus, InvalidationEvent, InvalidationReceiver};
use crate::infrastructure::constants::INVALIDATION_BUS_CAPACITY;
use async_trait::async_trait;
use tokio::sync::broadcast::{self, Receiver, Sender, error::RecvError};

/// Invalidation bus scoped to a single process
#[derive(Debug, Clone)]
pub struct LocalInvalidationBus {
    sender: Sender<InvalidationEvent>,
}

impl LocalInvalidationBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a bus with the default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(INVALIDATION_BUS_CAPACITY)
    }
}

impl Default for LocalInvalidationBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl InvalidationBus for LocalInvalidationBus {
    async fn publish(&self, event: InvalidationEvent) -> Result<usize> {
        Ok(self.sender.send(event).unwrap_or(0))
    }

    async fn subscribe(&self) -> Result<Box<dyn InvalidationReceiver>> {
        Ok(Box::new(LocalInvalidationReceiver {
            receiver: self.sender.subscribe(),
        }))
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver backed by a broadcast subscription
pub struct LocalInvalidationReceiver {
    receiver: Receiver<InvalidationEvent>,
}

#[async_trait]
impl InvalidationReceiver for LocalInvalidationReceiver {
    async fn recv(&mut self) -> Result<InvalidationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Ok(event),
                // Lagging only skips missed events; invalidation is
                // best-effort, so keep receiving.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "invalidation receiver lagged");
                }
                Err(RecvError::Closed) => {
                    return Err(Error::connection("invalidation bus closed"));
                }
            }
        }
    }
}
