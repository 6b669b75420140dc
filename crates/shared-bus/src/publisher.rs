//! # Event Publisher
//!
//! Broadcast side of the hub bus. Every subscriber receives every event and
//! applies its own filter on receive.

use crate::events::{EventFilter, HubEvent};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Publishing seam used by agents and tests.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event, returning the number of subscribers it reached.
    async fn publish(&self, event: HubEvent) -> usize;
}

/// Bus over a `tokio::sync::broadcast` channel.
///
/// Dropping the bus closes every subscription once its backlog is drained.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<HubEvent>,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Subscribe to the values matching `filter`.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(?filter, "History subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: HubEvent) -> usize {
        let values = event.len();
        // send fails only when nobody is subscribed
        let reached = self.sender.send(event).unwrap_or(0);
        trace!(values, reached, "Values published");
        reached
    }
}
