//! # Subscriptions
//!
//! A subscription yields only the values its filter selects. Batches are
//! narrowed to their matching values; a batch with none is skipped.
//!
//! A subscriber that falls more than the bus capacity behind loses the
//! oldest events. The loss is counted rather than reported as an error.

use crate::events::{EventFilter, HubEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Receiving end of the hub bus.
pub struct Subscription {
    receiver: broadcast::Receiver<HubEvent>,
    filter: EventFilter,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<HubEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            lagged: 0,
        }
    }

    /// Wait for the next event carrying matching values.
    ///
    /// Returns `None` once the bus is dropped and the backlog is drained.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = self.narrow(event) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    self.lagged += missed;
                    warn!(missed, total = self.lagged, "Subscriber fell behind; events lost");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    fn narrow(&self, event: HubEvent) -> Option<HubEvent> {
        match event {
            HubEvent::ValuePublished(tv) => self
                .filter
                .matches_value(&tv)
                .then_some(HubEvent::ValuePublished(tv)),
            HubEvent::ValuesPublished(values) => {
                let kept: Vec<_> = values
                    .into_iter()
                    .filter(|tv| self.filter.matches_value(tv))
                    .collect();
                (!kept.is_empty()).then_some(HubEvent::ValuesPublished(kept))
            }
        }
    }

    /// Events lost to lag so far.
    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}
