//! # History Bus Adapter
//!
//! Feeds values published on the hub bus into the ingest path.
//!
//! Ingest errors are logged and the loop carries on; a bad value from one
//! agent never stops history for the others.

use crate::domain::errors::HistoryError;
use crate::ports::inbound::IngestApi;
use crate::service::HistoryService;
use shared_bus::{EventFilter, HubEvent, Subscription};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Routes bus events to the History service.
pub struct HistoryBusAdapter {
    service: Arc<HistoryService>,
}

impl HistoryBusAdapter {
    pub fn new(service: Arc<HistoryService>) -> Self {
        Self { service }
    }

    /// Filter selecting every event, action and config value.
    #[must_use]
    pub fn subscription_filter() -> EventFilter {
        EventFilter::all()
    }

    /// Store the values carried by one event.
    pub fn handle_event(&self, event: &HubEvent) -> Result<(), HistoryError> {
        let ingest = self.service.add_history();
        match event {
            HubEvent::ValuePublished(tv) => ingest.add_message(tv.clone()),
            HubEvent::ValuesPublished(values) if values.is_empty() => Ok(()),
            HubEvent::ValuesPublished(values) => ingest.add_messages(values.clone()),
        }
    }

    /// Consume the subscription until the bus closes or shutdown is signalled.
    ///
    /// Returns the number of events handled.
    pub async fn run(
        &self,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        info!("History bus adapter started");
        let mut handled = 0u64;
        loop {
            tokio::select! {
                event = subscription.recv() => {
                    let Some(event) = event else {
                        info!("Event bus closed");
                        break;
                    };
                    handled += 1;
                    if let Err(e) = self.handle_event(&event) {
                        warn!(values = event.len(), error = %e, "Failed to store published values");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Shutdown signalled");
                        break;
                    }
                }
            }
        }
        info!(handled, lagged = subscription.lagged(), "History bus adapter stopped");
        handled
    }
}
