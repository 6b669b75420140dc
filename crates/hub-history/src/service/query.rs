//! # Query Engine
//!
//! Leased cursors over a Thing's history and the latest-value read path.

use crate::domain::config::HistoryConfig;
use crate::domain::cursor::{HistoryCursor, NAME_FILTER_KEY};
use crate::domain::errors::HistoryError;
use crate::domain::latest::LatestPropertiesCache;
use crate::domain::metrics::HistoryMetrics;
use crate::ports::inbound::{CursorBatch, ReadHistoryApi};
use crate::ports::outbound::{BucketStore, TimeSource};
use shared_buckets::{CursorCache, CursorContext, CursorHandle};
use shared_types::{thing_addr, ThingValue, ThingValueMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Serves the read capability.
pub struct ReadHistory {
    store: Arc<dyn BucketStore>,
    cursors: Arc<CursorCache<HistoryCursor>>,
    latest: Arc<LatestPropertiesCache>,
    time_source: Arc<dyn TimeSource>,
    metrics: Arc<HistoryMetrics>,
    cursor_lifespan: Duration,
    max_batch_limit: usize,
}

impl ReadHistory {
    pub fn new(
        store: Arc<dyn BucketStore>,
        cursors: Arc<CursorCache<HistoryCursor>>,
        latest: Arc<LatestPropertiesCache>,
        time_source: Arc<dyn TimeSource>,
        metrics: Arc<HistoryMetrics>,
        config: &HistoryConfig,
    ) -> Self {
        Self {
            store,
            cursors,
            latest,
            time_source,
            metrics,
            cursor_lifespan: config.cursor_lifespan,
            max_batch_limit: config.max_batch_limit,
        }
    }

    fn cursor(
        &self,
        client_id: &str,
        cursor_key: &str,
    ) -> Result<CursorHandle<HistoryCursor>, HistoryError> {
        Ok(self.cursors.get(cursor_key, client_id, true)?)
    }

    fn now(&self) -> u64 {
        self.time_source.now_msec()
    }
}

impl ReadHistoryApi for ReadHistory {
    fn get_cursor(
        &self,
        client_id: &str,
        agent_id: &str,
        thing_id: &str,
        name_filter: Option<&str>,
    ) -> Result<String, HistoryError> {
        if agent_id.is_empty() || thing_id.is_empty() {
            return Err(HistoryError::invalid("cursor needs agent and thing id"));
        }
        let addr = thing_addr(agent_id, thing_id);
        let bucket = self.store.bucket(&addr)?;
        let context =
            CursorContext::new().with_value(NAME_FILTER_KEY, name_filter.unwrap_or_default());
        let cursor = match bucket.cursor(context) {
            Ok(cursor) => cursor,
            Err(e) => {
                if let Err(close_err) = bucket.close() {
                    warn!(bucket = %bucket.id(), error = %close_err, "Failed to close bucket");
                }
                return Err(e.into());
            }
        };

        let key = self.cursors.add(
            HistoryCursor::new(cursor),
            bucket,
            client_id,
            self.cursor_lifespan,
        );
        self.metrics.record_cursor_opened();
        debug!(client_id, thing_addr = %addr, name = ?name_filter, cursor_key = %key, "Cursor opened");
        Ok(key)
    }

    fn first(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError> {
        let cursor = self.cursor(client_id, cursor_key)?;
        let until = self.now();
        let value = cursor.lock().first(until);
        Ok(value)
    }

    fn last(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError> {
        let cursor = self.cursor(client_id, cursor_key)?;
        let value = cursor.lock().last();
        Ok(value)
    }

    fn next(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError> {
        let cursor = self.cursor(client_id, cursor_key)?;
        let until = self.now();
        let value = cursor.lock().next(until);
        Ok(value)
    }

    fn prev(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError> {
        let cursor = self.cursor(client_id, cursor_key)?;
        let value = cursor.lock().prev();
        Ok(value)
    }

    fn seek(
        &self,
        client_id: &str,
        cursor_key: &str,
        timestamp_msec: u64,
    ) -> Result<Option<ThingValue>, HistoryError> {
        info!(client_id, cursor_key, timestamp_msec, "Seek");
        let cursor = self.cursor(client_id, cursor_key)?;
        let until = self.now();
        let value = cursor.lock().seek(timestamp_msec, until);
        Ok(value)
    }

    fn next_n(
        &self,
        client_id: &str,
        cursor_key: &str,
        limit: usize,
    ) -> Result<CursorBatch, HistoryError> {
        let cursor = self.cursor(client_id, cursor_key)?;
        let until = self.now();
        let (values, items_remaining) = cursor
            .lock()
            .next_n(limit.min(self.max_batch_limit), until);
        Ok(CursorBatch {
            values,
            items_remaining,
        })
    }

    fn prev_n(
        &self,
        client_id: &str,
        cursor_key: &str,
        limit: usize,
    ) -> Result<CursorBatch, HistoryError> {
        let cursor = self.cursor(client_id, cursor_key)?;
        let (values, items_remaining) = cursor.lock().prev_n(limit.min(self.max_batch_limit));
        Ok(CursorBatch {
            values,
            items_remaining,
        })
    }

    fn release(&self, client_id: &str, cursor_key: &str) -> Result<(), HistoryError> {
        self.cursors.release(client_id, cursor_key)?;
        Ok(())
    }

    fn get_latest(
        &self,
        agent_id: &str,
        thing_id: &str,
        names: &[String],
    ) -> Result<ThingValueMap, HistoryError> {
        if agent_id.is_empty() || thing_id.is_empty() {
            return Err(HistoryError::invalid("latest values need agent and thing id"));
        }
        self.latest.get_properties(&thing_addr(agent_id, thing_id), names)
    }
}
