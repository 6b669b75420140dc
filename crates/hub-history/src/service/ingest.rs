//! # Ingest Writer
//!
//! Validates, filters by retention and writes values to their Thing's bucket.

use crate::domain::encoding::{encode, validate};
use crate::domain::errors::HistoryError;
use crate::domain::metrics::HistoryMetrics;
use crate::domain::retention::RetentionEngine;
use crate::ports::inbound::IngestApi;
use crate::ports::outbound::{Bucket, BucketStore, TimeSource};
use shared_types::ThingValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Called with every value after it was written.
pub type ValueAddedHook = Arc<dyn Fn(&ThingValue) + Send + Sync>;

/// Writes values to the history store.
pub struct AddHistory {
    store: Arc<dyn BucketStore>,
    retention: Arc<RetentionEngine>,
    time_source: Arc<dyn TimeSource>,
    metrics: Arc<HistoryMetrics>,
    on_added: Option<ValueAddedHook>,
}

impl AddHistory {
    pub fn new(
        store: Arc<dyn BucketStore>,
        retention: Arc<RetentionEngine>,
        time_source: Arc<dyn TimeSource>,
        metrics: Arc<HistoryMetrics>,
    ) -> Self {
        Self {
            store,
            retention,
            time_source,
            metrics,
            on_added: None,
        }
    }

    /// Register the post-write hook.
    #[must_use]
    pub fn with_hook(mut self, hook: ValueAddedHook) -> Self {
        self.on_added = Some(hook);
        self
    }

    fn check(&self, tv: &ThingValue) -> Result<(), HistoryError> {
        validate(tv).inspect_err(|e| {
            self.metrics.record_rejected();
            warn!(
                agent_id = %tv.agent_id,
                thing_id = %tv.thing_id,
                name = %tv.name,
                error = %e,
                "Rejected value"
            );
        })
    }

    fn stamp(&self, tv: &mut ThingValue) {
        if tv.created_msec == 0 {
            tv.created_msec = self.time_source.now_msec();
        }
    }

    fn retained(&self, tv: &ThingValue) -> bool {
        if self.retention.is_retained(tv) {
            return true;
        }
        self.metrics.record_dropped();
        debug!(
            agent_id = %tv.agent_id,
            thing_id = %tv.thing_id,
            name = %tv.name,
            "Value not retained"
        );
        false
    }

    fn notify(&self, tv: &ThingValue) {
        if let Some(hook) = &self.on_added {
            hook(tv);
        }
    }
}

fn close_bucket(bucket: &dyn Bucket) {
    if let Err(e) = bucket.close() {
        warn!(bucket = %bucket.id(), error = %e, "Failed to close bucket");
    }
}

impl IngestApi for AddHistory {
    fn add_message(&self, mut tv: ThingValue) -> Result<(), HistoryError> {
        self.check(&tv)?;
        self.stamp(&mut tv);
        if !self.retained(&tv) {
            return Ok(());
        }

        let (key, data) = encode(&tv);
        let bucket = self.store.bucket(&tv.thing_addr())?;
        let result = bucket.set(&key, &data);
        close_bucket(bucket.as_ref());
        if let Err(e) = result {
            error!(bucket = %tv.thing_addr(), key = %key, error = %e, "Failed to store value");
            return Err(e.into());
        }

        self.metrics.record_stored(1);
        self.notify(&tv);
        Ok(())
    }

    fn add_messages(&self, values: Vec<ThingValue>) -> Result<(), HistoryError> {
        for tv in &values {
            self.check(tv)?;
        }

        let mut by_thing: BTreeMap<String, Vec<ThingValue>> = BTreeMap::new();
        for mut tv in values {
            self.stamp(&mut tv);
            if self.retained(&tv) {
                by_thing.entry(tv.thing_addr()).or_default().push(tv);
            }
        }

        let mut first_error = None;
        for (addr, batch) in by_thing {
            let entries: BTreeMap<String, Vec<u8>> = batch.iter().map(encode).collect();
            let result = self.store.bucket(&addr).and_then(|bucket| {
                let result = bucket.set_multiple(entries);
                close_bucket(bucket.as_ref());
                result
            });

            match result {
                Ok(()) => {
                    self.metrics.record_stored(batch.len() as u64);
                    debug!(bucket = %addr, count = batch.len(), "Stored batch");
                    batch.iter().for_each(|tv| self.notify(tv));
                }
                Err(e) => {
                    error!(bucket = %addr, count = batch.len(), error = %e, "Failed to store batch");
                    first_error.get_or_insert(HistoryError::from(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
