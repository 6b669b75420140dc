//! # History Service
//!
//! Wires the ingest, query and manage capabilities to one bucket store and
//! owns their shared state: retention rules, the latest-value cache and the
//! cursor cache.
//!
//! ## Lifecycle
//!
//! `start` loads the persisted retention rules and starts the cursor sweep.
//! `stop` flushes the latest-value cache, releases every cursor and closes
//! the store. Stopping twice is a no-op.

mod ingest;
mod manage;
mod query;


pub use ingest::{AddHistory, ValueAddedHook};
pub use manage::{ManageHistory, RETENTION_RULES_KEY};
pub use query::ReadHistory;

use crate::domain::config::HistoryConfig;
use crate::domain::cursor::HistoryCursor;
use crate::domain::errors::HistoryError;
use crate::domain::latest::LatestPropertiesCache;
use crate::domain::metrics::HistoryMetrics;
use crate::domain::retention::RetentionEngine;
use crate::ports::outbound::{BucketStore, SystemTimeSource, TimeSource};
use shared_buckets::{CursorCache, InMemoryBucketStore};
use shared_types::ThingValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The History service.
pub struct HistoryService {
    config: HistoryConfig,
    store: Arc<dyn BucketStore>,
    retention: Arc<RetentionEngine>,
    latest: Arc<LatestPropertiesCache>,
    cursors: Arc<CursorCache<HistoryCursor>>,
    metrics: Arc<HistoryMetrics>,
    add_history: AddHistory,
    read_history: ReadHistory,
    manage_history: ManageHistory,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl HistoryService {
    /// Create a service over `store` using the system clock.
    pub fn new(store: Arc<dyn BucketStore>, config: HistoryConfig) -> Result<Self, HistoryError> {
        Self::with_time_source(store, config, Arc::new(SystemTimeSource))
    }

    /// Create a service backed by an in-memory store.
    pub fn new_in_memory(config: HistoryConfig) -> Result<Self, HistoryError> {
        Self::new(Arc::new(InMemoryBucketStore::new()), config)
    }

    /// Create a service with an injected clock.
    pub fn with_time_source(
        store: Arc<dyn BucketStore>,
        config: HistoryConfig,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, HistoryError> {
        let properties = store.bucket(&config.properties_bucket)?;
        let latest = Arc::new(LatestPropertiesCache::new(properties));
        let retention = Arc::new(RetentionEngine::new(config.default_rules.clone()));
        let cursors = Arc::new(CursorCache::new());
        let metrics = Arc::new(HistoryMetrics::new());

        let hook_cache = Arc::clone(&latest);
        let add_history = AddHistory::new(
            Arc::clone(&store),
            Arc::clone(&retention),
            Arc::clone(&time_source),
            Arc::clone(&metrics),
        )
        .with_hook(Arc::new(move |tv: &ThingValue| {
            hook_cache.handle_add_value(tv);
        }));

        let read_history = ReadHistory::new(
            Arc::clone(&store),
            Arc::clone(&cursors),
            Arc::clone(&latest),
            time_source,
            Arc::clone(&metrics),
            &config,
        );

        let manage_history = ManageHistory::new(
            Arc::clone(&retention),
            Arc::clone(&store),
            config.retention_bucket.clone(),
        );

        Ok(Self {
            config,
            store,
            retention,
            latest,
            cursors,
            metrics,
            add_history,
            read_history,
            manage_history,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Load retention rules and start the cursor sweep.
    ///
    /// Must run inside a tokio runtime for the sweep to start.
    pub fn start(&self) -> Result<(), HistoryError> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("History service already started");
            return Ok(());
        }
        let rules = self.manage_history.load_rules(&self.config.default_rules)?;
        self.cursors.start(self.config.cursor_sweep_interval);
        info!(
            rules,
            cursor_lifespan_ms = self.config.cursor_lifespan.as_millis() as u64,
            "History service started"
        );
        Ok(())
    }

    /// Flush, release all cursors and close the store.
    ///
    /// Every step runs even when an earlier one fails; the first error is
    /// returned.
    pub fn stop(&self) -> Result<(), HistoryError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut first_error = None;
        if let Err(e) = self.save_changes() {
            first_error.get_or_insert(e);
        }

        self.cursors.stop();
        let released = self.cursors.release_all();

        if let Err(e) = self.latest.close() {
            error!(error = %e, "Failed to close properties bucket");
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.store.close() {
            error!(error = %e, "Failed to close bucket store");
            first_error.get_or_insert(e.into());
        }

        info!(released_cursors = released, "History service stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Flush the latest-value cache to the properties bucket.
    pub fn save_changes(&self) -> Result<usize, HistoryError> {
        match self.latest.save_changes() {
            Ok(written) => {
                self.metrics.record_flush(written as u64, false);
                Ok(written)
            }
            Err(e) => {
                self.metrics.record_flush(0, true);
                Err(e)
            }
        }
    }

    /// The ingest capability.
    pub fn add_history(&self) -> &AddHistory {
        &self.add_history
    }

    /// The read capability.
    pub fn read_history(&self) -> &ReadHistory {
        &self.read_history
    }

    /// The manage capability.
    pub fn manage_history(&self) -> &ManageHistory {
        &self.manage_history
    }

    pub fn metrics(&self) -> &HistoryMetrics {
        &self.metrics
    }

    pub fn latest(&self) -> &LatestPropertiesCache {
        &self.latest
    }

    pub fn retention(&self) -> &RetentionEngine {
        &self.retention
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Number of cursors currently leased.
    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// True after `stop`.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
