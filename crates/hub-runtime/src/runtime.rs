//! # Hub Runtime
//!
//! Owns the History service, the event bus and the background tasks that
//! tie them together.
//!
//! ## Startup Sequence
//!
//! 1. Build the bucket store and History service
//! 2. Start the service (load retention rules, start the cursor sweep)
//! 3. Subscribe the bus adapter to the event bus
//! 4. Start the latest-value flush ticker
//!
//! ## Shutdown Sequence
//!
//! 1. Signal shutdown to the background tasks and wait for them
//! 2. Stop the service (final flush, release cursors, close the store)

use crate::container::{build_history, HubConfig};
use anyhow::{Context, Result};
use hub_history::{HistoryBusAdapter, HistoryService};
use hub_telemetry::{log_event, HistorySample, MetricsHandle};
use parking_lot::Mutex;
use shared_bus::InMemoryEventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Read the History service counters for export.
pub fn history_sample(service: &HistoryService) -> HistorySample {
    let snapshot = service.metrics().snapshot();
    HistorySample {
        values_stored: snapshot.values_stored,
        values_dropped: snapshot.values_dropped,
        values_rejected: snapshot.values_rejected,
        cursors_opened: snapshot.cursors_opened,
        properties_flushed: snapshot.properties_flushed,
        flush_errors: snapshot.flush_errors,
        open_cursors: service.open_cursors(),
        dirty_things: service.latest().dirty_count(),
    }
}

/// The running hub.
pub struct HubRuntime {
    config: HubConfig,
    history: Arc<HistoryService>,
    bus: Arc<InMemoryEventBus>,
    metrics: Option<MetricsHandle>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HubRuntime {
    /// Create a runtime from configuration.
    pub fn new(config: HubConfig, metrics: Option<MetricsHandle>) -> Result<Self> {
        config.validate().context("Invalid hub configuration")?;
        let history = build_history(&config)?;
        Ok(Self::with_service(config, history, metrics))
    }

    /// Create a runtime around an existing History service.
    pub fn with_service(
        config: HubConfig,
        history: Arc<HistoryService>,
        metrics: Option<MetricsHandle>,
    ) -> Self {
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus_capacity));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            history,
            bus,
            metrics,
            tasks: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Start the service and the background tasks.
    pub fn start(&self) -> Result<()> {
        self.history
            .start()
            .context("Failed to start History service")?;

        let adapter = HistoryBusAdapter::new(Arc::clone(&self.history));
        let subscription = self.bus.subscribe(HistoryBusAdapter::subscription_filter());
        let shutdown = self.shutdown_rx.clone();
        let bus_task = tokio::spawn(async move {
            adapter.run(subscription, shutdown).await;
        });

        let flush_task = tokio::spawn(flush_loop(
            Arc::clone(&self.history),
            self.metrics,
            self.config.flush_interval,
            self.shutdown_rx.clone(),
        ));

        self.tasks.lock().extend([bus_task, flush_task]);

        log_event!(
            info,
            "history",
            "Hub runtime started",
            flush_secs = self.config.flush_interval.as_secs(),
            bus_capacity = self.config.bus_capacity,
            backend = ?self.config.storage.backend
        );
        Ok(())
    }

    /// Stop the background tasks and the service.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                error!("Background task failed: {}", e);
            }
        }

        self.history
            .stop()
            .context("Failed to stop History service")?;
        if let Some(metrics) = &self.metrics {
            metrics.record(&history_sample(&self.history));
        }

        info!("Shutdown complete");
        Ok(())
    }

    /// The event bus values are published on.
    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    /// The History service.
    pub fn history(&self) -> Arc<HistoryService> {
        Arc::clone(&self.history)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}

/// Write back dirty latest values every `period` until shutdown.
async fn flush_loop(
    history: Arc<HistoryService>,
    metrics: Option<MetricsHandle>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = history.save_changes() {
                    error!(error = %e, "Latest-value flush failed");
                }
                if let Some(metrics) = &metrics {
                    metrics.record(&history_sample(&history));
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
