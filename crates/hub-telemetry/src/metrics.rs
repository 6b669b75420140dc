//! Prometheus metrics for the hub services.
//!
//! All metrics follow the naming convention: `hub_<service>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Process metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Values written to Thing buckets
    pub static ref VALUES_STORED: IntCounter = IntCounter::new(
        "hub_history_values_stored_total",
        "Values written to the history store"
    ).expect("metric creation failed");

    /// Values skipped by retention rules
    pub static ref VALUES_DROPPED: IntCounter = IntCounter::new(
        "hub_history_values_dropped_total",
        "Values not retained by policy"
    ).expect("metric creation failed");

    /// Values failing validation
    pub static ref VALUES_REJECTED: IntCounter = IntCounter::new(
        "hub_history_values_rejected_total",
        "Values rejected as invalid"
    ).expect("metric creation failed");

    /// Cursors handed out
    pub static ref CURSORS_OPENED: IntCounter = IntCounter::new(
        "hub_history_cursors_opened_total",
        "History cursors opened"
    ).expect("metric creation failed");

    /// Cursors currently leased
    pub static ref CURSORS_OPEN: IntGauge = IntGauge::new(
        "hub_history_cursors_open",
        "History cursors currently leased"
    ).expect("metric creation failed");

    /// Latest-value blobs written
    pub static ref PROPERTIES_FLUSHED: IntCounter = IntCounter::new(
        "hub_history_properties_flushed_total",
        "Latest-value records written to the store"
    ).expect("metric creation failed");

    /// Flushes that failed
    pub static ref FLUSH_ERRORS: IntCounter = IntCounter::new(
        "hub_history_flush_errors_total",
        "Latest-value flushes with at least one failed write"
    ).expect("metric creation failed");

    /// Things with unsaved latest values
    pub static ref DIRTY_THINGS: IntGauge = IntGauge::new(
        "hub_history_dirty_things",
        "Things whose latest values are not yet saved"
    ).expect("metric creation failed");
}

/// One reading of the History service counters.
///
/// Counter fields are cumulative since service start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySample {
    pub values_stored: u64,
    pub values_dropped: u64,
    pub values_rejected: u64,
    pub cursors_opened: u64,
    pub properties_flushed: u64,
    pub flush_errors: u64,
    pub open_cursors: usize,
    pub dirty_things: usize,
}

/// Handle to the registered metrics.
#[derive(Debug, Clone, Copy)]
pub struct MetricsHandle {
    _private: (),
}

/// Register all metrics with the process registry.
///
/// Metrics already registered by an earlier call are kept.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(VALUES_STORED.clone()),
        Box::new(VALUES_DROPPED.clone()),
        Box::new(VALUES_REJECTED.clone()),
        Box::new(CURSORS_OPENED.clone()),
        Box::new(CURSORS_OPEN.clone()),
        Box::new(PROPERTIES_FLUSHED.clone()),
        Box::new(FLUSH_ERRORS.clone()),
        Box::new(DIRTY_THINGS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { _private: () })
}

/// Raise a counter to a cumulative value. Never lowers it.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsHandle {
    /// Export a reading of the History service counters.
    pub fn record(&self, sample: &HistorySample) {
        advance(&VALUES_STORED, sample.values_stored);
        advance(&VALUES_DROPPED, sample.values_dropped);
        advance(&VALUES_REJECTED, sample.values_rejected);
        advance(&CURSORS_OPENED, sample.cursors_opened);
        advance(&PROPERTIES_FLUSHED, sample.properties_flushed);
        advance(&FLUSH_ERRORS, sample.flush_errors);
        CURSORS_OPEN.set(sample.open_cursors as i64);
        DIRTY_THINGS.set(sample.dirty_things as i64);
    }

    /// Encode all metrics as Prometheus text format.
    pub fn gather(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}
