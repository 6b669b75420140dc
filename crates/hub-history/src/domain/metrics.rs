//! # History Metrics
//!
//! Counters for ingest, query and flush activity. Exported by the runtime
//! through the telemetry crate.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared by the service components.
#[derive(Debug, Default)]
pub struct HistoryMetrics {
    /// Values written to a Thing bucket
    pub values_stored: AtomicU64,
    /// Values skipped by retention policy
    pub values_dropped: AtomicU64,
    /// Values rejected by validation
    pub values_rejected: AtomicU64,
    /// Cursors handed out
    pub cursors_opened: AtomicU64,
    /// Latest-value blobs written
    pub properties_flushed: AtomicU64,
    /// Failed latest-value writes
    pub flush_errors: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryMetricsSnapshot {
    pub values_stored: u64,
    pub values_dropped: u64,
    pub values_rejected: u64,
    pub cursors_opened: u64,
    pub properties_flushed: u64,
    pub flush_errors: u64,
}

impl HistoryMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stored(&self, count: u64) {
        self.values_stored.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.values_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.values_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cursor_opened(&self) {
        self.cursors_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, written: u64, failed: bool) {
        self.properties_flushed.fetch_add(written, Ordering::Relaxed);
        if failed {
            self.flush_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> HistoryMetricsSnapshot {
        HistoryMetricsSnapshot {
            values_stored: self.values_stored.load(Ordering::Relaxed),
            values_dropped: self.values_dropped.load(Ordering::Relaxed),
            values_rejected: self.values_rejected.load(Ordering::Relaxed),
            cursors_opened: self.cursors_opened.load(Ordering::Relaxed),
            properties_flushed: self.properties_flushed.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let metrics = HistoryMetrics::new();
        metrics.record_stored(3);
        metrics.record_dropped();
        metrics.record_rejected();
        metrics.record_cursor_opened();
        metrics.record_flush(2, true);

        let snap = metrics.snapshot();
        assert_eq!(snap.values_stored, 3);
        assert_eq!(snap.values_dropped, 1);
        assert_eq!(snap.values_rejected, 1);
        assert_eq!(snap.cursors_opened, 1);
        assert_eq!(snap.properties_flushed, 2);
        assert_eq!(snap.flush_errors, 1);
    }
}
