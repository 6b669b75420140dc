//! # Service Configuration

use super::retention::RetentionRuleSet;
use std::time::Duration;

/// Default bucket holding the latest-value blobs.
pub const DEFAULT_PROPERTIES_BUCKET: &str = "properties";

/// Default bucket holding the persisted retention rules.
pub const DEFAULT_RETENTION_BUCKET: &str = "$retention";

/// Upper bound for `next_n`/`prev_n` batch sizes.
pub const DEFAULT_MAX_BATCH_LIMIT: usize = 1000;

/// Configuration for the History service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Idle time after which an unreleased cursor is closed.
    pub cursor_lifespan: Duration,
    /// How often the cursor cache looks for expired cursors.
    pub cursor_sweep_interval: Duration,
    /// Bucket for latest-value blobs, keyed by thing address.
    pub properties_bucket: String,
    /// Bucket holding the persisted rule set.
    pub retention_bucket: String,
    /// Rules used when none were persisted.
    pub default_rules: RetentionRuleSet,
    /// Larger batch requests are clamped to this.
    pub max_batch_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cursor_lifespan: Duration::from_secs(60),
            cursor_sweep_interval: Duration::from_secs(10),
            properties_bucket: DEFAULT_PROPERTIES_BUCKET.to_string(),
            retention_bucket: DEFAULT_RETENTION_BUCKET.to_string(),
            default_rules: RetentionRuleSet::new(),
            max_batch_limit: DEFAULT_MAX_BATCH_LIMIT,
        }
    }
}

impl HistoryConfig {
    /// Builder: set the cursor lifespan.
    #[must_use]
    pub fn with_cursor_lifespan(mut self, lifespan: Duration) -> Self {
        self.cursor_lifespan = lifespan;
        self
    }

    /// Builder: set the cursor sweep interval.
    #[must_use]
    pub fn with_cursor_sweep_interval(mut self, interval: Duration) -> Self {
        self.cursor_sweep_interval = interval;
        self
    }

    /// Builder: set the properties bucket.
    #[must_use]
    pub fn with_properties_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.properties_bucket = bucket.into();
        self
    }

    /// Builder: set the retention bucket.
    #[must_use]
    pub fn with_retention_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.retention_bucket = bucket.into();
        self
    }

    /// Builder: set the default retention rules.
    #[must_use]
    pub fn with_default_rules(mut self, rules: RetentionRuleSet) -> Self {
        self.default_rules = rules;
        self
    }

    /// Builder: set the batch limit.
    #[must_use]
    pub fn with_max_batch_limit(mut self, limit: usize) -> Self {
        self.max_batch_limit = limit.max(1);
        self
    }

    /// Clamp a requested batch size.
    #[must_use]
    pub fn clamp_limit(&self, limit: usize) -> usize {
        limit.min(self.max_batch_limit)
    }
}
