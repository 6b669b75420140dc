//! # Retention Management
//!
//! The manage capability. Rules are persisted as one JSON document in the
//! retention bucket and loaded when the service starts.

use crate::domain::errors::HistoryError;
use crate::domain::retention::{restamp, rule_count, RetentionEngine, RetentionRule, RetentionRuleSet};
use crate::ports::inbound::ManageHistoryApi;
use crate::ports::outbound::BucketStore;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Key of the rule document in the retention bucket.
pub const RETENTION_RULES_KEY: &str = "rules";

/// Serves the manage capability.
pub struct ManageHistory {
    retention: Arc<RetentionEngine>,
    store: Arc<dyn BucketStore>,
    bucket_id: String,
}

impl ManageHistory {
    pub fn new(
        retention: Arc<RetentionEngine>,
        store: Arc<dyn BucketStore>,
        bucket_id: impl Into<String>,
    ) -> Self {
        Self {
            retention,
            store,
            bucket_id: bucket_id.into(),
        }
    }

    /// Install the persisted rules, or `defaults` when none are stored.
    ///
    /// An unreadable rule document is logged and replaced by the defaults.
    /// Returns the number of rules installed.
    pub fn load_rules(&self, defaults: &RetentionRuleSet) -> Result<usize, HistoryError> {
        let bucket = self.store.bucket(&self.bucket_id)?;
        let stored = bucket.get(RETENTION_RULES_KEY);
        if let Err(e) = bucket.close() {
            warn!(bucket = %self.bucket_id, error = %e, "Failed to close retention bucket");
        }

        let rules = match stored? {
            Some(blob) => match serde_json::from_slice::<RetentionRuleSet>(&blob) {
                Ok(rules) => rules,
                Err(e) => {
                    error!(error = %e, "Stored retention rules unreadable; using defaults");
                    defaults.clone()
                }
            },
            None => defaults.clone(),
        };
        let count = self.retention.replace(rules);
        info!(rules = count, "Retention rules loaded");
        Ok(count)
    }
}

impl ManageHistoryApi for ManageHistory {
    fn get_retention_rule(
        &self,
        agent_id: &str,
        thing_id: &str,
        name: &str,
    ) -> Option<RetentionRule> {
        self.retention.find_rule(agent_id, thing_id, name)
    }

    fn get_retention_rules(&self) -> RetentionRuleSet {
        self.retention.rules()
    }

    fn set_retention_rules(&self, rules: RetentionRuleSet) -> Result<(), HistoryError> {
        let rules = restamp(rules);
        let blob = serde_json::to_vec(&rules)?;

        let bucket = self.store.bucket(&self.bucket_id)?;
        let result = bucket.set(RETENTION_RULES_KEY, &blob);
        if let Err(e) = bucket.close() {
            warn!(bucket = %self.bucket_id, error = %e, "Failed to close retention bucket");
        }
        if let Err(e) = result {
            error!(error = %e, "Failed to persist retention rules");
            return Err(e.into());
        }

        let count = rule_count(&rules);
        self.retention.replace(rules);
        info!(rules = count, "Retention rules replaced");
        Ok(())
    }
}
