//! # Inbound Ports (Driving Ports)
//!
//! The three capabilities of the History service.
//!
//! Read calls name the calling client. Cursors are owned by that client and
//! any other client presenting the key is refused.

use crate::domain::errors::HistoryError;
use crate::domain::retention::{RetentionRule, RetentionRuleSet};
use serde::{Deserialize, Serialize};
use shared_types::{ThingValue, ThingValueMap};

/// A batch of values read through a cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorBatch {
    /// Values in iteration order.
    pub values: Vec<ThingValue>,
    /// False when the cursor ran out before the requested count.
    pub items_remaining: bool,
}

/// Ingest capability, fed by the bus subscription.
pub trait IngestApi: Send + Sync {
    /// Store one value.
    ///
    /// ## Errors
    ///
    /// - `InvalidValue`: agent, thing or name missing
    /// - `Storage`: the bucket write failed
    ///
    /// A value not retained by policy is not an error.
    fn add_message(&self, tv: ThingValue) -> Result<(), HistoryError>;

    /// Store a batch with one write per Thing.
    ///
    /// Every value is validated before anything is written.
    fn add_messages(&self, values: Vec<ThingValue>) -> Result<(), HistoryError>;
}

/// Read capability.
///
/// Moves return `Ok(None)` at the end of the data and an error when the
/// cursor is gone.
pub trait ReadHistoryApi: Send + Sync {
    /// Open a cursor over a Thing's history, optionally for one name.
    fn get_cursor(
        &self,
        client_id: &str,
        agent_id: &str,
        thing_id: &str,
        name_filter: Option<&str>,
    ) -> Result<String, HistoryError>;

    /// Oldest value up to now.
    fn first(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError>;

    /// Newest value.
    fn last(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError>;

    /// Next value up to now.
    fn next(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError>;

    /// Previous value.
    fn prev(&self, client_id: &str, cursor_key: &str) -> Result<Option<ThingValue>, HistoryError>;

    /// First value at or after a timestamp.
    fn seek(
        &self,
        client_id: &str,
        cursor_key: &str,
        timestamp_msec: u64,
    ) -> Result<Option<ThingValue>, HistoryError>;

    /// Up to `limit` next values.
    fn next_n(
        &self,
        client_id: &str,
        cursor_key: &str,
        limit: usize,
    ) -> Result<CursorBatch, HistoryError>;

    /// Up to `limit` previous values.
    fn prev_n(
        &self,
        client_id: &str,
        cursor_key: &str,
        limit: usize,
    ) -> Result<CursorBatch, HistoryError>;

    /// Close a cursor.
    fn release(&self, client_id: &str, cursor_key: &str) -> Result<(), HistoryError>;

    /// Latest value per name of a Thing. Empty `names` returns all.
    fn get_latest(
        &self,
        agent_id: &str,
        thing_id: &str,
        names: &[String],
    ) -> Result<ThingValueMap, HistoryError>;
}

/// Manage capability (privileged).
pub trait ManageHistoryApi: Send + Sync {
    /// The rule deciding retention of this name for this Thing, if any.
    fn get_retention_rule(&self, agent_id: &str, thing_id: &str, name: &str)
        -> Option<RetentionRule>;

    /// All rules.
    fn get_retention_rules(&self) -> RetentionRuleSet;

    /// Replace all rules and persist them.
    fn set_retention_rules(&self, rules: RetentionRuleSet) -> Result<(), HistoryError>;
}
