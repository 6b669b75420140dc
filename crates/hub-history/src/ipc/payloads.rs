//! # IPC Payloads
//!
//! Request and response payloads of the read and manage capabilities.
//!
//! ## Identity
//!
//! Payloads carry no client id. The caller is taken from the
//! `RequestEnvelope` and owns every cursor it opens.

use crate::domain::errors::HistoryError;
use crate::domain::retention::{RetentionRule, RetentionRuleSet};
use crate::ports::inbound::CursorBatch;
use serde::{Deserialize, Serialize};
use shared_types::{ThingValue, ThingValueMap};

// ============================================================
// READ CAPABILITY
// ============================================================

/// Requests of the read capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ReadHistoryRequest {
    /// Open a cursor over a Thing's history.
    #[serde(rename_all = "camelCase")]
    GetCursor {
        agent_id: String,
        thing_id: String,
        #[serde(default)]
        name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    First { cursor_key: String },
    #[serde(rename_all = "camelCase")]
    Last { cursor_key: String },
    #[serde(rename_all = "camelCase")]
    Next { cursor_key: String },
    #[serde(rename_all = "camelCase")]
    Prev { cursor_key: String },
    #[serde(rename_all = "camelCase")]
    Seek {
        cursor_key: String,
        timestamp_msec: u64,
    },
    #[serde(rename_all = "camelCase")]
    NextN { cursor_key: String, limit: usize },
    #[serde(rename_all = "camelCase")]
    PrevN { cursor_key: String, limit: usize },
    #[serde(rename_all = "camelCase")]
    Release { cursor_key: String },
    /// Latest value per name. Empty `names` returns all.
    #[serde(rename_all = "camelCase")]
    GetLatest {
        agent_id: String,
        thing_id: String,
        #[serde(default)]
        names: Vec<String>,
    },
}

impl ReadHistoryRequest {
    /// Method name, for logging.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetCursor { .. } => "getCursor",
            Self::First { .. } => "first",
            Self::Last { .. } => "last",
            Self::Next { .. } => "next",
            Self::Prev { .. } => "prev",
            Self::Seek { .. } => "seek",
            Self::NextN { .. } => "nextN",
            Self::PrevN { .. } => "prevN",
            Self::Release { .. } => "release",
            Self::GetLatest { .. } => "getLatest",
        }
    }
}

/// Responses of the read capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReadHistoryResponse {
    #[serde(rename_all = "camelCase")]
    Cursor { cursor_key: String },
    /// Result of a single move. `valid` is false at the end of the data.
    Value {
        value: Option<ThingValue>,
        valid: bool,
    },
    Batch(CursorBatch),
    Released,
    Latest { values: ThingValueMap },
}

impl ReadHistoryResponse {
    pub(crate) fn from_move(value: Option<ThingValue>) -> Self {
        let valid = value.is_some();
        Self::Value { value, valid }
    }
}

// ============================================================
// MANAGE CAPABILITY
// ============================================================

/// Requests of the manage capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ManageHistoryRequest {
    #[serde(rename_all = "camelCase")]
    GetRetentionRule {
        agent_id: String,
        thing_id: String,
        name: String,
    },
    GetRetentionRules,
    SetRetentionRules { rules: RetentionRuleSet },
}

impl ManageHistoryRequest {
    /// Method name, for logging.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetRetentionRule { .. } => "getRetentionRule",
            Self::GetRetentionRules => "getRetentionRules",
            Self::SetRetentionRules { .. } => "setRetentionRules",
        }
    }
}

/// Responses of the manage capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ManageHistoryResponse {
    Rule { rule: Option<RetentionRule> },
    Rules { rules: RetentionRuleSet },
    RulesUpdated { count: usize },
}

// ============================================================
// ERRORS
// ============================================================

/// Error category sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryErrorType {
    InvalidValue,
    CursorNotFound,
    CursorExpired,
    CursorUnauthorized,
    StorageError,
    DecodeCorruption,
    SerializationError,
    PermissionDenied,
}

/// Error sent in place of a response payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryErrorPayload {
    pub error_type: HistoryErrorType,
    pub message: String,
}

impl HistoryErrorPayload {
    /// True when the client must open a new cursor.
    #[must_use]
    pub fn is_cursor_lost(&self) -> bool {
        matches!(
            self.error_type,
            HistoryErrorType::CursorNotFound
                | HistoryErrorType::CursorExpired
                | HistoryErrorType::CursorUnauthorized
        )
    }
}

impl From<HistoryError> for HistoryErrorPayload {
    fn from(err: HistoryError) -> Self {
        let error_type = match &err {
            HistoryError::InvalidValue { .. } => HistoryErrorType::InvalidValue,
            HistoryError::CursorNotFound { .. } => HistoryErrorType::CursorNotFound,
            HistoryError::CursorExpired { .. } => HistoryErrorType::CursorExpired,
            HistoryError::CursorUnauthorized { .. } => HistoryErrorType::CursorUnauthorized,
            HistoryError::Storage(_) => HistoryErrorType::StorageError,
            HistoryError::DecodeCorruption { .. } => HistoryErrorType::DecodeCorruption,
            HistoryError::Serialization { .. } => HistoryErrorType::SerializationError,
            HistoryError::PermissionDenied { .. } => HistoryErrorType::PermissionDenied,
        };
        Self {
            error_type,
            message: err.to_string(),
        }
    }
}
