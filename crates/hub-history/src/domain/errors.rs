//! # Domain Errors
//!
//! Error types for the History service.
//!
//! Values that are not retained by policy are not an error; the ingest call
//! succeeds without writing.

use shared_buckets::{BucketError, CursorCacheError};
use shared_types::ClientRole;
use thiserror::Error;

/// Errors that can occur during history operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The value or request is missing required fields. Not retried.
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },

    /// No cursor exists under this key.
    #[error("cursor '{key}' not found")]
    CursorNotFound { key: String },

    /// The cursor idled past its lifespan. Open a new one.
    #[error("cursor '{key}' expired")]
    CursorExpired { key: String },

    /// The cursor belongs to another client.
    #[error("cursor '{key}' is not owned by '{client_id}'")]
    CursorUnauthorized { key: String, client_id: String },

    /// The bucket store failed.
    #[error("storage error: {0}")]
    Storage(#[from] BucketError),

    /// A stored key or value cannot be parsed.
    #[error("corrupt entry '{key}': {reason}")]
    DecodeCorruption { key: String, reason: String },

    /// A JSON blob could not be written or read.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// The caller's role does not grant the capability.
    #[error("client '{client_id}' with role {role:?} may not use {capability}")]
    PermissionDenied {
        client_id: String,
        role: ClientRole,
        capability: &'static str,
    },
}

impl HistoryError {
    /// Shorthand for an `InvalidValue` error.
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            reason: reason.into(),
        }
    }

    /// True for errors telling the client to open a new cursor.
    #[must_use]
    pub fn is_cursor_lost(&self) -> bool {
        matches!(
            self,
            Self::CursorNotFound { .. }
                | Self::CursorExpired { .. }
                | Self::CursorUnauthorized { .. }
        )
    }
}

impl From<CursorCacheError> for HistoryError {
    fn from(e: CursorCacheError) -> Self {
        match e {
            CursorCacheError::NotFound { key } => Self::CursorNotFound { key },
            CursorCacheError::Expired { key } => Self::CursorExpired { key },
            CursorCacheError::Unauthorized { key, client_id } => {
                Self::CursorUnauthorized { key, client_id }
            }
        }
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
