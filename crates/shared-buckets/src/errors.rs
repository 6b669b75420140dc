//! # Errors
//!
//! Errors raised by bucket stores and the cursor cache.

use thiserror::Error;

/// Errors from bucket store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BucketError {
    /// The bucket or its store has been closed.
    #[error("bucket '{bucket_id}' is closed")]
    Closed { bucket_id: String },

    /// The bucket id cannot be used by this store.
    #[error("invalid bucket id '{bucket_id}'")]
    InvalidBucketId { bucket_id: String },

    /// The backing database failed.
    #[error("storage backend error: {message}")]
    Backend { message: String },
}

impl BucketError {
    /// Wrap a backend error message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Errors from the cursor cache.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorCacheError {
    /// No cursor is registered under this key.
    #[error("cursor '{key}' not found")]
    NotFound { key: String },

    /// The cursor was idle past its lifespan and has been closed.
    #[error("cursor '{key}' expired")]
    Expired { key: String },

    /// The cursor belongs to another client.
    #[error("cursor '{key}' is not owned by '{client_id}'")]
    Unauthorized { key: String, client_id: String },
}
