//! # Request Envelope
//!
//! Wrapper for RPC requests arriving at a hub service.
//!
//! ## Identity
//!
//! - The `client_id` is set by the transport after authentication and is the
//!   sole source of truth for the caller's identity.
//! - The `role` is computed by the auth layer. Services only check it.
//! - Payloads MUST NOT carry their own identity fields.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Role of an authenticated client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    /// Not authenticated or no role assigned.
    #[default]
    None,
    /// Read-only access.
    Viewer,
    /// Can operate Things.
    Operator,
    /// Can configure Things.
    Manager,
    /// Full access.
    Admin,
    /// A hub service.
    Service,
}

/// A request from an authenticated client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope<T> {
    /// Unique identifier for correlating the response.
    pub correlation_id: Uuid,

    /// The calling client. Cursors and other sessions are owned by this id.
    pub client_id: String,

    /// The caller's role as computed by the auth layer.
    pub role: ClientRole,

    /// Epoch milliseconds when the request was created.
    pub timestamp_msec: u64,

    /// The request payload.
    pub payload: T,
}

impl<T> RequestEnvelope<T> {
    /// Wrap a payload for the given client.
    pub fn new(client_id: impl Into<String>, role: ClientRole, payload: T) -> Self {
        let timestamp_msec = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            correlation_id: Uuid::new_v4(),
            client_id: client_id.into(),
            role,
            timestamp_msec,
            payload,
        }
    }

    /// Build the response envelope for this request.
    pub fn reply<R>(&self, payload: R) -> ResponseEnvelope<R> {
        ResponseEnvelope {
            correlation_id: self.correlation_id,
            recipient_id: self.client_id.clone(),
            payload,
        }
    }
}

/// A response to a `RequestEnvelope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope<R> {
    /// The correlation id of the request.
    pub correlation_id: Uuid,
    /// The client that made the request.
    pub recipient_id: String,
    /// The response payload.
    pub payload: R,
}
