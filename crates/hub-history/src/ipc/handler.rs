//! # IPC Request Handler
//!
//! Dispatches read and manage requests to the History service.
//!
//! ## Security
//!
//! - Read: any authenticated role
//! - Manage: `Admin` only
//!
//! The caller is the envelope's `client_id`. A denied request is answered
//! with a `PermissionDenied` error payload and never reaches the service.

use crate::domain::errors::HistoryError;
use crate::ipc::payloads::*;
use crate::ports::inbound::{ManageHistoryApi, ReadHistoryApi};
use crate::service::HistoryService;
use shared_types::{ClientRole, RequestEnvelope, ResponseEnvelope};
use std::sync::Arc;
use tracing::{debug, warn};

/// Roles allowed to use the read capability.
pub const READ_ROLES: &[ClientRole] = &[
    ClientRole::Viewer,
    ClientRole::Operator,
    ClientRole::Manager,
    ClientRole::Admin,
    ClientRole::Service,
];

/// Roles allowed to use the manage capability.
pub const MANAGE_ROLES: &[ClientRole] = &[ClientRole::Admin];

pub type ReadResult = Result<ReadHistoryResponse, HistoryErrorPayload>;
pub type ManageResult = Result<ManageHistoryResponse, HistoryErrorPayload>;

/// Role-checking front of the History service.
pub struct HistoryRequestHandler {
    service: Arc<HistoryService>,
}

impl HistoryRequestHandler {
    pub fn new(service: Arc<HistoryService>) -> Self {
        Self { service }
    }

    /// Handle a read capability request.
    pub fn handle_read(
        &self,
        request: &RequestEnvelope<ReadHistoryRequest>,
    ) -> ResponseEnvelope<ReadResult> {
        let result = authorize(request, READ_ROLES, "read")
            .and_then(|()| self.dispatch_read(&request.client_id, &request.payload));
        if let Err(e) = &result {
            debug!(
                client_id = %request.client_id,
                method = request.payload.method(),
                error = %e,
                "Read request failed"
            );
        }
        request.reply(result.map_err(HistoryErrorPayload::from))
    }

    /// Handle a manage capability request.
    pub fn handle_manage(
        &self,
        request: &RequestEnvelope<ManageHistoryRequest>,
    ) -> ResponseEnvelope<ManageResult> {
        let result = authorize(request, MANAGE_ROLES, "manage")
            .and_then(|()| self.dispatch_manage(&request.payload));
        if let Err(e) = &result {
            warn!(
                client_id = %request.client_id,
                method = request.payload.method(),
                error = %e,
                "Manage request failed"
            );
        }
        request.reply(result.map_err(HistoryErrorPayload::from))
    }

    fn dispatch_read(
        &self,
        client_id: &str,
        request: &ReadHistoryRequest,
    ) -> Result<ReadHistoryResponse, HistoryError> {
        let read = self.service.read_history();
        let response = match request {
            ReadHistoryRequest::GetCursor {
                agent_id,
                thing_id,
                name,
            } => ReadHistoryResponse::Cursor {
                cursor_key: read.get_cursor(client_id, agent_id, thing_id, name.as_deref())?,
            },
            ReadHistoryRequest::First { cursor_key } => {
                ReadHistoryResponse::from_move(read.first(client_id, cursor_key)?)
            }
            ReadHistoryRequest::Last { cursor_key } => {
                ReadHistoryResponse::from_move(read.last(client_id, cursor_key)?)
            }
            ReadHistoryRequest::Next { cursor_key } => {
                ReadHistoryResponse::from_move(read.next(client_id, cursor_key)?)
            }
            ReadHistoryRequest::Prev { cursor_key } => {
                ReadHistoryResponse::from_move(read.prev(client_id, cursor_key)?)
            }
            ReadHistoryRequest::Seek {
                cursor_key,
                timestamp_msec,
            } => ReadHistoryResponse::from_move(read.seek(client_id, cursor_key, *timestamp_msec)?),
            ReadHistoryRequest::NextN { cursor_key, limit } => {
                ReadHistoryResponse::Batch(read.next_n(client_id, cursor_key, *limit)?)
            }
            ReadHistoryRequest::PrevN { cursor_key, limit } => {
                ReadHistoryResponse::Batch(read.prev_n(client_id, cursor_key, *limit)?)
            }
            ReadHistoryRequest::Release { cursor_key } => {
                read.release(client_id, cursor_key)?;
                ReadHistoryResponse::Released
            }
            ReadHistoryRequest::GetLatest {
                agent_id,
                thing_id,
                names,
            } => ReadHistoryResponse::Latest {
                values: read.get_latest(agent_id, thing_id, names)?,
            },
        };
        Ok(response)
    }

    fn dispatch_manage(
        &self,
        request: &ManageHistoryRequest,
    ) -> Result<ManageHistoryResponse, HistoryError> {
        let manage = self.service.manage_history();
        let response = match request {
            ManageHistoryRequest::GetRetentionRule {
                agent_id,
                thing_id,
                name,
            } => ManageHistoryResponse::Rule {
                rule: manage.get_retention_rule(agent_id, thing_id, name),
            },
            ManageHistoryRequest::GetRetentionRules => ManageHistoryResponse::Rules {
                rules: manage.get_retention_rules(),
            },
            ManageHistoryRequest::SetRetentionRules { rules } => {
                manage.set_retention_rules(rules.clone())?;
                ManageHistoryResponse::RulesUpdated {
                    count: self.service.retention().len(),
                }
            }
        };
        Ok(response)
    }
}

fn authorize<T>(
    request: &RequestEnvelope<T>,
    allowed: &[ClientRole],
    capability: &'static str,
) -> Result<(), HistoryError> {
    if allowed.contains(&request.role) {
        return Ok(());
    }
    Err(HistoryError::PermissionDenied {
        client_id: request.client_id.clone(),
        role: request.role,
        capability,
    })
}
