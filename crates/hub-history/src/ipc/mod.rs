//! # IPC Layer
//!
//! Typed requests and responses for the read and manage capabilities, and
//! the handler that checks the caller's role before dispatching them.
//!
//! ## Identity
//!
//! Payloads contain no identity fields. The caller is derived solely from
//! the `RequestEnvelope`.

pub mod handler;
pub mod payloads;

pub use handler::{HistoryRequestHandler, ManageResult, ReadResult, MANAGE_ROLES, READ_ROLES};
pub use payloads::*;
