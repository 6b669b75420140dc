//! # History Service
//!
//! Persists every event, action and config value published by a Thing and
//! answers bounded range queries over them.
//!
//! ## Architecture
//!
//! ```text
//! Bus ──ValuePublished──→ AddHistory ──retained?──→ bucket "{agent}/{thing}"
//!                              │
//!                              └──post-write──→ LatestPropertiesCache ──flush──→ bucket "properties"
//!
//! Client ──ReadHistoryRequest──→ ReadHistory ──→ CursorCache<HistoryCursor>
//! Admin  ──ManageHistoryRequest──→ ManageHistory ──→ RetentionEngine + bucket "$retention"
//! ```
//!
//! ## Storage Keys
//!
//! Values are stored under `"{created_msec:020}/{name}/{kind}/{sender}"` so
//! key order within a Thing's bucket is chronological.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Key codec, retention rules, latest-value cache, cursor state machine
//! - `ports/` - Capability traits (inbound) and the time source (outbound)
//! - `service/` - Ingest, query and manage services plus the `HistoryService` orchestrator
//! - `ipc/` - Typed request/response payloads and the role-checking handler
//! - `bus/` - Event bus adapter feeding published values into the ingest path
//!
//! ## Usage
//!
//! ```ignore
//! use hub_history::{HistoryConfig, HistoryService};
//!
//! let service = HistoryService::new_in_memory(HistoryConfig::default())?;
//! service.start()?;
//! service.add_history().add_message(value)?;
//! let key = service.read_history().get_cursor("user1", "ag1", "th1", Some("temp"))?;
//! let first = service.read_history().first("user1", &key)?;
//! service.stop()?;
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use domain::config::HistoryConfig;
pub use domain::cursor::{CursorState, Direction, HistoryCursor, NAME_FILTER_KEY};
pub use domain::encoding::{decode, encode, encode_timestamp, parse_key, KeyParts};
pub use domain::errors::HistoryError;
pub use domain::latest::LatestPropertiesCache;
pub use domain::metrics::{HistoryMetrics, HistoryMetricsSnapshot};
pub use domain::retention::{RetentionEngine, RetentionRule, RetentionRuleSet};
pub use ports::inbound::{CursorBatch, IngestApi, ManageHistoryApi, ReadHistoryApi};
pub use ports::outbound::{SystemTimeSource, TimeSource};
pub use service::{AddHistory, HistoryService, ManageHistory, ReadHistory};

// Re-export IPC types
pub use ipc::payloads::*;
pub use ipc::HistoryRequestHandler;

// Re-export Bus types
pub use bus::HistoryBusAdapter;
