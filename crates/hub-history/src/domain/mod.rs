//! # Domain Layer
//!
//! Pure domain logic for the History service.
//!
//! ## Modules
//!
//! - `encoding` - Storage key codec and value validation
//! - `retention` - Rules deciding which values are persisted
//! - `latest` - Write-back cache of each Thing's most recent values
//! - `cursor` - Filtered, time-bounded cursor state machine
//! - `config` - Service configuration
//! - `metrics` - Ingest and query counters
//! - `errors` - Domain error types

pub mod config;
pub mod cursor;
pub mod encoding;
pub mod errors;
pub mod latest;
pub mod metrics;
pub mod retention;
