//! # Hub Runtime Library
//!
//! Exposes the runtime's modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! ## Modular Structure
//!
//! - `container/` - Configuration and construction of the store and service
//! - `adapters/` - Bucket store backends
//! - `runtime` - Bus wiring, flush ticker and graceful shutdown

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod container;
pub mod runtime;

pub use container::{ConfigError, HubConfig, StorageConfig, StoreBackend};
pub use runtime::{history_sample, HubRuntime};
