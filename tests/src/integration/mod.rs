//! # Integration Tests
//!
//! - `e2e_history`: values published on the bus, read back through cursors
//!   and the latest-value cache
//! - `ipc_flows`: JSON requests through the role-checking handler

pub mod e2e_history;
pub mod ipc_flows;
