//! # Event Bus Integration
//!
//! Subscribes the History service to values published by Things.

pub mod adapter;

pub use adapter::HistoryBusAdapter;
