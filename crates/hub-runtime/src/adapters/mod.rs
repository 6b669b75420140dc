//! # Adapters
//!
//! Outbound port implementations used by the runtime.

pub mod storage;
