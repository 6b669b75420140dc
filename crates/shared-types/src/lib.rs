//! # Shared Types Crate
//!
//! Value and envelope types shared by the hub services.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `ThingValue` is defined once and used by the
//!   bus, the history store and the runtime.
//! - **Envelope Identity**: Request payloads carry no caller identity; the
//!   `RequestEnvelope` client id and role are authoritative.

pub mod entities;
pub mod envelope;

pub use entities::*;
pub use envelope::{ClientRole, RequestEnvelope, ResponseEnvelope};
