//! # Ports
//!
//! - `inbound` - The capabilities the History service exposes
//! - `outbound` - What it needs from the host besides the bucket store

pub mod inbound;
pub mod outbound;
