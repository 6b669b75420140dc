//! # Shared Buckets
//!
//! Storage collaborators shared by hub services.
//!
//! - [`BucketStore`]: an ordered key-value store partitioned into
//!   independently opened buckets, each with a bidirectional cursor.
//! - [`InMemoryBucketStore`]: `BTreeMap` backed store for tests and
//!   ephemeral hubs.
//! - [`CursorCache`]: hands out opaque keys for open cursors, bound to the
//!   client that opened them, and closes cursors left idle too long.
//!
//! Keys are ordered lexicographically by their UTF-8 bytes.

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cursor_cache;
pub mod errors;
pub mod memory;
pub mod ports;

pub use cursor_cache::{CursorCache, CursorHandle, DEFAULT_CURSOR_LIFESPAN};
pub use errors::{BucketError, CursorCacheError};
pub use memory::InMemoryBucketStore;
pub use ports::{Bucket, BucketCursor, BucketStore, CursorContext};
