//! # Production Storage Adapters
//!
//! Persistent bucket stores.
//!
//! ## Usage
//!
//! Enable the `rocksdb` feature to use the RocksDB store:
//!
//! ```toml
//! hub-runtime = { path = "...", features = ["rocksdb"] }
//! ```
//!
//! Without it the hub only runs on the in-memory store from `shared-buckets`.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_store;

#[cfg(feature = "rocksdb")]
pub use rocksdb_store::{RocksBucketStore, RocksStoreConfig};

pub use shared_buckets::InMemoryBucketStore;
