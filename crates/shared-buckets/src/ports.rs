//! # Bucket Store Ports
//!
//! Interfaces a storage backend implements to host hub service data.
//!
//! Production: `RocksBucketStore` (hub-runtime, feature `rocksdb`)
//! Testing: [`InMemoryBucketStore`](crate::InMemoryBucketStore)

use crate::errors::BucketError;
use std::collections::BTreeMap;

/// Free-form values attached to a cursor when it is opened.
///
/// Services use it to carry per-cursor settings such as a name filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorContext {
    values: BTreeMap<String, String>,
}

impl CursorContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the context.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a value.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// An ordered key-value store partitioned into named buckets.
pub trait BucketStore: Send + Sync {
    /// Open a bucket, creating it when it does not exist.
    ///
    /// Each call returns a new handle. Handles are closed independently.
    fn bucket(&self, bucket_id: &str) -> Result<Box<dyn Bucket>, BucketError>;

    /// Close the store. Open handles fail afterwards.
    fn close(&self) -> Result<(), BucketError>;
}

/// A handle to one bucket.
pub trait Bucket: Send + Sync {
    /// The bucket's id.
    fn id(&self) -> &str;

    /// Get a value by key.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BucketError>;

    /// Put a single key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), BucketError>;

    /// Put several pairs in one write.
    fn set_multiple(&self, entries: BTreeMap<String, Vec<u8>>) -> Result<(), BucketError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), BucketError>;

    /// Open a cursor over the bucket's keys.
    fn cursor(&self, context: CursorContext) -> Result<Box<dyn BucketCursor>, BucketError>;

    /// Release the handle.
    fn close(&self) -> Result<(), BucketError>;
}

/// A bidirectional iterator over a bucket in key order.
///
/// Every move returns the entry at the new position, or `None` when the
/// cursor moved past either end.
pub trait BucketCursor: Send {
    /// Id of the bucket being iterated.
    fn bucket_id(&self) -> &str;

    /// Context given when the cursor was opened.
    fn context(&self) -> &CursorContext;

    /// Move to the first entry.
    fn first(&mut self) -> Option<(String, Vec<u8>)>;

    /// Move to the last entry.
    fn last(&mut self) -> Option<(String, Vec<u8>)>;

    /// Move one entry forward.
    fn next(&mut self) -> Option<(String, Vec<u8>)>;

    /// Move one entry backward.
    fn prev(&mut self) -> Option<(String, Vec<u8>)>;

    /// Move to the first entry with a key greater than or equal to `key`.
    fn seek(&mut self, key: &str) -> Option<(String, Vec<u8>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_context_values() {
        let ctx = CursorContext::new().with_value("filter", "temperature");
        assert_eq!(ctx.value("filter"), Some("temperature"));
        assert_eq!(ctx.value("other"), None);
    }
}
