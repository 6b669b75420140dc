//! # In-Memory Bucket Store
//!
//! `BTreeMap` per bucket behind a `parking_lot::RwLock`. Handles and cursors
//! share the map, so writes are visible to open cursors on their next move.

use crate::errors::BucketError;
use crate::ports::{Bucket, BucketCursor, BucketStore, CursorContext};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type BucketData = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// Ordered in-memory store.
#[derive(Default)]
pub struct InMemoryBucketStore {
    buckets: RwLock<HashMap<String, BucketData>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryBucketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets created so far.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }
}

impl BucketStore for InMemoryBucketStore {
    fn bucket(&self, bucket_id: &str) -> Result<Box<dyn Bucket>, BucketError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BucketError::Closed {
                bucket_id: bucket_id.to_string(),
            });
        }
        if bucket_id.is_empty() {
            return Err(BucketError::InvalidBucketId {
                bucket_id: String::new(),
            });
        }
        let data = self
            .buckets
            .write()
            .entry(bucket_id.to_string())
            .or_default()
            .clone();
        Ok(Box::new(InMemoryBucket {
            id: bucket_id.to_string(),
            data,
            store_closed: self.closed.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn close(&self) -> Result<(), BucketError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

struct InMemoryBucket {
    id: String,
    data: BucketData,
    store_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl InMemoryBucket {
    fn check_open(&self) -> Result<(), BucketError> {
        if self.closed.load(Ordering::Acquire) || self.store_closed.load(Ordering::Acquire) {
            return Err(BucketError::Closed {
                bucket_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

impl Bucket for InMemoryBucket {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BucketError> {
        self.check_open()?;
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), BucketError> {
        self.check_open()?;
        self.data.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn set_multiple(&self, entries: BTreeMap<String, Vec<u8>>) -> Result<(), BucketError> {
        self.check_open()?;
        self.data.write().extend(entries);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), BucketError> {
        self.check_open()?;
        self.data.write().remove(key);
        Ok(())
    }

    fn cursor(&self, context: CursorContext) -> Result<Box<dyn BucketCursor>, BucketError> {
        self.check_open()?;
        Ok(Box::new(InMemoryCursor {
            bucket_id: self.id.clone(),
            context,
            data: self.data.clone(),
            position: Position::Unpositioned,
        }))
    }

    fn close(&self) -> Result<(), BucketError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Position {
    Unpositioned,
    At(String),
    BeforeFirst,
    AfterLast,
}

struct InMemoryCursor {
    bucket_id: String,
    context: CursorContext,
    data: BucketData,
    position: Position,
}

impl InMemoryCursor {
    fn settle(
        &mut self,
        entry: Option<(String, Vec<u8>)>,
        off_end: Position,
    ) -> Option<(String, Vec<u8>)> {
        self.position = match &entry {
            Some((key, _)) => Position::At(key.clone()),
            None => off_end,
        };
        entry
    }
}

fn clone_entry((k, v): (&String, &Vec<u8>)) -> (String, Vec<u8>) {
    (k.clone(), v.clone())
}

impl BucketCursor for InMemoryCursor {
    fn bucket_id(&self) -> &str {
        &self.bucket_id
    }

    fn context(&self) -> &CursorContext {
        &self.context
    }

    fn first(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = self.data.read().iter().next().map(clone_entry);
        self.settle(entry, Position::AfterLast)
    }

    fn last(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = self.data.read().iter().next_back().map(clone_entry);
        self.settle(entry, Position::BeforeFirst)
    }

    fn next(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = match &self.position {
            Position::Unpositioned | Position::BeforeFirst => return self.first(),
            Position::AfterLast => return None,
            Position::At(key) => self
                .data
                .read()
                .range::<str, _>((Bound::Excluded(key.as_str()), Bound::Unbounded))
                .next()
                .map(clone_entry),
        };
        self.settle(entry, Position::AfterLast)
    }

    fn prev(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = match &self.position {
            Position::Unpositioned | Position::AfterLast => return self.last(),
            Position::BeforeFirst => return None,
            Position::At(key) => self
                .data
                .read()
                .range::<str, _>((Bound::Unbounded, Bound::Excluded(key.as_str())))
                .next_back()
                .map(clone_entry),
        };
        self.settle(entry, Position::BeforeFirst)
    }

    fn seek(&mut self, key: &str) -> Option<(String, Vec<u8>)> {
        let entry = self
            .data
            .read()
            .range::<str, _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(clone_entry);
        self.settle(entry, Position::AfterLast)
    }
}
