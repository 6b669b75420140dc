//! # Test Utilities
//!
//! A settable clock and a bucket store that counts writes.

use crate::ports::outbound::TimeSource;
use shared_buckets::{Bucket, BucketCursor, BucketError, BucketStore, CursorContext};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Clock returning a fixed, adjustable time.
#[derive(Debug, Default)]
pub struct MockTimeSource {
    now: AtomicU64,
}

impl MockTimeSource {
    pub fn new(now_msec: u64) -> Self {
        Self {
            now: AtomicU64::new(now_msec),
        }
    }

    pub fn set(&self, now_msec: u64) {
        self.now.store(now_msec, Ordering::SeqCst);
    }

    pub fn advance(&self, msec: u64) {
        self.now.fetch_add(msec, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now_msec(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct WriteStats {
    sets: AtomicUsize,
    multi_sets: AtomicUsize,
    fail_writes: AtomicBool,
    failing_reads: AtomicUsize,
}

/// Store wrapper counting `set` and `set_multiple` calls.
///
/// Writes can be made to fail on demand, reads for a given number of calls.
pub struct CountingBucketStore {
    inner: Arc<dyn BucketStore>,
    stats: Arc<WriteStats>,
}

impl CountingBucketStore {
    pub fn new(inner: Arc<dyn BucketStore>) -> Self {
        Self {
            inner,
            stats: Arc::new(WriteStats::default()),
        }
    }

    /// Calls to `Bucket::set` across all buckets.
    pub fn set_calls(&self) -> usize {
        self.stats.sets.load(Ordering::SeqCst)
    }

    /// Calls to `Bucket::set_multiple` across all buckets.
    pub fn set_multiple_calls(&self) -> usize {
        self.stats.multi_sets.load(Ordering::SeqCst)
    }

    /// Make every following write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.stats.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `Bucket::get` fail.
    pub fn fail_next_reads(&self, count: usize) {
        self.stats.failing_reads.store(count, Ordering::SeqCst);
    }
}

impl BucketStore for CountingBucketStore {
    fn bucket(&self, bucket_id: &str) -> Result<Box<dyn Bucket>, BucketError> {
        let inner = self.inner.bucket(bucket_id)?;
        Ok(Box::new(CountingBucket {
            inner,
            stats: Arc::clone(&self.stats),
        }))
    }

    fn close(&self) -> Result<(), BucketError> {
        self.inner.close()
    }
}

struct CountingBucket {
    inner: Box<dyn Bucket>,
    stats: Arc<WriteStats>,
}

impl CountingBucket {
    fn check_write(&self) -> Result<(), BucketError> {
        if self.stats.fail_writes.load(Ordering::SeqCst) {
            return Err(BucketError::backend("injected write failure"));
        }
        Ok(())
    }
}

impl Bucket for CountingBucket {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BucketError> {
        let failing = self
            .stats
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(BucketError::backend("injected read failure"));
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), BucketError> {
        self.stats.sets.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        self.inner.set(key, value)
    }

    fn set_multiple(&self, entries: BTreeMap<String, Vec<u8>>) -> Result<(), BucketError> {
        self.stats.multi_sets.fetch_add(1, Ordering::SeqCst);
        self.check_write()?;
        self.inner.set_multiple(entries)
    }

    fn delete(&self, key: &str) -> Result<(), BucketError> {
        self.check_write()?;
        self.inner.delete(key)
    }

    fn cursor(&self, context: CursorContext) -> Result<Box<dyn BucketCursor>, BucketError> {
        self.inner.cursor(context)
    }

    fn close(&self) -> Result<(), BucketError> {
        self.inner.close()
    }
}
