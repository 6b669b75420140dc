//! # RocksDB Bucket Store
//!
//! Persistent `BucketStore` over a single RocksDB database.
//!
//! ## Layout
//!
//! Every bucket shares the default column family. A record `key` in bucket
//! `id` is stored under `"{id}\0{key}"`, so a bucket is one contiguous key
//! range and RocksDB's byte order is the bucket's key order.
//!
//! ## Features
//!
//! - Atomic `set_multiple` through `WriteBatch`
//! - Snappy compression
//! - Bloom filters for point reads
//! - Cursors re-seek on every move, so they see writes made after opening

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use shared_buckets::{Bucket, BucketCursor, BucketError, BucketStore, CursorContext};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Separator between bucket id and record key.
const SEPARATOR: u8 = 0;

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksStoreConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 32MB)
    pub write_buffer_size: usize,
    /// fsync after each write (default: false)
    pub sync_writes: bool,
}

impl Default for RocksStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/history"),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 32 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

impl RocksStoreConfig {
    /// Config rooted at `path` with default tuning.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Config for testing (small buffers)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 2 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed bucket store.
pub struct RocksBucketStore {
    db: Arc<DB>,
    sync_writes: bool,
    closed: Arc<AtomicBool>,
}

impl RocksBucketStore {
    /// Open or create the database.
    pub fn open(config: RocksStoreConfig) -> Result<Self, BucketError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path)
            .map_err(|e| BucketError::backend(format!("failed to open RocksDB: {e}")))?;

        info!(path = %config.path.display(), "RocksDB bucket store opened");
        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.sync_writes,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl BucketStore for RocksBucketStore {
    fn bucket(&self, bucket_id: &str) -> Result<Box<dyn Bucket>, BucketError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BucketError::Closed {
                bucket_id: bucket_id.to_string(),
            });
        }
        if bucket_id.is_empty() || bucket_id.as_bytes().contains(&SEPARATOR) {
            return Err(BucketError::InvalidBucketId {
                bucket_id: bucket_id.to_string(),
            });
        }
        let mut prefix = Vec::with_capacity(bucket_id.len() + 1);
        prefix.extend_from_slice(bucket_id.as_bytes());
        prefix.push(SEPARATOR);

        Ok(Box::new(RocksBucket {
            id: bucket_id.to_string(),
            prefix,
            db: Arc::clone(&self.db),
            sync_writes: self.sync_writes,
            store_closed: Arc::clone(&self.closed),
            closed: AtomicBool::new(false),
        }))
    }

    fn close(&self) -> Result<(), BucketError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.db
            .flush()
            .map_err(|e| BucketError::backend(format!("RocksDB flush failed: {e}")))?;
        info!("RocksDB bucket store closed");
        Ok(())
    }
}

struct RocksBucket {
    id: String,
    prefix: Vec<u8>,
    db: Arc<DB>,
    sync_writes: bool,
    store_closed: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl RocksBucket {
    fn check_open(&self) -> Result<(), BucketError> {
        if self.closed.load(Ordering::Acquire) || self.store_closed.load(Ordering::Acquire) {
            return Err(BucketError::Closed {
                bucket_id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn full_key(&self, key: &str) -> Vec<u8> {
        full_key(&self.prefix, key)
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }
}

fn full_key(prefix: &[u8], key: &str) -> Vec<u8> {
    let mut full = Vec::with_capacity(prefix.len() + key.len());
    full.extend_from_slice(prefix);
    full.extend_from_slice(key.as_bytes());
    full
}

impl Bucket for RocksBucket {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BucketError> {
        self.check_open()?;
        self.db
            .get(self.full_key(key))
            .map_err(|e| BucketError::backend(format!("RocksDB get failed: {e}")))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), BucketError> {
        self.check_open()?;
        self.db
            .put_opt(self.full_key(key), value, &self.write_opts())
            .map_err(|e| BucketError::backend(format!("RocksDB put failed: {e}")))
    }

    fn set_multiple(&self, entries: BTreeMap<String, Vec<u8>>) -> Result<(), BucketError> {
        self.check_open()?;
        let mut batch = WriteBatch::default();
        for (key, value) in &entries {
            batch.put(self.full_key(key), value);
        }
        debug!(bucket = %self.id, entries = entries.len(), "RocksDB batch write");
        self.db
            .write_opt(batch, &self.write_opts())
            .map_err(|e| BucketError::backend(format!("RocksDB batch write failed: {e}")))
    }

    fn delete(&self, key: &str) -> Result<(), BucketError> {
        self.check_open()?;
        self.db
            .delete_opt(self.full_key(key), &self.write_opts())
            .map_err(|e| BucketError::backend(format!("RocksDB delete failed: {e}")))
    }

    fn cursor(&self, context: CursorContext) -> Result<Box<dyn BucketCursor>, BucketError> {
        self.check_open()?;
        Ok(Box::new(RocksCursor {
            bucket_id: self.id.clone(),
            prefix: self.prefix.clone(),
            context,
            db: Arc::clone(&self.db),
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
    At(Vec<u8>),
    BeforeFirst,
    AfterLast,
}

struct RocksCursor {
    bucket_id: String,
    prefix: Vec<u8>,
    context: CursorContext,
    db: Arc<DB>,
    position: Position,
}

impl RocksCursor {
    /// First entry of this bucket reached from `from` in `direction`,
    /// skipping an entry equal to `skip`.
    fn scan(
        &self,
        from: &[u8],
        direction: Direction,
        skip: Option<&[u8]>,
    ) -> Option<(Vec<u8>, String, Vec<u8>)> {
        for item in self.db.iterator(IteratorMode::From(from, direction)) {
            let (key, value) = match item {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(bucket = %self.bucket_id, error = %e, "RocksDB iteration failed");
                    return None;
                }
            };
            if !key.starts_with(&self.prefix) {
                return None;
            }
            if skip.is_some_and(|s| s == &key[..]) {
                continue;
            }
            let record_key = String::from_utf8_lossy(&key[self.prefix.len()..]).into_owned();
            return Some((key.to_vec(), record_key, value.to_vec()));
        }
        None
    }

    /// Upper bound of the bucket's key range.
    fn range_end(&self) -> Vec<u8> {
        let mut end = self.prefix.clone();
        if let Some(last) = end.last_mut() {
            *last = SEPARATOR + 1;
        }
        end
    }

    fn settle(
        &mut self,
        entry: Option<(Vec<u8>, String, Vec<u8>)>,
        off_end: Position,
    ) -> Option<(String, Vec<u8>)> {
        match entry {
            Some((raw, key, value)) => {
                self.position = Position::At(raw);
                Some((key, value))
            }
            None => {
                self.position = off_end;
                None
            }
        }
    }
}

impl BucketCursor for RocksCursor {
    fn bucket_id(&self) -> &str {
        &self.bucket_id
    }

    fn context(&self) -> &CursorContext {
        &self.context
    }

    fn first(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = self.scan(&self.prefix, Direction::Forward, None);
        self.settle(entry, Position::AfterLast)
    }

    fn last(&mut self) -> Option<(String, Vec<u8>)> {
        let end = self.range_end();
        let entry = self.scan(&end, Direction::Reverse, None);
        self.settle(entry, Position::BeforeFirst)
    }

    fn next(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = match &self.position {
            Position::Unpositioned | Position::BeforeFirst => return self.first(),
            Position::AfterLast => return None,
            Position::At(raw) => self.scan(raw, Direction::Forward, Some(raw)),
        };
        self.settle(entry, Position::AfterLast)
    }

    fn prev(&mut self) -> Option<(String, Vec<u8>)> {
        let entry = match &self.position {
            Position::Unpositioned | Position::AfterLast => return self.last(),
            Position::BeforeFirst => return None,
            Position::At(raw) => self.scan(raw, Direction::Reverse, Some(raw)),
        };
        self.settle(entry, Position::BeforeFirst)
    }

    fn seek(&mut self, key: &str) -> Option<(String, Vec<u8>)> {
        let target = full_key(&self.prefix, key);
        let entry = self.scan(&target, Direction::Forward, None);
        self.settle(entry, Position::AfterLast)
    }
}
