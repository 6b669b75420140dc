//! # Cursor Cache
//!
//! Lease manager for cursors kept open between client requests.
//!
//! A client opens a cursor and receives an opaque key. Later requests
//! present the key together with the client id. Cursors idle longer than
//! their lifespan are closed, either on the next access or by the
//! background sweep started with [`CursorCache::start`].
//!
//! The cache is generic over the cursor type so services can keep their own
//! iteration state next to the bucket cursor.

use crate::errors::CursorCacheError;
use crate::ports::Bucket;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default idle lifespan of a cursor.
pub const DEFAULT_CURSOR_LIFESPAN: Duration = Duration::from_secs(60);

/// Shared handle to a cached cursor.
pub type CursorHandle<C> = Arc<Mutex<C>>;

struct CursorEntry<C> {
    cursor: CursorHandle<C>,
    bucket: Box<dyn Bucket>,
    owner: String,
    lifespan: Duration,
    last_used: Instant,
}

impl<C> CursorEntry<C> {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_used) > self.lifespan
    }

    fn close(self, key: &str) {
        if let Err(e) = self.bucket.close() {
            warn!(cursor_key = %key, error = %e, "Failed to close cursor bucket");
        }
    }
}

/// Cursors by key with owner and idle lifespan.
pub struct CursorCache<C> {
    entries: Mutex<HashMap<String, CursorEntry<C>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Send + 'static> CursorCache<C> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// Register a cursor and the bucket it iterates.
    ///
    /// The bucket is closed when the cursor is released or expires.
    pub fn add(
        &self,
        cursor: C,
        bucket: Box<dyn Bucket>,
        owner: &str,
        lifespan: Duration,
    ) -> String {
        let key = Uuid::new_v4().to_string();
        let entry = CursorEntry {
            cursor: Arc::new(Mutex::new(cursor)),
            bucket,
            owner: owner.to_string(),
            lifespan,
            last_used: Instant::now(),
        };
        self.entries.lock().insert(key.clone(), entry);
        debug!(cursor_key = %key, client_id = %owner, "Cursor added");
        key
    }

    /// Look up a cursor owned by `owner`.
    ///
    /// With `auto_extend` the idle deadline restarts from now.
    pub fn get(
        &self,
        key: &str,
        owner: &str,
        auto_extend: bool,
    ) -> Result<CursorHandle<C>, CursorCacheError> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(key).ok_or_else(|| CursorCacheError::NotFound {
            key: key.to_string(),
        })?;

        if entry.owner != owner {
            warn!(cursor_key = %key, client_id = %owner, "Cursor requested by non-owner");
            return Err(CursorCacheError::Unauthorized {
                key: key.to_string(),
                client_id: owner.to_string(),
            });
        }

        let now = Instant::now();
        if entry.is_expired(now) {
            if let Some(expired) = entries.remove(key) {
                expired.close(key);
            }
            debug!(cursor_key = %key, "Cursor expired on access");
            return Err(CursorCacheError::Expired {
                key: key.to_string(),
            });
        }

        if auto_extend {
            entry.last_used = now;
        }
        Ok(entry.cursor.clone())
    }

    /// Release a cursor and close its bucket.
    pub fn release(&self, owner: &str, key: &str) -> Result<(), CursorCacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            None => {
                return Err(CursorCacheError::NotFound {
                    key: key.to_string(),
                })
            }
            Some(entry) if entry.owner != owner => {
                return Err(CursorCacheError::Unauthorized {
                    key: key.to_string(),
                    client_id: owner.to_string(),
                })
            }
            Some(_) => {}
        }
        if let Some(entry) = entries.remove(key) {
            entry.close(key);
        }
        debug!(cursor_key = %key, client_id = %owner, "Cursor released");
        Ok(())
    }

    /// Close every cursor idle past its lifespan.
    ///
    /// Returns the number of cursors removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            if let Some(entry) = entries.remove(key) {
                entry.close(key);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Expired cursors removed");
        }
        expired.len()
    }

    /// Close all cursors.
    pub fn release_all(&self) -> usize {
        let drained: Vec<(String, CursorEntry<C>)> = self.entries.lock().drain().collect();
        let count = drained.len();
        for (key, entry) in drained {
            entry.close(&key);
        }
        count
    }

    /// Number of open cursors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when no cursor is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Start the background sweep on the current tokio runtime.
    ///
    /// Does nothing when already running or when called outside a runtime.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime; cursor sweep not started");
            return;
        };

        let cache: Weak<Self> = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));
        *sweeper = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.remove_expired();
            }
        }));
        info!(interval_ms = period.as_millis() as u64, "Cursor sweep started");
    }

    /// Stop the background sweep.
    pub fn stop(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
            info!("Cursor sweep stopped");
        }
    }

    /// True while the background sweep runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.sweeper.lock().is_some()
    }
}

impl<C: Send + 'static> Default for CursorCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Drop for CursorCache<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
