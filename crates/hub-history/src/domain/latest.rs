//! # Latest-Value Cache
//!
//! Most recent value per name for each Thing, persisted as one JSON blob per
//! thing address in the properties bucket.
//!
//! ## Loading
//!
//! A Thing's record is loaded on first touch. A missing or unparsable blob
//! starts the Thing with an empty record. A failed read is returned to the
//! caller and nothing is cached for that Thing.
//!
//! ## Flushing
//!
//! `save_changes` collects dirty addresses under the read lock, then per
//! address takes the write lock only to serialize and clear the dirty mark.
//! The blob is written outside the lock. An update landing after the
//! snapshot marks the address dirty again and goes out with the next flush.

use super::errors::HistoryError;
use parking_lot::RwLock;
use serde_json::Value;
use shared_buckets::Bucket;
use shared_types::{thing_addr, ThingValue, ThingValueMap, ValueKind, EVENT_NAME_PROPS};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, warn};

#[derive(Default)]
struct CacheState {
    things: HashMap<String, ThingValueMap>,
    changed: HashSet<String>,
}

/// Write-back cache of the latest value of each name per Thing.
pub struct LatestPropertiesCache {
    bucket: Box<dyn Bucket>,
    state: RwLock<CacheState>,
}

impl LatestPropertiesCache {
    /// Create a cache persisting to the given bucket.
    pub fn new(bucket: Box<dyn Bucket>) -> Self {
        Self {
            bucket,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Ensure the record of a Thing is loaded.
    ///
    /// Returns true if it was already in memory. A read error caches
    /// nothing, so the next access retries the load.
    pub fn load_props(&self, addr: &str) -> Result<bool, HistoryError> {
        if self.state.read().things.contains_key(addr) {
            return Ok(true);
        }

        let props = match self.bucket.get(addr)? {
            Some(blob) => serde_json::from_slice::<ThingValueMap>(&blob).unwrap_or_else(|e| {
                error!(thing_addr = %addr, error = %e, "Stored latest values unreadable; starting empty");
                ThingValueMap::new()
            }),
            None => ThingValueMap::new(),
        };

        // another caller may have loaded it meanwhile; keep theirs
        self.state
            .write()
            .things
            .entry(addr.to_string())
            .or_insert(props);
        Ok(false)
    }

    /// Latest values of a Thing, limited to `names` unless empty.
    pub fn get_properties(&self, addr: &str, names: &[String]) -> Result<ThingValueMap, HistoryError> {
        self.load_props(addr)?;

        let state = self.state.read();
        let Some(props) = state.things.get(addr) else {
            return Ok(ThingValueMap::new());
        };
        if names.is_empty() {
            return Ok(props.clone());
        }
        Ok(names
            .iter()
            .filter_map(|name| props.get(name).map(|tv| (name.clone(), tv.clone())))
            .collect())
    }

    /// Apply a stored value to the cache.
    ///
    /// A `$properties` event is expanded into one value per property. A
    /// value replaces the cached one only when it is strictly newer.
    /// Returns the number of cached entries updated. When the stored record
    /// cannot be read the update is skipped, leaving the record untouched.
    pub fn handle_add_value(&self, tv: &ThingValue) -> usize {
        let addr = thing_addr(&tv.agent_id, &tv.thing_id);
        if let Err(e) = self.load_props(&addr) {
            error!(thing_addr = %addr, name = %tv.name, error = %e, "Failed to load latest values; update skipped");
            return 0;
        }

        let candidates = if tv.name == EVENT_NAME_PROPS {
            match expand_properties(tv) {
                Some(list) => list,
                None => return 0,
            }
        } else {
            vec![tv.clone()]
        };

        let mut state = self.state.write();
        let Some(props) = state.things.get_mut(&addr) else {
            return 0;
        };
        let mut accepted = 0;
        for candidate in candidates {
            let newer = props
                .get(&candidate.name)
                .map_or(true, |existing| candidate.created_msec > existing.created_msec);
            if newer {
                props.insert(candidate.name.clone(), candidate);
                accepted += 1;
            }
        }
        if accepted > 0 {
            state.changed.insert(addr);
        }
        accepted
    }

    /// Write all changed records to the store.
    ///
    /// Every dirty record is attempted. Returns the number written, or the
    /// last error when any write failed. Failed records stay dirty.
    pub fn save_changes(&self) -> Result<usize, HistoryError> {
        let dirty: Vec<String> = self.state.read().changed.iter().cloned().collect();

        let mut written = 0;
        let mut last_error = None;
        for addr in dirty {
            let blob = {
                let mut state = self.state.write();
                state.changed.remove(&addr);
                match state.things.get(&addr) {
                    Some(props) => serde_json::to_vec(props),
                    None => {
                        warn!(thing_addr = %addr, "Dirty address without a record");
                        continue;
                    }
                }
            };

            let result = blob
                .map_err(HistoryError::from)
                .and_then(|blob| self.bucket.set(&addr, &blob).map_err(HistoryError::from));
            match result {
                Ok(()) => written += 1,
                Err(e) => {
                    error!(thing_addr = %addr, error = %e, "Failed to save latest values");
                    self.state.write().changed.insert(addr);
                    last_error = Some(e);
                }
            }
        }

        if written > 0 {
            debug!(written, "Latest values saved");
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(written),
        }
    }

    /// Number of Things with unsaved changes.
    pub fn dirty_count(&self) -> usize {
        self.state.read().changed.len()
    }

    /// Number of Things held in memory.
    pub fn loaded_count(&self) -> usize {
        self.state.read().things.len()
    }

    /// Close the properties bucket.
    pub fn close(&self) -> Result<(), HistoryError> {
        self.bucket.close().map_err(HistoryError::from)
    }
}

/// Split a `$properties` event into one event per property.
///
/// String values are kept as is, other JSON values as their JSON text.
fn expand_properties(tv: &ThingValue) -> Option<Vec<ThingValue>> {
    let map = match serde_json::from_slice::<serde_json::Map<String, Value>>(&tv.data) {
        Ok(map) => map,
        Err(e) => {
            debug!(
                agent_id = %tv.agent_id,
                thing_id = %tv.thing_id,
                error = %e,
                "Properties event payload is not a JSON object"
            );
            return None;
        }
    };

    let values = map
        .into_iter()
        .map(|(name, value)| {
            let data = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            ThingValue::new(
                ValueKind::Event,
                tv.agent_id.clone(),
                tv.thing_id.clone(),
                name,
                data,
                tv.sender_id.clone(),
            )
            .with_created(tv.created_msec)
        })
        .collect();
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::CountingBucketStore;
    use shared_buckets::{BucketCursor, BucketError, BucketStore, CursorContext, InMemoryBucketStore};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn new_cache() -> (InMemoryBucketStore, LatestPropertiesCache) {
        let store = InMemoryBucketStore::new();
        let cache = LatestPropertiesCache::new(store.bucket("properties").unwrap());
        (store, cache)
    }

    fn temp(data: &str, created: u64) -> ThingValue {
        ThingValue::event("ag1", "th1", "temp", data).with_created(created)
    }

    #[test]
    fn test_out_of_order_updates() {
        let (_store, cache) = new_cache();
        assert_eq!(cache.handle_add_value(&temp("new", 100)), 1);
        assert_eq!(cache.handle_add_value(&temp("old", 50)), 0);

        let props = cache.get_properties("ag1/th1", &[]).unwrap();
        assert_eq!(props["temp"].created_msec, 100);
        assert_eq!(props["temp"].data, b"new");

        // reverse call order ends in the same state
        let (_store, cache) = new_cache();
        cache.handle_add_value(&temp("old", 50));
        cache.handle_add_value(&temp("new", 100));
        assert_eq!(cache.get_properties("ag1/th1", &[]).unwrap()["temp"].data, b"new");
    }

    #[test]
    fn test_equal_timestamp_keeps_first() {
        let (_store, cache) = new_cache();
        cache.handle_add_value(&temp("first", 100));
        assert_eq!(cache.handle_add_value(&temp("second", 100)), 0);
        assert_eq!(cache.get_properties("ag1/th1", &[]).unwrap()["temp"].data, b"first");
    }

    #[test]
    fn test_get_properties_filters_names() {
        let (_store, cache) = new_cache();
        cache.handle_add_value(&temp("21", 100));
        cache.handle_add_value(&ThingValue::event("ag1", "th1", "humidity", "40").with_created(100));

        let props = cache.get_properties("ag1/th1", &["temp".to_string(), "missing".to_string()]).unwrap();
        assert_eq!(props.len(), 1);
        assert!(props.contains_key("temp"));
        assert_eq!(cache.get_properties("ag1/th1", &[]).unwrap().len(), 2);
        assert!(cache.get_properties("ag9/th9", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_bulk_properties_expand() {
        let (_store, cache) = new_cache();
        let bulk = ThingValue::event(
            "ag1",
            "th1",
            EVENT_NAME_PROPS,
            r#"{"temp":21.5,"mode":"auto","on":true}"#,
        )
        .with_created(500)
        .with_sender("svc1");

        assert_eq!(cache.handle_add_value(&bulk), 3);
        let props = cache.get_properties("ag1/th1", &[]).unwrap();
        assert_eq!(props["temp"].data, b"21.5");
        assert_eq!(props["mode"].data, b"auto");
        assert_eq!(props["on"].data, b"true");
        assert_eq!(props["mode"].created_msec, 500);
        assert_eq!(props["mode"].sender_id, "svc1");
        assert!(!props.contains_key(EVENT_NAME_PROPS));

        // each property is checked on its own
        cache.handle_add_value(&temp("30", 900));
        let older = ThingValue::event("ag1", "th1", EVENT_NAME_PROPS, r#"{"temp":1,"mode":"off"}"#)
            .with_created(600);
        assert_eq!(cache.handle_add_value(&older), 1);
        let props = cache.get_properties("ag1/th1", &[]).unwrap();
        assert_eq!(props["temp"].data, b"30");
        assert_eq!(props["mode"].data, b"off");
    }

    #[test]
    fn test_bad_bulk_payload_ignored() {
        let (_store, cache) = new_cache();
        let bulk = ThingValue::event("ag1", "th1", EVENT_NAME_PROPS, "not json").with_created(1);
        assert_eq!(cache.handle_add_value(&bulk), 0);
        assert_eq!(cache.dirty_count(), 0);
    }

    #[test]
    fn test_save_and_reload() {
        let (store, cache) = new_cache();
        cache.handle_add_value(&temp("21", 100));
        assert_eq!(cache.dirty_count(), 1);
        assert_eq!(cache.save_changes().unwrap(), 1);
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(cache.save_changes().unwrap(), 0);

        let reloaded = LatestPropertiesCache::new(store.bucket("properties").unwrap());
        assert!(!reloaded.load_props("ag1/th1").unwrap());
        assert!(reloaded.load_props("ag1/th1").unwrap());
        assert_eq!(reloaded.get_properties("ag1/th1", &[]).unwrap()["temp"].data, b"21");
    }

    #[test]
    fn test_corrupt_blob_starts_empty() {
        let (store, cache) = new_cache();
        store
            .bucket("properties")
            .unwrap()
            .set("ag1/th1", b"{broken")
            .unwrap();
        assert!(cache.get_properties("ag1/th1", &[]).unwrap().is_empty());
        assert_eq!(cache.loaded_count(), 1);
    }

    #[test]
    fn test_failed_save_stays_dirty() {
        let (store, cache) = new_cache();
        cache.handle_add_value(&temp("21", 100));
        store.close().unwrap();

        assert!(matches!(cache.save_changes(), Err(HistoryError::Storage(_))));
        assert_eq!(cache.dirty_count(), 1);
    }

    #[test]
    fn test_read_error_keeps_stored_record() {
        let store = Arc::new(InMemoryBucketStore::new());
        let first = LatestPropertiesCache::new(store.bucket("properties").unwrap());
        first.handle_add_value(&temp("20", 100));
        first.handle_add_value(&ThingValue::event("ag1", "th1", "humidity", "40").with_created(100));
        first.save_changes().unwrap();

        let counting = CountingBucketStore::new(store.clone());
        let cache = LatestPropertiesCache::new(counting.bucket("properties").unwrap());
        counting.fail_next_reads(1);

        // the failed load caches nothing and the update is skipped
        assert_eq!(cache.handle_add_value(&temp("25", 200)), 0);
        assert_eq!(cache.loaded_count(), 0);
        assert_eq!(cache.dirty_count(), 0);

        // the next touch loads the stored record
        assert_eq!(cache.handle_add_value(&temp("25", 200)), 1);
        cache.save_changes().unwrap();

        let reloaded = LatestPropertiesCache::new(store.bucket("properties").unwrap());
        let props = reloaded.get_properties("ag1/th1", &[]).unwrap();
        assert_eq!(props["temp"].data, b"25");
        assert_eq!(props["humidity"].data, b"40");
    }

    #[test]
    fn test_read_error_surfaces_from_get_properties() {
        let counting = CountingBucketStore::new(Arc::new(InMemoryBucketStore::new()));
        let cache = LatestPropertiesCache::new(counting.bucket("properties").unwrap());
        counting.fail_next_reads(1);

        assert!(matches!(
            cache.get_properties("ag1/th1", &[]),
            Err(HistoryError::Storage(_))
        ));
        assert!(cache.get_properties("ag1/th1", &[]).unwrap().is_empty());
    }

    /// Bucket whose first `set` waits for another thread to finish an update.
    struct GatedBucket {
        inner: Box<dyn Bucket>,
        armed: AtomicBool,
        gate: Arc<Barrier>,
    }

    impl Bucket for GatedBucket {
        fn id(&self) -> &str {
            self.inner.id()
        }

        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BucketError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> Result<(), BucketError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                // update may start
                self.gate.wait();
                // update done
                self.gate.wait();
            }
            self.inner.set(key, value)
        }

        fn set_multiple(&self, entries: BTreeMap<String, Vec<u8>>) -> Result<(), BucketError> {
            self.inner.set_multiple(entries)
        }

        fn delete(&self, key: &str) -> Result<(), BucketError> {
            self.inner.delete(key)
        }

        fn cursor(&self, context: CursorContext) -> Result<Box<dyn BucketCursor>, BucketError> {
            self.inner.cursor(context)
        }

        fn close(&self) -> Result<(), BucketError> {
            self.inner.close()
        }
    }

    #[test]
    fn test_update_during_flush_goes_out_next_flush() {
        let store = InMemoryBucketStore::new();
        let gate = Arc::new(Barrier::new(2));
        let cache = Arc::new(LatestPropertiesCache::new(Box::new(GatedBucket {
            inner: store.bucket("properties").unwrap(),
            armed: AtomicBool::new(true),
            gate: Arc::clone(&gate),
        })));
        cache.handle_add_value(&temp("20", 100));

        let updater = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                gate.wait();
                let accepted = cache.handle_add_value(&temp("25", 200));
                gate.wait();
                accepted
            })
        };

        assert_eq!(cache.save_changes().unwrap(), 1);
        assert_eq!(updater.join().unwrap(), 1);

        // the first flush wrote the snapshot taken before the update
        let stored = LatestPropertiesCache::new(store.bucket("properties").unwrap());
        assert_eq!(stored.get_properties("ag1/th1", &[]).unwrap()["temp"].data, b"20");
        assert_eq!(cache.dirty_count(), 1);

        assert_eq!(cache.save_changes().unwrap(), 1);
        assert_eq!(cache.dirty_count(), 0);
        let stored = LatestPropertiesCache::new(store.bucket("properties").unwrap());
        assert_eq!(stored.get_properties("ag1/th1", &[]).unwrap()["temp"].data, b"25");
    }

    #[test]
    fn test_concurrent_updates_keep_newest() {
        let (_store, cache) = new_cache();
        let cache = Arc::new(cache);
        let start = Arc::new(Barrier::new(4));

        let workers: Vec<_> = (0..4u64)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    for step in 0..50u64 {
                        let created = step * 4 + worker + 1;
                        cache.handle_add_value(&temp(&created.to_string(), created));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let props = cache.get_properties("ag1/th1", &[]).unwrap();
        assert_eq!(props["temp"].created_msec, 200);
        assert_eq!(props["temp"].data, b"200");
        assert_eq!(cache.dirty_count(), 1);
    }
}
