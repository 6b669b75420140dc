//! # History Cursor
//!
//! Iterates one Thing's bucket, optionally showing only values of one name.
//!
//! ## States
//!
//! ```text
//! Unpositioned ──first/last/seek/next/prev──→ Positioned
//!      │                                        │   ↑
//!      │                          bound crossed │   │ match found
//!      │                                        ↓   │
//!      │                                  PendingRetry(dir)
//!      │
//!      └──────────── edge of bucket ───────→ Exhausted(dir)
//! ```
//!
//! ## Filtered scans
//!
//! With a name filter, moves skip entries of other names. Each candidate is
//! checked against a time bound: forward moves stop at entries created after
//! `until`, backward moves at entries created before it. On crossing the
//! bound the cursor steps back once so that the entry is seen again by a
//! later move with a wider bound, and the cursor enters `PendingRetry`.
//! Reaching an end of the bucket needs no step back.
//!
//! Malformed keys are skipped during a scan. A malformed key at the entry a
//! move lands on directly is reported as a miss.

use super::encoding::{decode, parse_key};
use shared_buckets::BucketCursor;
use shared_types::ThingValue;
use tracing::{debug, warn};

/// Cursor context key holding the name filter.
pub const NAME_FILTER_KEY: &str = "name";

/// Direction of a cursor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn reverse(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    fn crossed(self, created_msec: u64, until: u64) -> bool {
        match self {
            Self::Forward => created_msec > until,
            Self::Backward => created_msec < until,
        }
    }
}

/// Position state of a history cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Not moved yet.
    Unpositioned,
    /// At the last entry returned.
    Positioned,
    /// A filtered scan stopped at the time bound; the next move in the same
    /// direction revisits the entry that crossed it.
    PendingRetry(Direction),
    /// Moved past an end of the bucket.
    Exhausted(Direction),
}

/// A bucket cursor with name filter and scan state.
pub struct HistoryCursor {
    cursor: Box<dyn BucketCursor>,
    filter: Option<String>,
    state: CursorState,
}

impl HistoryCursor {
    /// Wrap a bucket cursor. The filter is read from its context.
    pub fn new(cursor: Box<dyn BucketCursor>) -> Self {
        let filter = cursor
            .context()
            .value(NAME_FILTER_KEY)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Self {
            cursor,
            filter,
            state: CursorState::Unpositioned,
        }
    }

    /// The name filter, if any.
    #[must_use]
    pub fn name_filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Move to the oldest matching value created no later than `until`.
    pub fn first(&mut self, until: u64) -> Option<ThingValue> {
        let entry = self.cursor.first();
        self.settle(entry, Direction::Forward, until)
    }

    /// Move to the newest matching value.
    pub fn last(&mut self) -> Option<ThingValue> {
        let entry = self.cursor.last();
        self.settle(entry, Direction::Backward, 0)
    }

    /// Move to the next matching value created no later than `until`.
    ///
    /// On a fresh cursor this is `first`.
    pub fn next(&mut self, until: u64) -> Option<ThingValue> {
        if self.state == CursorState::Unpositioned {
            return self.first(until);
        }
        let entry = self.cursor.next();
        self.settle(entry, Direction::Forward, until)
    }

    /// Move to the previous matching value.
    ///
    /// On a fresh cursor this is `last`.
    pub fn prev(&mut self) -> Option<ThingValue> {
        if self.state == CursorState::Unpositioned {
            return self.last();
        }
        let entry = self.cursor.prev();
        self.settle(entry, Direction::Backward, 0)
    }

    /// Move to the first matching value created at or after `timestamp_msec`
    /// and no later than `until`.
    pub fn seek(&mut self, timestamp_msec: u64, until: u64) -> Option<ThingValue> {
        let entry = self
            .cursor
            .seek(&super::encoding::encode_timestamp(timestamp_msec));
        self.settle(entry, Direction::Forward, until)
    }

    /// Up to `limit` next values, oldest first.
    ///
    /// The flag is false when the cursor ran out before `limit` values.
    pub fn next_n(&mut self, limit: usize, until: u64) -> (Vec<ThingValue>, bool) {
        self.collect_n(limit, |c| c.next(until))
    }

    /// Up to `limit` previous values, newest first.
    ///
    /// The flag is false when the cursor ran out before `limit` values.
    pub fn prev_n(&mut self, limit: usize) -> (Vec<ThingValue>, bool) {
        self.collect_n(limit, Self::prev)
    }

    fn collect_n<F>(&mut self, limit: usize, mut step: F) -> (Vec<ThingValue>, bool)
    where
        F: FnMut(&mut Self) -> Option<ThingValue>,
    {
        let mut values = Vec::with_capacity(limit.min(64));
        for _ in 0..limit {
            match step(self) {
                Some(tv) => values.push(tv),
                None => return (values, false),
            }
        }
        (values, true)
    }

    fn step(&mut self, direction: Direction) -> Option<(String, Vec<u8>)> {
        match direction {
            Direction::Forward => self.cursor.next(),
            Direction::Backward => self.cursor.prev(),
        }
    }

    /// Resolve the entry a move landed on into a result and new state.
    fn settle(
        &mut self,
        entry: Option<(String, Vec<u8>)>,
        direction: Direction,
        until: u64,
    ) -> Option<ThingValue> {
        let Some((key, data)) = entry else {
            self.state = CursorState::Exhausted(direction);
            return None;
        };

        let Some(filter) = self.filter.clone() else {
            self.state = CursorState::Positioned;
            return self.decode_entry(&key, &data);
        };

        let mut key = key;
        let mut data = data;
        let mut landed = true;
        loop {
            match parse_key(&key) {
                Err(e) if landed => {
                    warn!(bucket = %self.cursor.bucket_id(), error = %e, "Malformed key at cursor");
                    self.state = CursorState::Positioned;
                    return None;
                }
                Err(e) => {
                    debug!(bucket = %self.cursor.bucket_id(), error = %e, "Skipping malformed key");
                }
                Ok(parts) => {
                    if direction.crossed(parts.created_msec, until) {
                        // step back so a later move with a wider bound sees this entry
                        self.step(direction.reverse());
                        self.state = CursorState::PendingRetry(direction);
                        return None;
                    }
                    if parts.name == filter {
                        self.state = CursorState::Positioned;
                        return self.decode_entry(&key, &data);
                    }
                }
            }

            landed = false;
            match self.step(direction) {
                Some((k, v)) => {
                    key = k;
                    data = v;
                }
                None => {
                    self.state = CursorState::Exhausted(direction);
                    return None;
                }
            }
        }
    }

    fn decode_entry(&self, key: &str, data: &[u8]) -> Option<ThingValue> {
        match decode(self.cursor.bucket_id(), key, data) {
            Ok(tv) => Some(tv),
            Err(e) => {
                warn!(bucket = %self.cursor.bucket_id(), error = %e, "Undecodable entry at cursor");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::encoding::encode;
    use shared_buckets::{Bucket, BucketStore, CursorContext, InMemoryBucketStore};
    use std::collections::BTreeMap;

    const NOW: u64 = 10_000;

    fn bucket_with(values: &[(&str, u64)]) -> (InMemoryBucketStore, Box<dyn Bucket>) {
        let store = InMemoryBucketStore::new();
        let bucket = store.bucket("ag1/th1").unwrap();
        let entries: BTreeMap<String, Vec<u8>> = values
            .iter()
            .map(|(name, created)| {
                encode(
                    &ThingValue::event("ag1", "th1", *name, created.to_string())
                        .with_created(*created),
                )
            })
            .collect();
        bucket.set_multiple(entries).unwrap();
        (store, bucket)
    }

    fn cursor(bucket: &dyn Bucket, filter: &str) -> HistoryCursor {
        let ctx = CursorContext::new().with_value(NAME_FILTER_KEY, filter);
        HistoryCursor::new(bucket.cursor(ctx).unwrap())
    }

    fn created(tv: Option<ThingValue>) -> Option<u64> {
        tv.map(|tv| tv.created_msec)
    }

    #[test]
    fn test_unfiltered_walk() {
        let (_s, bucket) = bucket_with(&[("temp", 1000), ("hum", 2000), ("temp", 3000)]);
        let mut c = cursor(bucket.as_ref(), "");
        assert_eq!(c.name_filter(), None);
        assert_eq!(c.state(), CursorState::Unpositioned);

        assert_eq!(created(c.first(NOW)), Some(1000));
        assert_eq!(created(c.next(NOW)), Some(2000));
        assert_eq!(created(c.next(NOW)), Some(3000));
        assert_eq!(c.next(NOW), None);
        assert_eq!(c.state(), CursorState::Exhausted(Direction::Forward));
        assert_eq!(created(c.prev()), Some(3000));
        assert_eq!(created(c.last()), Some(3000));
        assert_eq!(created(c.prev()), Some(2000));
    }

    #[test]
    fn test_filtered_walk() {
        let (_s, bucket) = bucket_with(&[
            ("hum", 500),
            ("temp", 1000),
            ("hum", 2000),
            ("temp", 3000),
            ("hum", 4000),
        ]);
        let mut c = cursor(bucket.as_ref(), "temp");

        assert_eq!(created(c.first(NOW)), Some(1000));
        assert_eq!(created(c.next(NOW)), Some(3000));
        assert_eq!(c.next(NOW), None);
        assert_eq!(c.state(), CursorState::Exhausted(Direction::Forward));

        assert_eq!(created(c.last()), Some(3000));
        assert_eq!(created(c.prev()), Some(1000));
        assert_eq!(c.prev(), None);
        assert_eq!(c.state(), CursorState::Exhausted(Direction::Backward));
    }

    #[test]
    fn test_fresh_cursor_next_and_prev() {
        let (_s, bucket) = bucket_with(&[("temp", 1000), ("temp", 2000)]);
        let mut c = cursor(bucket.as_ref(), "");
        assert_eq!(created(c.next(NOW)), Some(1000));

        let mut c = cursor(bucket.as_ref(), "");
        assert_eq!(created(c.prev()), Some(2000));
    }

    #[test]
    fn test_first_bounded_by_until() {
        // only future temperature entries after an older humidity entry
        let (_s, bucket) = bucket_with(&[("hum", 500), ("temp", 20_000), ("temp", 30_000)]);
        let mut c = cursor(bucket.as_ref(), "temp");

        assert_eq!(c.first(NOW), None);
        assert_eq!(c.state(), CursorState::PendingRetry(Direction::Forward));

        // the same move with a later bound picks up where the scan stopped
        assert_eq!(created(c.next(25_000)), Some(20_000));
        assert_eq!(c.state(), CursorState::Positioned);
        assert_eq!(c.next(25_000), None);
        assert_eq!(created(c.next(40_000)), Some(30_000));
    }

    #[test]
    fn test_first_landing_on_future_entry() {
        let (_s, bucket) = bucket_with(&[("temp", 20_000)]);
        let mut c = cursor(bucket.as_ref(), "temp");

        assert_eq!(c.first(NOW), None);
        assert_eq!(c.state(), CursorState::PendingRetry(Direction::Forward));
        assert_eq!(created(c.next(NOW * 3)), Some(20_000));
    }

    #[test]
    fn test_backward_scan_bound() {
        let (_s, bucket) = bucket_with(&[("temp", 1000), ("hum", 2000), ("hum", 3000)]);
        let mut c = cursor(bucket.as_ref(), "temp");
        assert_eq!(created(c.last()), Some(1000));

        // a bound after the only match stops the backward scan
        let mut c = cursor(bucket.as_ref(), "temp");
        let entry = c.cursor.last();
        assert_eq!(c.settle(entry, Direction::Backward, 2500), None);
        assert_eq!(c.state(), CursorState::PendingRetry(Direction::Backward));
        assert_eq!(created(c.prev()), Some(1000));
    }

    #[test]
    fn test_seek() {
        let (_s, bucket) = bucket_with(&[("temp", 1000), ("hum", 2000), ("temp", 3000)]);
        let mut c = cursor(bucket.as_ref(), "");
        assert_eq!(created(c.seek(1500, NOW)), Some(2000));
        assert_eq!(created(c.seek(1000, NOW)), Some(1000));
        assert_eq!(c.seek(5000, NOW), None);

        let mut c = cursor(bucket.as_ref(), "temp");
        assert_eq!(created(c.seek(1500, NOW)), Some(3000));
        assert_eq!(c.seek(1500, 2500), None);
    }

    #[test]
    fn test_next_n_exhaustion() {
        let values: Vec<(&str, u64)> = (1..=5).map(|i| ("temp", i * 100)).collect();
        let (_s, bucket) = bucket_with(&values);
        let mut c = cursor(bucket.as_ref(), "temp");

        let (batch, remaining) = c.next_n(1000, NOW);
        assert_eq!(batch.len(), 5);
        assert!(!remaining);
    }

    #[test]
    fn test_next_n_and_prev_n_in_pages() {
        let values: Vec<(&str, u64)> = (1..=5).map(|i| ("temp", i * 100)).collect();
        let (_s, bucket) = bucket_with(&values);
        let mut c = cursor(bucket.as_ref(), "");

        let (batch, remaining) = c.next_n(3, NOW);
        assert_eq!(batch.iter().map(|tv| tv.created_msec).collect::<Vec<_>>(), vec![100, 200, 300]);
        assert!(remaining);

        let (batch, remaining) = c.prev_n(10);
        assert_eq!(batch.iter().map(|tv| tv.created_msec).collect::<Vec<_>>(), vec![200, 100]);
        assert!(!remaining);
    }

    #[test]
    fn test_malformed_keys() {
        let (_s, bucket) = bucket_with(&[("temp", 1000), ("hum", 1500), ("temp", 3000)]);
        bucket.set("00000000000000002000/temp", b"bad").unwrap();

        // skipped while scanning
        let mut c = cursor(bucket.as_ref(), "temp");
        assert_eq!(created(c.first(NOW)), Some(1000));
        assert_eq!(created(c.next(NOW)), Some(3000));

        // a miss when landed on directly
        let mut c = cursor(bucket.as_ref(), "");
        assert_eq!(created(c.first(NOW)), Some(1000));
        assert_eq!(created(c.next(NOW)), Some(1500));
        assert_eq!(c.next(NOW), None);
        assert_eq!(c.state(), CursorState::Positioned);
        assert_eq!(created(c.next(NOW)), Some(3000));
    }

    #[test]
    fn test_empty_bucket() {
        let (_s, bucket) = bucket_with(&[]);
        let mut c = cursor(bucket.as_ref(), "temp");
        assert_eq!(c.first(NOW), None);
        assert_eq!(c.last(), None);
        assert_eq!(c.next_n(10, NOW), (vec![], false));
    }
}
