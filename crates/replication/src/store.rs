//! In-memory local store with last-write-wins merge.
//!
//! Entries are keyed by `(KeyID, key)`. Keys whose ids collide therefore
//! coexist instead of overwriting each other; they simply share placement
//! on the ring.
//!
//! Deletes are stored as tombstones (records without a value) so that an
//! older copy arriving later through replication cannot bring the key back.

use corelib::record::{Record, Version};
use corelib::token::RingId;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::trace;

type StoreKey = (RingId, Vec<u8>);

#[derive(Clone, Debug)]
struct Entry {
    value: Option<Vec<u8>>,
    version: Version,
}

/// Per-node key/value container shared by request handling and the
/// replication tasks.
#[derive(Debug, Default)]
pub struct LocalStore {
    entries: RwLock<BTreeMap<StoreKey, Entry>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `record`. Returns true if it replaced an older version or
    /// created the entry; false if the stored version is newer or equal.
    pub fn apply(&self, record: Record) -> bool {
        let mut entries = self.entries.write();
        Self::apply_locked(&mut entries, record)
    }

    /// Merges a batch. Returns how many records took effect.
    pub fn apply_all(&self, records: impl IntoIterator<Item = Record>) -> usize {
        let mut entries = self.entries.write();
        records
            .into_iter()
            .filter(|record| Self::apply_locked(&mut entries, record.clone()))
            .count()
    }

    fn apply_locked(entries: &mut BTreeMap<StoreKey, Entry>, record: Record) -> bool {
        let store_key = (record.id, record.key);
        match entries.get_mut(&store_key) {
            Some(existing) if existing.version >= record.version => {
                trace!(
                    "Ignoring stale write {} (have {})",
                    record.version,
                    existing.version
                );
                false
            }
            Some(existing) => {
                existing.value = record.value;
                existing.version = record.version;
                true
            }
            None => {
                entries.insert(
                    store_key,
                    Entry {
                        value: record.value,
                        version: record.version,
                    },
                );
                true
            }
        }
    }

    /// Stored record for the key, tombstones included.
    pub fn get(&self, id: RingId, key: &[u8]) -> Option<Record> {
        let entries = self.entries.read();
        entries
            .get(&(id, key.to_vec()))
            .map(|entry| to_record(id, key.to_vec(), entry))
    }

    /// Live value for the key, `None` if absent or deleted.
    pub fn value(&self, id: RingId, key: &[u8]) -> Option<Vec<u8>> {
        self.get(id, key).and_then(|record| record.value)
    }

    /// Number of entries, tombstones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of entries holding a value.
    pub fn live_len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    /// Every record, in ring order.
    pub fn records(&self) -> Vec<Record> {
        self.collect(|_| true)
    }

    /// Records whose id lies in `(from, to]`.
    pub fn records_in(&self, from: RingId, to: RingId) -> Vec<Record> {
        self.collect(|id| id.in_half_open(from, to))
    }

    /// Records whose id lies outside `(from, to]`.
    pub fn records_outside(&self, from: RingId, to: RingId) -> Vec<Record> {
        self.collect(|id| !id.in_half_open(from, to))
    }

    fn collect(&self, keep: impl Fn(RingId) -> bool) -> Vec<Record> {
        self.entries
            .read()
            .iter()
            .filter(|((id, _), _)| keep(*id))
            .map(|((id, key), entry)| to_record(*id, key.clone(), entry))
            .collect()
    }

    /// Removes the entry only if it still carries `record.version`, so a
    /// write that landed after a transfer is never discarded.
    pub fn remove_if_unchanged(&self, record: &Record) -> bool {
        let mut entries = self.entries.write();
        let store_key = (record.id, record.key.clone());
        match entries.get(&store_key) {
            Some(entry) if entry.version == record.version => {
                entries.remove(&store_key);
                true
            }
            _ => false,
        }
    }
}

fn to_record(id: RingId, key: Vec<u8>, entry: &Entry) -> Record {
    Record {
        id,
        key,
        value: entry.value.clone(),
        version: entry.version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(ts: u64) -> Version {
        Version::new(ts, RingId(1))
    }

    fn put(id: u64, key: &str, value: &str, ts: u64) -> Record {
        Record::value(RingId(id), key.into(), value.into(), v(ts))
    }

    #[test]
    fn test_newer_version_wins() {
        let store = LocalStore::new();
        assert!(store.apply(put(5, "k", "old", 10)));
        assert!(store.apply(put(5, "k", "new", 11)));
        assert!(!store.apply(put(5, "k", "older", 9)));
        assert_eq!(store.value(RingId(5), b"k"), Some(b"new".to_vec()));
    }

    #[test]
    fn test_equal_version_is_not_reapplied() {
        let store = LocalStore::new();
        assert!(store.apply(put(5, "k", "a", 10)));
        assert!(!store.apply(put(5, "k", "a", 10)));
    }

    #[test]
    fn test_origin_breaks_timestamp_ties() {
        let store = LocalStore::new();
        let low = Record::value(RingId(5), b"k".to_vec(), b"low".to_vec(), Version::new(10, RingId(1)));
        let high = Record::value(RingId(5), b"k".to_vec(), b"high".to_vec(), Version::new(10, RingId(2)));
        store.apply(high);
        store.apply(low);
        assert_eq!(store.value(RingId(5), b"k"), Some(b"high".to_vec()));
    }

    #[test]
    fn test_tombstone_hides_value_and_blocks_stale_copy() {
        let store = LocalStore::new();
        store.apply(put(5, "k", "v", 10));
        store.apply(Record::tombstone(RingId(5), b"k".to_vec(), v(11)));
        assert_eq!(store.value(RingId(5), b"k"), None);
        assert!(store.get(RingId(5), b"k").unwrap().is_tombstone());

        // replica still holding the old value pushes it back
        assert!(!store.apply(put(5, "k", "v", 10)));
        assert_eq!(store.value(RingId(5), b"k"), None);
        assert_eq!(store.len(), 1);
        assert_eq!(store.live_len(), 0);
    }

    #[test]
    fn test_colliding_ids_coexist() {
        let store = LocalStore::new();
        store.apply(put(5, "a", "1", 10));
        store.apply(put(5, "b", "2", 10));
        assert_eq!(store.value(RingId(5), b"a"), Some(b"1".to_vec()));
        assert_eq!(store.value(RingId(5), b"b"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_range_selection_wraps() {
        let store = LocalStore::new();
        for id in [1, 50, 100, 150, 250] {
            store.apply(put(id, &id.to_string(), "x", 1));
        }
        let ids = |records: Vec<Record>| records.iter().map(|r| r.id.0).collect::<Vec<_>>();
        assert_eq!(ids(store.records_in(RingId(50), RingId(150))), vec![100, 150]);
        assert_eq!(ids(store.records_in(RingId(200), RingId(50))), vec![1, 50, 250]);
        assert_eq!(ids(store.records_outside(RingId(200), RingId(50))), vec![100, 150]);
    }

    #[test]
    fn test_remove_if_unchanged() {
        let store = LocalStore::new();
        let original = put(5, "k", "v", 10);
        store.apply(original.clone());
        store.apply(put(5, "k", "v2", 11));
        assert!(!store.remove_if_unchanged(&original));
        assert_eq!(store.len(), 1);

        let current = store.get(RingId(5), b"k").unwrap();
        assert!(store.remove_if_unchanged(&current));
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn prop_order_of_application_does_not_matter(
            writes in proptest::collection::vec((0u64..5, 0u64..1_000), 1..40)
        ) {
            let records: Vec<Record> = writes
                .iter()
                .map(|(key, ts)| put(*key, &key.to_string(), &ts.to_string(), *ts))
                .collect();
            let forward = LocalStore::new();
            forward.apply_all(records.clone());
            let backward = LocalStore::new();
            backward.apply_all(records.into_iter().rev());
            prop_assert_eq!(forward.records(), backward.records());

            // every key ends on its maximal version
            for (key, ts) in writes.iter() {
                let stored = forward.get(RingId(*key), key.to_string().as_bytes()).unwrap();
                prop_assert!(stored.version.timestamp >= *ts);
            }
        }
    }
}
