use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;

use strata_query::{Entry, Query, Results};
use strata_types::{Key, StoreError, StoreResult};

use crate::batch::BasicBatch;
use crate::traits::{Batch, Datastore};

/// In-memory, `HashMap`-based datastore.
///
/// Intended for tests, embedding, and as the canonical example of a
/// backend without native query support: `query` snapshots the map and
/// layers the generic pipeline stages on top.
///
/// The store is `Clone`; clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MapDatastore {
    values: Arc<RwLock<HashMap<Key, Bytes>>>,
}

impl MapDatastore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.values.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.read().expect("lock poisoned").is_empty()
    }
}

impl Datastore for MapDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        self.values.write().expect("lock poisoned").insert(key, value);
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.values
            .read()
            .expect("lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        Ok(self.values.read().expect("lock poisoned").contains_key(key))
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        match self.values.write().expect("lock poisoned").remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.clone())),
        }
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        // Snapshot under the read lock, then evaluate naively; the stream
        // observes the store as of this call, in no particular base order.
        let entries: Vec<Entry> = {
            let map = self.values.read().expect("lock poisoned");
            map.iter()
                .map(|(key, value)| {
                    if query.keys_only {
                        Entry::key_only(key.clone())
                    } else {
                        Entry::new(key.clone(), value.clone())
                    }
                })
                .collect()
        };
        Ok(Results::from_entries(query.clone(), entries).naive_apply(&query))
    }

    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        Ok(Box::new(BasicBatch::new(self.clone())))
    }
}

impl std::fmt::Debug for MapDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapDatastore")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_query::KeyAscending;

    fn value(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn put_get_round_trip() {
        let store = MapDatastore::new();
        store.put(Key::new("/a"), value("1")).unwrap();
        assert_eq!(store.get(&Key::new("/a")).unwrap(), value("1"));
    }

    #[test]
    fn put_overwrites() {
        let store = MapDatastore::new();
        store.put(Key::new("/a"), value("old")).unwrap();
        store.put(Key::new("/a"), value("new")).unwrap();
        assert_eq!(store.get(&Key::new("/a")).unwrap(), value("new"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = MapDatastore::new();
        assert_eq!(
            store.get(&Key::new("/missing")),
            Err(StoreError::NotFound(Key::new("/missing")))
        );
    }

    #[test]
    fn has_reports_presence() {
        let store = MapDatastore::new();
        assert!(!store.has(&Key::new("/a")).unwrap());
        store.put(Key::new("/a"), value("1")).unwrap();
        assert!(store.has(&Key::new("/a")).unwrap());
    }

    #[test]
    fn delete_removes_and_fails_on_missing() {
        let store = MapDatastore::new();
        store.put(Key::new("/a"), value("1")).unwrap();
        store.delete(&Key::new("/a")).unwrap();
        assert!(!store.has(&Key::new("/a")).unwrap());
        assert!(store.delete(&Key::new("/a")).unwrap_err().is_not_found());
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[test]
    fn query_with_prefix_and_order() {
        let store = MapDatastore::new();
        for key in ["/users/alice", "/users/bob", "/posts/1"] {
            store.put(Key::new(key), value("x")).unwrap();
        }
        let results = store
            .query(Query::new().with_prefix("/users").with_order(KeyAscending))
            .unwrap();
        let keys: Vec<String> = results
            .rest()
            .unwrap()
            .into_iter()
            .map(|e| e.key.to_string())
            .collect();
        assert_eq!(keys, ["/users/alice", "/users/bob"]);
    }

    #[test]
    fn keys_only_query_strips_values() {
        let store = MapDatastore::new();
        store.put(Key::new("/a"), value("1")).unwrap();
        let entries = store.query(Query::new().keys_only()).unwrap().rest().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].value.is_none());
    }

    #[test]
    fn query_snapshot_ignores_later_writes() {
        let store = MapDatastore::new();
        store.put(Key::new("/a"), value("1")).unwrap();
        let results = store.query(Query::new()).unwrap();
        store.put(Key::new("/b"), value("2")).unwrap();
        assert_eq!(results.rest().unwrap().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Clones share state
    // -----------------------------------------------------------------------

    #[test]
    fn clones_share_the_map() {
        let store = MapDatastore::new();
        let clone = store.clone();
        store.put(Key::new("/a"), value("1")).unwrap();
        assert!(clone.has(&Key::new("/a")).unwrap());
    }

    // -----------------------------------------------------------------------
    // Concurrency smoke
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_writers_do_not_lose_writes() {
        use std::thread;

        let store = MapDatastore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        store
                            .put(Key::new(&format!("/w{i}/k{j}")), value("x"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8 * 50);
    }
}
