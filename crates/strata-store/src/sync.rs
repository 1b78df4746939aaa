use std::sync::{Arc, RwLock};

use bytes::Bytes;

use strata_query::{Query, Results};
use strata_types::{Key, StoreResult};

use crate::traits::{Batch, Datastore};

/// Reader-writer-lock wrapper serializing writers against readers.
///
/// `get`/`has`/`query` hold the read lock for the duration of the call
/// (for `query`, that is the call that builds the stream, not the drain);
/// `put`/`delete` hold the write lock. Readers proceed concurrently,
/// writers are exclusive.
///
/// A batch opened through this wrapper acquires the write lock for each
/// individual `put`/`delete`/`commit` call, so a batch's operations can
/// interleave with other writers between calls. The batch is not isolated
/// as a unit — this is a deliberate weak-consistency tradeoff, not full
/// transaction isolation.
pub struct SynchronizedDatastore {
    child: Arc<dyn Datastore>,
    lock: Arc<RwLock<()>>,
}

impl SynchronizedDatastore {
    pub fn new(child: Arc<dyn Datastore>) -> Self {
        Self {
            child,
            lock: Arc::new(RwLock::new(())),
        }
    }
}

impl Datastore for SynchronizedDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        let _guard = self.lock.write().expect("lock poisoned");
        self.child.put(key, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        let _guard = self.lock.read().expect("lock poisoned");
        self.child.get(key)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        let _guard = self.lock.read().expect("lock poisoned");
        self.child.has(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let _guard = self.lock.write().expect("lock poisoned");
        self.child.delete(key)
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        let _guard = self.lock.read().expect("lock poisoned");
        self.child.query(query)
    }

    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        let _guard = self.lock.read().expect("lock poisoned");
        let inner = self.child.batch()?;
        Ok(Box::new(SynchronizedBatch {
            inner,
            lock: Arc::clone(&self.lock),
        }))
    }

    fn synchronized(self: Arc<Self>) -> Arc<dyn Datastore> {
        // Already synchronized; wrapping again would only stack locks.
        self
    }
}

struct SynchronizedBatch {
    inner: Box<dyn Batch>,
    lock: Arc<RwLock<()>>,
}

impl Batch for SynchronizedBatch {
    fn put(&mut self, key: Key, value: Bytes) -> StoreResult<()> {
        let _guard = self.lock.write().expect("lock poisoned");
        self.inner.put(key, value)
    }

    fn delete(&mut self, key: Key) -> StoreResult<()> {
        let _guard = self.lock.write().expect("lock poisoned");
        self.inner.delete(key)
    }

    fn commit(&mut self) -> StoreResult<()> {
        let _guard = self.lock.write().expect("lock poisoned");
        self.inner.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MapDatastore;
    use std::thread;

    fn synchronized_map() -> (MapDatastore, Arc<SynchronizedDatastore>) {
        let map = MapDatastore::new();
        let wrapper = Arc::new(SynchronizedDatastore::new(Arc::new(map.clone())));
        (map, wrapper)
    }

    fn value(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn delegates_all_operations() {
        let (_, store) = synchronized_map();
        store.put(Key::new("/a"), value("1")).unwrap();
        assert!(store.has(&Key::new("/a")).unwrap());
        assert_eq!(store.get(&Key::new("/a")).unwrap(), value("1"));
        assert_eq!(store.query(Query::new()).unwrap().rest().unwrap().len(), 1);
        store.delete(&Key::new("/a")).unwrap();
        assert!(!store.has(&Key::new("/a")).unwrap());
    }

    #[test]
    fn synchronized_is_idempotent() {
        let (_, store) = synchronized_map();
        let again = Arc::clone(&store).synchronized();
        again.put(Key::new("/a"), value("1")).unwrap();
        assert!(store.has(&Key::new("/a")).unwrap());
    }

    #[test]
    fn batch_goes_through_the_lock() {
        let (map, store) = synchronized_map();
        let mut batch = store.batch().unwrap();
        batch.put(Key::new("/a"), value("1")).unwrap();
        // Direct writes may interleave between a batch's operations.
        store.put(Key::new("/b"), value("2")).unwrap();
        batch.commit().unwrap();
        assert!(map.has(&Key::new("/a")).unwrap());
        assert!(map.has(&Key::new("/b")).unwrap());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let (_, store) = synchronized_map();
        store.put(Key::new("/shared"), value("0")).unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..25 {
                    store
                        .put(Key::new(&format!("/w{i}/{j}")), value("x"))
                        .unwrap();
                    assert!(store.has(&Key::new("/shared")).unwrap());
                }
            }));
        }
        for h in handles {
            h.join().expect("thread should not panic");
        }
        let entries = store.query(Query::new()).unwrap().rest().unwrap();
        assert_eq!(entries.len(), 1 + 4 * 25);
    }
}
