use std::sync::Arc;

use bytes::Bytes;

use strata_query::{Query, Results};
use strata_store::{Batch, Datastore};
use strata_types::{Key, StoreResult};

/// A bijective key rewrite.
///
/// Every user of a transform relies on `invert(convert(k)) == k` for all
/// keys in the addressable domain; a transform that breaks this corrupts
/// the keys reported by query results.
pub trait KeyTransform: Send + Sync {
    /// Map a caller-visible key to the child's key space.
    fn convert(&self, key: &Key) -> Key;

    /// Map a child key back to the caller's key space.
    fn invert(&self, key: &Key) -> StoreResult<Key>;
}

/// A transform built from a pair of closures.
#[derive(Clone)]
pub struct KeyMapPair {
    convert: Arc<dyn Fn(&Key) -> Key + Send + Sync>,
    invert: Arc<dyn Fn(&Key) -> StoreResult<Key> + Send + Sync>,
}

impl KeyMapPair {
    pub fn new(
        convert: impl Fn(&Key) -> Key + Send + Sync + 'static,
        invert: impl Fn(&Key) -> StoreResult<Key> + Send + Sync + 'static,
    ) -> Self {
        Self {
            convert: Arc::new(convert),
            invert: Arc::new(invert),
        }
    }
}

impl KeyTransform for KeyMapPair {
    fn convert(&self, key: &Key) -> Key {
        (self.convert)(key)
    }

    fn invert(&self, key: &Key) -> StoreResult<Key> {
        (self.invert)(key)
    }
}

/// Key-rewriting decorator.
///
/// Writes and point reads run against `convert(key)`; query results come
/// back with `invert` applied to each key. The query spec itself is passed
/// to the child unchanged — an arbitrary transform cannot rewrite a
/// prefix, so callers composing a transformed store with prefix queries
/// must phrase the prefix in the child's key space.
pub struct KeyTransformDatastore {
    child: Arc<dyn Datastore>,
    transform: Arc<dyn KeyTransform>,
}

impl KeyTransformDatastore {
    pub fn new(child: Arc<dyn Datastore>, transform: Arc<dyn KeyTransform>) -> Self {
        Self { child, transform }
    }
}

impl Datastore for KeyTransformDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        self.child.put(self.transform.convert(&key), value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.child.get(&self.transform.convert(key))
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.child.has(&self.transform.convert(key))
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.child.delete(&self.transform.convert(key))
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        let results = self.child.query(query)?;
        let transform = Arc::clone(&self.transform);
        // Error items pass through map_entries untouched; an invert
        // failure surfaces as an error item of its own.
        Ok(results.map_entries(move |entry| {
            let key = transform.invert(&entry.key)?;
            Ok(entry.with_key(key))
        }))
    }

    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        let inner = self.child.batch()?;
        Ok(Box::new(TransformBatch {
            inner,
            transform: Arc::clone(&self.transform),
        }))
    }
}

struct TransformBatch {
    inner: Box<dyn Batch>,
    transform: Arc<dyn KeyTransform>,
}

impl Batch for TransformBatch {
    fn put(&mut self, key: Key, value: Bytes) -> StoreResult<()> {
        self.inner.put(self.transform.convert(&key), value)
    }

    fn delete(&mut self, key: Key) -> StoreResult<()> {
        self.inner.delete(self.transform.convert(&key))
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.inner.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_store::MapDatastore;
    use strata_types::StoreError;

    fn value(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    /// Reverses the segment order; its own inverse.
    fn reversing() -> Arc<dyn KeyTransform> {
        Arc::new(KeyMapPair::new(
            |k: &Key| k.reverse(),
            |k: &Key| Ok(k.reverse()),
        ))
    }

    #[test]
    fn operations_run_against_converted_keys() {
        let map = MapDatastore::new();
        let store = KeyTransformDatastore::new(Arc::new(map.clone()), reversing());

        store.put(Key::new("/a/b"), value("1")).unwrap();
        // The child sees the reversed key.
        assert!(map.has(&Key::new("/b/a")).unwrap());
        assert!(!map.has(&Key::new("/a/b")).unwrap());

        assert_eq!(store.get(&Key::new("/a/b")).unwrap(), value("1"));
        assert!(store.has(&Key::new("/a/b")).unwrap());
        store.delete(&Key::new("/a/b")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn query_results_are_inverted() {
        let map = MapDatastore::new();
        let store = KeyTransformDatastore::new(Arc::new(map), reversing());
        store.put(Key::new("/a/b"), value("1")).unwrap();

        let entries = store.query(Query::new()).unwrap().rest().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, Key::new("/a/b"));
    }

    #[test]
    fn invert_failure_becomes_error_item() {
        let map = MapDatastore::new();
        let broken = Arc::new(KeyMapPair::new(
            |k: &Key| k.clone(),
            |k: &Key| Err(StoreError::OutsidePrefix(k.clone())),
        ));
        let store = KeyTransformDatastore::new(Arc::new(map), broken);
        store.put(Key::new("/a"), value("1")).unwrap();

        assert!(store.query(Query::new()).unwrap().rest().is_err());
    }

    #[test]
    fn batch_converts_keys() {
        let map = MapDatastore::new();
        let store = KeyTransformDatastore::new(Arc::new(map.clone()), reversing());

        let mut batch = store.batch().unwrap();
        batch.put(Key::new("/x/y"), value("1")).unwrap();
        batch.commit().unwrap();
        assert!(map.has(&Key::new("/y/x")).unwrap());
    }

    #[test]
    fn batch_unsupported_propagates() {
        // A store with no batching strategy stays that way when wrapped.
        struct NoBatch(MapDatastore);
        impl Datastore for NoBatch {
            fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
                self.0.put(key, value)
            }
            fn get(&self, key: &Key) -> StoreResult<Bytes> {
                self.0.get(key)
            }
            fn has(&self, key: &Key) -> StoreResult<bool> {
                self.0.has(key)
            }
            fn delete(&self, key: &Key) -> StoreResult<()> {
                self.0.delete(key)
            }
            fn query(&self, query: Query) -> StoreResult<Results> {
                self.0.query(query)
            }
        }

        let store =
            KeyTransformDatastore::new(Arc::new(NoBatch(MapDatastore::new())), reversing());
        assert_eq!(
            store.batch().map(|_| ()),
            Err(StoreError::BatchUnsupported)
        );
    }
}
