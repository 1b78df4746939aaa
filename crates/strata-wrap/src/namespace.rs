use std::sync::Arc;

use bytes::Bytes;

use strata_query::{Entry, Query, Results};
use strata_store::{Batch, Datastore};
use strata_types::{Key, StoreError, StoreResult};

use crate::keytransform::{KeyTransform, KeyTransformDatastore};

/// Prepends a fixed prefix on `convert` and strips it on `invert`.
///
/// `invert` fails with [`StoreError::OutsidePrefix`] for keys that do not
/// lie under the prefix. The prefix itself inverts to the root key, so the
/// transform stays bijective over its whole domain.
#[derive(Clone, Debug)]
pub struct PrefixTransform {
    prefix: Key,
}

impl PrefixTransform {
    pub fn new(prefix: Key) -> Self {
        Self { prefix }
    }
}

impl KeyTransform for PrefixTransform {
    fn convert(&self, key: &Key) -> Key {
        self.prefix.child(key)
    }

    fn invert(&self, key: &Key) -> StoreResult<Key> {
        if self.prefix.is_root() {
            return Ok(key.clone());
        }
        if *key == self.prefix {
            return Ok(Key::root());
        }
        if !self.prefix.is_ancestor_of(key) {
            return Err(StoreError::OutsidePrefix(key.clone()));
        }
        Key::from_raw(&key.as_str()[self.prefix.as_str().len()..])
    }
}

/// Prefix-scoped view over a (possibly shared) child datastore.
///
/// All operations address `prefix.child(key)` in the child. Queries scan
/// only the child's prefix subtree and additionally admit an entry only if
/// its raw key is the prefix or a descendant of it, so keys written to the
/// child outside the namespace can never leak into results. Admitted keys
/// are inverted, and any remaining query constraints are applied in
/// namespace key space.
pub struct NamespaceDatastore {
    inner: KeyTransformDatastore,
    child: Arc<dyn Datastore>,
    prefix: Key,
    transform: Arc<PrefixTransform>,
}

impl NamespaceDatastore {
    pub fn new(child: Arc<dyn Datastore>, prefix: Key) -> Self {
        let transform = Arc::new(PrefixTransform::new(prefix.clone()));
        let inner = KeyTransformDatastore::new(
            Arc::clone(&child),
            Arc::clone(&transform) as Arc<dyn KeyTransform>,
        );
        Self {
            inner,
            child,
            prefix,
            transform,
        }
    }
}

impl Datastore for NamespaceDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        self.inner.put(key, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.inner.get(key)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.inner.has(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.inner.delete(key)
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        // Scope the child scan to the namespace subtree. The prefix is a
        // plain string filter, so it is rewritten at the string level to
        // keep a caller's trailing slash (or other partial-segment form)
        // meaningful.
        let base = if self.prefix.is_root() {
            ""
        } else {
            self.prefix.as_str()
        };
        let child_prefix = match query.prefix.as_deref() {
            Some(p) if p.starts_with('/') => format!("{base}{p}"),
            Some(p) => format!("{base}/{p}"),
            None => self.prefix.to_string(),
        };
        let mut child_query = Query::new().with_prefix(child_prefix);
        if query.keys_only {
            child_query = child_query.keys_only();
        }
        let raw = self.child.query(child_query)?;

        // Admit only keys actually under the namespace; a shared child can
        // hold keys (e.g. "/nsX") that pass the string prefix filter
        // without being descendants.
        let admit_prefix = self.prefix.clone();
        let admitted = raw.filter(Arc::new(move |entry: &Entry| {
            entry.key == admit_prefix || admit_prefix.is_ancestor_of(&entry.key)
        }));

        let transform = Arc::clone(&self.transform);
        let inverted = admitted.map_entries(move |entry| {
            let key = transform.invert(&entry.key)?;
            Ok(entry.with_key(key))
        });

        // Remaining constraints operate on namespace-space keys; the
        // prefix has already been applied in child space.
        let residual = Query {
            prefix: None,
            filters: query.filters.clone(),
            orders: query.orders.clone(),
            limit: query.limit,
            offset: query.offset,
            keys_only: query.keys_only,
        };
        Ok(inverted.naive_apply(&residual).with_query(query))
    }

    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        self.inner.batch()
    }
}
