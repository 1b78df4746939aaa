use std::collections::{hash_map, HashMap};
use std::sync::Arc;

use bytes::Bytes;

use strata_query::{Query, Results};
use strata_store::{Batch, Datastore};
use strata_types::{Key, StoreError, StoreResult};

/// One (prefix, child) binding in a mount table.
#[derive(Clone)]
pub struct Mount {
    pub prefix: Key,
    pub datastore: Arc<dyn Datastore>,
}

impl Mount {
    pub fn new(prefix: Key, datastore: Arc<dyn Datastore>) -> Self {
        Self { prefix, datastore }
    }
}

/// Resolve `key` against an ordered mount table.
///
/// Returns the first mount whose prefix equals the key or is an ancestor
/// of it, plus the remainder key (the key with the mount prefix stripped).
/// Resolution is declaration-order sensitive: with overlapping prefixes
/// the earlier mount wins, regardless of prefix length.
fn lookup<'a>(mounts: &'a [Mount], key: &Key) -> Option<(&'a Mount, Key)> {
    mounts
        .iter()
        .find(|mount| mount.prefix == *key || mount.prefix.is_ancestor_of(key))
        .map(|mount| {
            let rest = Key::new(&key.as_str()[mount.prefix.as_str().len()..]);
            (mount, rest)
        })
}

/// Routes operations to one of several child datastores by key prefix.
///
/// Point operations resolve the key and delegate with the remainder; a key
/// no mount covers is a [`StoreError::NoMount`] failure. Queries support
/// only a bare prefix (plus keys-only) resolving to exactly one mount;
/// anything richer is rejected up front. Batches open one child batch per
/// resolved mount and commit them sequentially and independently — a
/// multi-mount batch is not atomic as a unit.
pub struct MountDatastore {
    mounts: Vec<Mount>,
}

impl MountDatastore {
    pub fn new(mounts: Vec<Mount>) -> Self {
        Self { mounts }
    }

    fn resolve(&self, key: &Key) -> StoreResult<(&Mount, Key)> {
        lookup(&self.mounts, key).ok_or_else(|| StoreError::NoMount(key.clone()))
    }
}

impl Datastore for MountDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        let (mount, rest) = self.resolve(&key)?;
        mount.datastore.put(rest, value)
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        let (mount, rest) = self.resolve(key)?;
        mount.datastore.get(&rest)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        let (mount, rest) = self.resolve(key)?;
        mount.datastore.has(&rest)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let (mount, rest) = self.resolve(key)?;
        mount.datastore.delete(&rest)
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        if !query.is_bare_prefix() {
            return Err(StoreError::UnsupportedQuery(
                "mount supports only listing the keys under one prefix".into(),
            ));
        }
        let prefix = Key::new(query.prefix.as_deref().unwrap_or("/"));
        let (mount, rest) = self.resolve(&prefix)?;

        let mut child_query = Query::new().with_prefix(rest.as_str());
        if query.keys_only {
            child_query = child_query.keys_only();
        }
        let results = mount.datastore.query(child_query)?;

        // Surface child keys back in the mounted key space.
        let mount_point = mount.prefix.clone();
        Ok(results
            .map_entries(move |entry| {
                let key = mount_point.child(&entry.key);
                Ok(entry.with_key(key))
            })
            .with_query(query))
    }

    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        Ok(Box::new(MountBatch {
            mounts: self.mounts.clone(),
            open: HashMap::new(),
        }))
    }
}

struct MountBatch {
    mounts: Vec<Mount>,
    /// Child batches, lazily opened, keyed by mount prefix.
    open: HashMap<Key, Box<dyn Batch>>,
}

impl MountBatch {
    fn batch_for(&mut self, key: &Key) -> StoreResult<(&mut Box<dyn Batch>, Key)> {
        let (mount, rest) =
            lookup(&self.mounts, key).ok_or_else(|| StoreError::NoMount(key.clone()))?;
        let batch = match self.open.entry(mount.prefix.clone()) {
            hash_map::Entry::Occupied(slot) => slot.into_mut(),
            hash_map::Entry::Vacant(slot) => slot.insert(mount.datastore.batch()?),
        };
        Ok((batch, rest))
    }
}

impl Batch for MountBatch {
    fn put(&mut self, key: Key, value: Bytes) -> StoreResult<()> {
        let (batch, rest) = self.batch_for(&key)?;
        batch.put(rest, value)
    }

    fn delete(&mut self, key: Key) -> StoreResult<()> {
        let (batch, rest) = self.batch_for(&key)?;
        batch.delete(rest)
    }

    fn commit(&mut self) -> StoreResult<()> {
        // Sequential, independent commits; an error stops the walk but
        // does not roll back mounts already committed.
        for batch in self.open.values_mut() {
            batch.commit()?;
        }
        Ok(())
    }
}
