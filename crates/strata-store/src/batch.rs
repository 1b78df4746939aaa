use std::collections::HashMap;

use bytes::Bytes;

use strata_types::{Key, StoreResult};

use crate::traits::{Batch, Datastore};

/// Generic batch for datastores without a native batching strategy.
///
/// Buffers puts keyed by key (a later put for the same key overwrites the
/// earlier one) and deletes in arrival order. Commit applies all puts,
/// then all deletes, one operation at a time; the first failing operation
/// aborts the commit and already-applied operations are not rolled back.
pub struct BasicBatch<D: Datastore> {
    target: D,
    puts: HashMap<Key, Bytes>,
    deletes: Vec<Key>,
}

impl<D: Datastore> BasicBatch<D> {
    pub fn new(target: D) -> Self {
        Self {
            target,
            puts: HashMap::new(),
            deletes: Vec::new(),
        }
    }
}

impl<D: Datastore> Batch for BasicBatch<D> {
    fn put(&mut self, key: Key, value: Bytes) -> StoreResult<()> {
        self.puts.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: Key) -> StoreResult<()> {
        self.deletes.push(key);
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        for (key, value) in self.puts.drain() {
            self.target.put(key, value)?;
        }
        for key in self.deletes.drain(..) {
            self.target.delete(&key)?;
        }
        Ok(())
    }
}
