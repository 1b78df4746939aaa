use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::debug;

use strata_query::{Query, Results};
use strata_store::Datastore;
use strata_types::{Key, StoreResult};

/// Write-buffering decorator over a batching-capable child.
///
/// Puts land in an in-memory buffer keyed by key (a later put for the same
/// key overwrites the buffered value). Once the buffer grows past
/// `max_entries`, the whole buffer is flushed through one child batch —
/// including the put that crossed the threshold, before that put returns.
///
/// Reads are read-your-own-writes: `get`/`has` consult the buffer first.
/// Deletes are never buffered: the key is dropped from the buffer and a
/// delete is always issued to the child; a `NotFound` from the child is
/// tolerated when the key was still sitting in the buffer. Queries flush
/// first so pending writes are visible.
pub struct AutoBatchDatastore {
    child: Arc<dyn Datastore>,
    max_entries: usize,
    buffer: Mutex<HashMap<Key, Bytes>>,
}

impl AutoBatchDatastore {
    /// Wrap `child`, which must support batching. The capability is
    /// probed here, once, rather than on every flush.
    pub fn new(child: Arc<dyn Datastore>, max_entries: usize) -> StoreResult<Self> {
        child.batch().map(|_| ())?;
        Ok(Self {
            child,
            max_entries,
            buffer: Mutex::new(HashMap::new()),
        })
    }

    /// Push every buffered put through one child batch.
    ///
    /// The buffer is taken eagerly; a commit failure surfaces to the
    /// caller and the taken writes are not restored.
    pub fn flush(&self) -> StoreResult<()> {
        let drained: Vec<(Key, Bytes)> = {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            buffer.drain().collect()
        };
        if drained.is_empty() {
            return Ok(());
        }
        debug!(count = drained.len(), "flushing buffered writes");
        let mut batch = self.child.batch()?;
        for (key, value) in drained {
            batch.put(key, value)?;
        }
        batch.commit()
    }

    /// Number of writes currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.lock().expect("buffer lock poisoned").len()
    }
}

impl Datastore for AutoBatchDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        let over_threshold = {
            let mut buffer = self.buffer.lock().expect("buffer lock poisoned");
            buffer.insert(key, value);
            buffer.len() > self.max_entries
        };
        if over_threshold {
            self.flush()?;
        }
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        let buffered = {
            let buffer = self.buffer.lock().expect("buffer lock poisoned");
            buffer.get(key).cloned()
        };
        match buffered {
            Some(value) => Ok(value),
            None => self.child.get(key),
        }
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        if self.buffer.lock().expect("buffer lock poisoned").contains_key(key) {
            return Ok(true);
        }
        self.child.has(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let was_buffered = self
            .buffer
            .lock()
            .expect("buffer lock poisoned")
            .remove(key)
            .is_some();
        match self.child.delete(key) {
            // The key never reached the child; dropping it from the
            // buffer already deleted it.
            Err(err) if err.is_not_found() && was_buffered => Ok(()),
            other => other,
        }
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        self.flush()?;
        self.child.query(query)
    }
}
