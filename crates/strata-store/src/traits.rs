use std::sync::Arc;

use bytes::Bytes;

use strata_query::{Query, Results};
use strata_types::{Key, StoreError, StoreResult};

/// A key-value datastore.
///
/// Implemented by concrete storage engines and by every composition
/// wrapper, so behaviors (namespacing, routing, caching, batching,
/// coalescing) are added by wrapping one datastore in another rather than
/// by extending an engine.
///
/// All implementations must satisfy these invariants:
/// - Operations take `&self` and are safe to invoke through a shared
///   `Arc<dyn Datastore>`.
/// - `get` and `delete` fail with `NotFound` for an absent key; `has`
///   never fails for a well-formed key.
/// - A delegating implementation forwards its child's errors unchanged
///   unless its own contract explicitly requires a translation.
/// - `query` fails up front if the spec requests capabilities the
///   implementation cannot satisfy; per-item faults flow through the
///   returned stream as error items instead.
pub trait Datastore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()>;

    /// Fetch the value stored under `key`.
    fn get(&self, key: &Key) -> StoreResult<Bytes>;

    /// Check whether `key` is present.
    fn has(&self, key: &Key) -> StoreResult<bool>;

    /// Remove the value stored under `key`.
    fn delete(&self, key: &Key) -> StoreResult<()>;

    /// Evaluate `query`, returning a streaming result pipeline.
    fn query(&self, query: Query) -> StoreResult<Results>;

    /// Open a write batch.
    ///
    /// The default implementation reports that this datastore has no
    /// batching strategy. Callers probe the capability once, when
    /// composing stores, not per operation.
    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        Err(StoreError::BatchUnsupported)
    }

    /// Wrap this datastore in a reader-writer lock that serializes
    /// writers against readers across the whole delegation chain.
    ///
    /// The synchronized wrapper returns itself here, making the operation
    /// idempotent.
    fn synchronized(self: Arc<Self>) -> Arc<dyn Datastore>
    where
        Self: Sized + 'static,
    {
        let child: Arc<dyn Datastore> = self;
        Arc::new(crate::sync::SynchronizedDatastore::new(child))
    }
}

/// A buffered set of put and delete operations applied via
/// [`Batch::commit`].
///
/// Commit applies all buffered puts (in no significant cross-key order)
/// and then all buffered deletes. No atomicity is guaranteed beyond what
/// the concrete backend's commit provides, and a batch is not safe for
/// concurrent use by multiple callers.
pub trait Batch: Send {
    /// Buffer a put.
    fn put(&mut self, key: Key, value: Bytes) -> StoreResult<()>;

    /// Buffer a delete.
    fn delete(&mut self, key: Key) -> StoreResult<()>;

    /// Apply every buffered operation to the underlying datastore.
    fn commit(&mut self) -> StoreResult<()>;
}
