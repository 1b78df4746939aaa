use bytes::Bytes;

use strata_query::{Query, Results};
use strata_types::{Key, StoreError, StoreResult};

use crate::batch::BasicBatch;
use crate::traits::{Batch, Datastore};

/// A datastore that stores nothing.
///
/// Writes and deletes are accepted and discarded, reads always miss, and
/// queries complete empty. Useful as a sink when only the side effects of
/// a wrapper chain matter (timing, counting, protocol exercising).
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDatastore;

impl NullDatastore {
    pub fn new() -> Self {
        Self
    }
}

impl Datastore for NullDatastore {
    fn put(&self, _key: Key, _value: Bytes) -> StoreResult<()> {
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        Err(StoreError::NotFound(key.clone()))
    }

    fn has(&self, _key: &Key) -> StoreResult<bool> {
        Ok(false)
    }

    fn delete(&self, _key: &Key) -> StoreResult<()> {
        Ok(())
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        Ok(Results::from_entries(query, Vec::new()))
    }

    fn batch(&self) -> StoreResult<Box<dyn Batch>> {
        Ok(Box::new(BasicBatch::new(*self)))
    }
}
