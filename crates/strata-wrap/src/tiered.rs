use std::sync::Arc;

use bytes::Bytes;

use strata_query::{Query, Results};
use strata_store::Datastore;
use strata_types::{Key, StoreError, StoreResult};

/// Read-through chain over an ordered list of children.
///
/// Writes go to every tier, front to back; the first failure aborts and
/// surfaces. Reads return the first tier that has the key, falling through
/// `NotFound` misses. Deletes are issued to every tier and succeed if any
/// tier held the key. Queries delegate to the last tier, which by
/// convention is the largest/slowest and holds the full data set.
pub struct TieredDatastore {
    tiers: Vec<Arc<dyn Datastore>>,
}

impl TieredDatastore {
    pub fn new(tiers: Vec<Arc<dyn Datastore>>) -> Self {
        Self { tiers }
    }
}

impl Datastore for TieredDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        for tier in &self.tiers {
            tier.put(key.clone(), value.clone())?;
        }
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        for tier in &self.tiers {
            match tier.get(key) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::NotFound(key.clone()))
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        for tier in &self.tiers {
            if tier.has(key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let mut found = false;
        for tier in &self.tiers {
            match tier.delete(key) {
                Ok(()) => found = true,
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        if found {
            Ok(())
        } else {
            Err(StoreError::NotFound(key.clone()))
        }
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        match self.tiers.last() {
            Some(tier) => tier.query(query),
            None => Ok(Results::from_entries(query, Vec::new())),
        }
    }
}
