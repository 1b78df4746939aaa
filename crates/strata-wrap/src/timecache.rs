use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

use strata_query::{Query, Results};
use strata_store::Datastore;
use strata_types::{Key, StoreResult};

/// TTL-based expiration over a child store.
///
/// Every put records an absolute expiry instant; reads first sweep the
/// expiry table and delete the child keys whose expiry is at or before
/// now. Expiration is best-effort: a concurrent put can race with its own
/// key's eviction, and keys written to the child around this wrapper have
/// no expiry entry and are never evicted by it.
pub struct TimeCacheDatastore {
    child: Arc<dyn Datastore>,
    ttl: Duration,
    expiries: Mutex<HashMap<Key, Instant>>,
}

impl TimeCacheDatastore {
    pub fn new(child: Arc<dyn Datastore>, ttl: Duration) -> Self {
        Self {
            child,
            ttl,
            expiries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently tracked for expiry.
    pub fn tracked(&self) -> usize {
        self.expiries.lock().expect("ttl lock poisoned").len()
    }

    fn sweep(&self) {
        let now = Instant::now();
        let expired: Vec<Key> = {
            let mut table = self.expiries.lock().expect("ttl lock poisoned");
            let expired: Vec<Key> = table
                .iter()
                .filter(|(_, expiry)| **expiry <= now)
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                table.remove(key);
            }
            expired
        };
        for key in expired {
            debug!(key = %key, "evicting expired entry");
            match self.child.delete(&key) {
                Ok(()) => {}
                // Already gone (deleted around the cache, or a racing
                // sweep won); nothing left to evict.
                Err(err) if err.is_not_found() => {}
                Err(err) => warn!(key = %key, error = %err, "failed to evict expired entry"),
            }
        }
    }
}

impl Datastore for TimeCacheDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        self.child.put(key.clone(), value)?;
        self.expiries
            .lock()
            .expect("ttl lock poisoned")
            .insert(key, Instant::now() + self.ttl);
        Ok(())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        self.sweep();
        self.child.get(key)
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        self.sweep();
        self.child.has(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        self.expiries.lock().expect("ttl lock poisoned").remove(key);
        self.child.delete(key)
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        self.child.query(query)
    }
}
