use std::collections::{hash_map, HashMap};
use std::sync::{Arc, Condvar, Mutex};

use bytes::Bytes;

use strata_query::{Query, Results};
use strata_store::Datastore;
use strata_types::{Key, StoreResult};

/// Identity of an in-flight operation. Two calls coalesce only if their
/// signatures are equal — same operation, same key, and for puts the same
/// payload.
#[derive(Clone, PartialEq, Eq, Hash)]
enum OpSignature {
    Put(Key, Bytes),
    Get(Key),
    Has(Key),
    Delete(Key),
}

/// Result of a coalesced execution, fanned out to every joined caller.
#[derive(Clone)]
enum OpOutput {
    Unit,
    Value(Bytes),
    Presence(bool),
}

/// One in-flight execution: the eventual outcome plus a wake-all signal.
struct Flight {
    outcome: Mutex<Option<StoreResult<OpOutput>>>,
    done: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, outcome: StoreResult<OpOutput>) {
        let mut slot = self.outcome.lock().expect("flight lock poisoned");
        *slot = Some(outcome);
        self.done.notify_all();
    }

    fn wait(&self) -> StoreResult<OpOutput> {
        let mut slot = self.outcome.lock().expect("flight lock poisoned");
        while slot.is_none() {
            slot = self.done.wait(slot).expect("flight lock poisoned");
        }
        slot.clone().expect("flight completed without outcome")
    }
}

/// Single-flight deduplication of concurrent identical requests.
///
/// The first caller to register a signature executes the real operation
/// against the child; callers arriving while it is in flight block and
/// then reuse its outcome — value or error — without touching the child.
/// Calls that arrive after completion execute afresh. Queries are never
/// coalesced.
pub struct CoalescingDatastore {
    child: Arc<dyn Datastore>,
    inflight: Mutex<HashMap<OpSignature, Arc<Flight>>>,
}

impl CoalescingDatastore {
    pub fn new(child: Arc<dyn Datastore>) -> Self {
        Self {
            child,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn coalesce(
        &self,
        signature: OpSignature,
        exec: impl FnOnce() -> StoreResult<OpOutput>,
    ) -> StoreResult<OpOutput> {
        let (flight, leader) = {
            let mut map = self.inflight.lock().expect("inflight lock poisoned");
            match map.entry(signature.clone()) {
                hash_map::Entry::Occupied(slot) => (Arc::clone(slot.get()), false),
                hash_map::Entry::Vacant(slot) => {
                    let flight = Arc::new(Flight::new());
                    slot.insert(Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if leader {
            let outcome = exec();
            // Deregister before waking waiters so late arrivals start a
            // fresh execution instead of reusing a stale outcome.
            self.inflight
                .lock()
                .expect("inflight lock poisoned")
                .remove(&signature);
            flight.complete(outcome.clone());
            outcome
        } else {
            flight.wait()
        }
    }
}

impl Datastore for CoalescingDatastore {
    fn put(&self, key: Key, value: Bytes) -> StoreResult<()> {
        let signature = OpSignature::Put(key.clone(), value.clone());
        self.coalesce(signature, || {
            self.child.put(key, value).map(|()| OpOutput::Unit)
        })
        .map(|_| ())
    }

    fn get(&self, key: &Key) -> StoreResult<Bytes> {
        let signature = OpSignature::Get(key.clone());
        let output = self.coalesce(signature, || self.child.get(key).map(OpOutput::Value))?;
        match output {
            OpOutput::Value(value) => Ok(value),
            _ => unreachable!("coalesced get completed without a value"),
        }
    }

    fn has(&self, key: &Key) -> StoreResult<bool> {
        let signature = OpSignature::Has(key.clone());
        let output = self.coalesce(signature, || self.child.has(key).map(OpOutput::Presence))?;
        match output {
            OpOutput::Presence(present) => Ok(present),
            _ => unreachable!("coalesced has completed without a presence flag"),
        }
    }

    fn delete(&self, key: &Key) -> StoreResult<()> {
        let signature = OpSignature::Delete(key.clone());
        self.coalesce(signature, || {
            self.child.delete(key).map(|()| OpOutput::Unit)
        })
        .map(|_| ())
    }

    fn query(&self, query: Query) -> StoreResult<Results> {
        self.child.query(query)
    }
}
