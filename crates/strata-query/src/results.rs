//! Pull-based, cancellable result streams and their pipeline stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::{mpsc, Arc};
use std::thread;

use strata_types::StoreResult;

use crate::entry::Entry;
use crate::filter::{Filter, KeyPrefixFilter};
use crate::order::Order;
use crate::query::Query;

/// Channel capacity for keys-only queries. Key-only items are cheap, so a
/// deeper read-ahead buffer pays for itself on large scans.
pub const KEYS_ONLY_BUF_SIZE: usize = 128;

/// Channel capacity for ordinary queries and intermediate stages.
const STAGE_BUF_SIZE: usize = 1;

/// Cooperative cancellation signal shared by every stage of one query.
///
/// Cancellation is edge-triggered and sticky: once set it never resets.
/// Stages check it at each suspension point; producers blocked on a full
/// channel are additionally unblocked by channel disconnection when the
/// consumer side is dropped.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

fn spawn_worker(name: &str, f: impl FnOnce() + Send + 'static) {
    thread::Builder::new()
        .name(format!("strata-query-{name}"))
        .spawn(f)
        .expect("failed to spawn query worker thread");
}

/// Construction side of a backend-driven result stream.
///
/// A backend obtains a builder, hands [`ResultBuilder::sender`] and
/// [`ResultBuilder::cancel_token`] to its enumeration worker, and returns
/// [`ResultBuilder::build`] to the caller. The worker must stop when the
/// token reports cancellation or a send fails (the consumer went away).
pub struct ResultBuilder {
    query: Query,
    cancel: CancelToken,
    tx: SyncSender<StoreResult<Entry>>,
    rx: Receiver<StoreResult<Entry>>,
}

impl ResultBuilder {
    pub fn new(query: Query) -> Self {
        let capacity = if query.keys_only {
            KEYS_ONLY_BUF_SIZE
        } else {
            STAGE_BUF_SIZE
        };
        let (tx, rx) = mpsc::sync_channel(capacity);
        Self {
            query,
            cancel: CancelToken::new(),
            tx,
            rx,
        }
    }

    /// A sender for the producing worker. May be cloned.
    pub fn sender(&self) -> SyncSender<StoreResult<Entry>> {
        self.tx.clone()
    }

    /// The query's shared cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Finish construction. The builder's own sender handle is dropped
    /// here, so the stream completes when the last producer clone does.
    pub fn build(self) -> Results {
        Results {
            query: self.query,
            cancel: self.cancel,
            rx: self.rx,
        }
    }
}

/// A pull-based stream of query results.
///
/// Iterating yields `StoreResult<Entry>` items; an `Err` item is a
/// per-item fault forwarded from the producing side. Dropping the stream
/// (or calling [`Results::close`]) tears down every upstream stage and
/// producer.
pub struct Results {
    query: Query,
    cancel: CancelToken,
    rx: Receiver<StoreResult<Entry>>,
}

impl Results {
    /// Start building a backend-driven stream.
    pub fn builder(query: Query) -> ResultBuilder {
        ResultBuilder::new(query)
    }

    /// A stream over an already-materialized set of entries.
    ///
    /// The entries are fed through a worker and a bounded channel like any
    /// other producer, so backpressure and cancellation behave uniformly.
    pub fn from_entries(query: Query, entries: Vec<Entry>) -> Results {
        let builder = Self::builder(query);
        let tx = builder.sender();
        let cancel = builder.cancel_token();
        spawn_worker("source", move || {
            for entry in entries {
                if cancel.is_cancelled() || tx.send(Ok(entry)).is_err() {
                    break;
                }
            }
        });
        builder.build()
    }

    /// The query this stream answers.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The query's shared cancellation token.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Re-label this stream as answering a different query, e.g. after a
    /// routing wrapper rewrote the spec for its child.
    pub fn with_query(self, query: Query) -> Results {
        Results { query, ..self }
    }

    /// Pull the next item, blocking until one is available. `None` means
    /// the stream completed.
    pub fn next_item(&self) -> Option<StoreResult<Entry>> {
        self.rx.recv().ok()
    }

    /// Cancel the query and tear down the pipeline.
    pub fn close(self) {
        self.cancel.cancel();
        // Dropping the receiver disconnects blocked producers.
    }

    /// Drain the stream to completion, collecting entries.
    ///
    /// Drain policy: the first error item aborts the drain and is returned;
    /// entries already collected are discarded. Every Strata consumer uses
    /// this policy.
    pub fn rest(self) -> StoreResult<Vec<Entry>> {
        let mut entries = Vec::new();
        for item in self {
            entries.push(item?);
        }
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Pipeline stages. Each consumes the stream and returns a derived one
    // sharing the same cancellation token, with one worker in between.
    // -----------------------------------------------------------------------

    /// Forward entries admitted by `filter`; error items pass through.
    pub fn filter(self, filter: Arc<dyn Filter>) -> Results {
        let Results {
            query,
            cancel,
            rx: upstream,
        } = self;
        let (tx, rx) = mpsc::sync_channel(STAGE_BUF_SIZE);
        let stage_cancel = cancel.clone();
        spawn_worker("filter", move || {
            while let Ok(item) = upstream.recv() {
                if stage_cancel.is_cancelled() {
                    break;
                }
                let keep = match &item {
                    Err(_) => true,
                    Ok(entry) => filter.matches(entry),
                };
                if keep && tx.send(item).is_err() {
                    break;
                }
            }
        });
        Results { query, cancel, rx }
    }

    /// Buffer the full upstream, sort it, then emit in order.
    ///
    /// Sorting cannot be incremental, so this stage holds every entry in
    /// memory until the upstream completes. `Vec::sort_by` is stable, so
    /// equal entries keep their arrival order. Error items are forwarded
    /// immediately, not buffered.
    pub fn order(self, order: Arc<dyn Order>) -> Results {
        let Results {
            query,
            cancel,
            rx: upstream,
        } = self;
        let (tx, rx) = mpsc::sync_channel(STAGE_BUF_SIZE);
        let stage_cancel = cancel.clone();
        spawn_worker("order", move || {
            let mut entries = Vec::new();
            while let Ok(item) = upstream.recv() {
                if stage_cancel.is_cancelled() {
                    return;
                }
                match item {
                    Ok(entry) => entries.push(entry),
                    Err(err) => {
                        if tx.send(Err(err)).is_err() {
                            return;
                        }
                    }
                }
            }
            order.sort(&mut entries);
            for entry in entries {
                if stage_cancel.is_cancelled() || tx.send(Ok(entry)).is_err() {
                    return;
                }
            }
        });
        Results { query, cancel, rx }
    }

    /// Drop the first `offset` entries; error items pass through and do
    /// not count. An offset of `0` forwards everything.
    pub fn offset(self, offset: usize) -> Results {
        let Results {
            query,
            cancel,
            rx: upstream,
        } = self;
        let (tx, rx) = mpsc::sync_channel(STAGE_BUF_SIZE);
        let stage_cancel = cancel.clone();
        spawn_worker("offset", move || {
            let mut skipped = 0;
            while let Ok(item) = upstream.recv() {
                if stage_cancel.is_cancelled() {
                    break;
                }
                if item.is_ok() && skipped < offset {
                    skipped += 1;
                    continue;
                }
                if tx.send(item).is_err() {
                    break;
                }
            }
        });
        Results { query, cancel, rx }
    }

    /// Forward entries until `limit` have been sent, then stop pulling
    /// upstream. Error items pass through and do not count. A limit of
    /// `0` is unbounded.
    pub fn limit(self, limit: usize) -> Results {
        let Results {
            query,
            cancel,
            rx: upstream,
        } = self;
        let (tx, rx) = mpsc::sync_channel(STAGE_BUF_SIZE);
        let stage_cancel = cancel.clone();
        spawn_worker("limit", move || {
            let mut sent = 0;
            while let Ok(item) = upstream.recv() {
                if stage_cancel.is_cancelled() {
                    break;
                }
                let counts = item.is_ok();
                if tx.send(item).is_err() {
                    break;
                }
                if counts {
                    sent += 1;
                    if limit > 0 && sent >= limit {
                        // Dropping the upstream receiver here cascades the
                        // shutdown to every producer above this stage.
                        break;
                    }
                }
            }
        });
        Results { query, cancel, rx }
    }

    /// Rewrite each entry through `f`; a rewrite failure becomes an error
    /// item. Upstream error items pass through untouched. Used by
    /// key-rewriting wrappers.
    pub fn map_entries(
        self,
        f: impl Fn(Entry) -> StoreResult<Entry> + Send + 'static,
    ) -> Results {
        let Results {
            query,
            cancel,
            rx: upstream,
        } = self;
        let (tx, rx) = mpsc::sync_channel(STAGE_BUF_SIZE);
        let stage_cancel = cancel.clone();
        spawn_worker("map", move || {
            while let Ok(item) = upstream.recv() {
                if stage_cancel.is_cancelled() {
                    break;
                }
                let mapped = match item {
                    Ok(entry) => f(entry),
                    Err(err) => Err(err),
                };
                if tx.send(mapped).is_err() {
                    break;
                }
            }
        });
        Results { query, cancel, rx }
    }

    /// Apply every constraint of `query` as generic stages, in the
    /// canonical order: prefix filter, explicit filters, explicit orders,
    /// offset, limit. Paging therefore always applies to the final
    /// filtered, ordered result set.
    pub fn naive_apply(self, query: &Query) -> Results {
        let mut results = self;
        if let Some(prefix) = query.prefix.clone() {
            results = results.filter(Arc::new(KeyPrefixFilter::new(prefix)));
        }
        for filter in &query.filters {
            results = results.filter(Arc::clone(filter));
        }
        for order in &query.orders {
            results = results.order(Arc::clone(order));
        }
        if query.offset > 0 {
            results = results.offset(query.offset);
        }
        if query.limit > 0 {
            results = results.limit(query.limit);
        }
        results
    }
}

impl Iterator for Results {
    type Item = StoreResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl std::fmt::Debug for Results {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("query", &self.query)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{CompareOp, KeyCompareFilter};
    use crate::order::KeyAscending;
    use bytes::Bytes;
    use std::sync::atomic::AtomicUsize;
    use strata_types::{Key, StoreError};

    /// The six-key fixture exercised throughout the original test suite.
    fn sample_entries() -> Vec<Entry> {
        ["/ab/c", "/ab/cd", "/a", "/abce", "/abcf", "/ab"]
            .iter()
            .map(|k| Entry::key_only(Key::new(k)))
            .collect()
    }

    fn keys(entries: &[Entry]) -> Vec<String> {
        entries.iter().map(|e| e.key.to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // Construction and draining
    // -----------------------------------------------------------------------

    #[test]
    fn from_entries_round_trips() {
        let results = Results::from_entries(Query::new(), sample_entries());
        let entries = results.rest().unwrap();
        assert_eq!(keys(&entries), ["/ab/c", "/ab/cd", "/a", "/abce", "/abcf", "/ab"]);
    }

    #[test]
    fn builder_driven_stream() {
        let builder = Results::builder(Query::new());
        let tx = builder.sender();
        let results = builder.build();
        std::thread::spawn(move || {
            for key in ["/x", "/y"] {
                tx.send(Ok(Entry::key_only(Key::new(key)))).unwrap();
            }
        });
        assert_eq!(keys(&results.rest().unwrap()), ["/x", "/y"]);
    }

    #[test]
    fn rest_aborts_on_first_error_item() {
        let builder = Results::builder(Query::new());
        let tx = builder.sender();
        let results = builder.build();
        std::thread::spawn(move || {
            let _ = tx.send(Ok(Entry::key_only(Key::new("/ok"))));
            let _ = tx.send(Err(StoreError::Backend("decode failed".into())));
            let _ = tx.send(Ok(Entry::key_only(Key::new("/never"))));
        });
        assert_eq!(
            results.rest(),
            Err(StoreError::Backend("decode failed".into()))
        );
    }

    // -----------------------------------------------------------------------
    // Filter stage
    // -----------------------------------------------------------------------

    #[test]
    fn filter_key_greater_than() {
        let results = Results::from_entries(Query::new(), sample_entries()).filter(Arc::new(
            KeyCompareFilter::new(CompareOp::GreaterThan, Key::new("/ab")),
        ));
        assert_eq!(
            keys(&results.rest().unwrap()),
            ["/ab/c", "/ab/cd", "/abce", "/abcf"]
        );
    }

    #[test]
    fn filter_forwards_error_items() {
        let builder = Results::builder(Query::new());
        let tx = builder.sender();
        let results = builder
            .build()
            .filter(Arc::new(|_: &Entry| false));
        std::thread::spawn(move || {
            let _ = tx.send(Ok(Entry::key_only(Key::new("/dropped"))));
            let _ = tx.send(Err(StoreError::Backend("fault".into())));
        });
        let items: Vec<_> = results.collect();
        assert_eq!(items, vec![Err(StoreError::Backend("fault".into()))]);
    }

    // -----------------------------------------------------------------------
    // Order stage
    // -----------------------------------------------------------------------

    #[test]
    fn order_by_key_ascending() {
        let results =
            Results::from_entries(Query::new(), sample_entries()).order(Arc::new(KeyAscending));
        assert_eq!(
            keys(&results.rest().unwrap()),
            ["/a", "/ab", "/ab/c", "/ab/cd", "/abce", "/abcf"]
        );
    }

    // -----------------------------------------------------------------------
    // Offset and limit stages
    // -----------------------------------------------------------------------

    #[test]
    fn offset_drops_leading_entries() {
        let results = Results::from_entries(Query::new(), sample_entries()).offset(2);
        assert_eq!(
            keys(&results.rest().unwrap()),
            ["/a", "/abce", "/abcf", "/ab"]
        );
    }

    #[test]
    fn offset_past_end_yields_nothing() {
        let results = Results::from_entries(Query::new(), sample_entries()).offset(10);
        assert!(results.rest().unwrap().is_empty());
    }

    #[test]
    fn limit_truncates() {
        let results = Results::from_entries(Query::new(), sample_entries()).limit(2);
        assert_eq!(keys(&results.rest().unwrap()), ["/ab/c", "/ab/cd"]);
    }

    #[test]
    fn limit_zero_is_unbounded() {
        let results = Results::from_entries(Query::new(), sample_entries()).limit(0);
        assert_eq!(results.rest().unwrap().len(), 6);
    }

    #[test]
    fn offset_then_limit_pages() {
        let results = Results::from_entries(Query::new(), sample_entries())
            .offset(2)
            .limit(2);
        assert_eq!(keys(&results.rest().unwrap()), ["/a", "/abce"]);
    }

    // -----------------------------------------------------------------------
    // Map stage
    // -----------------------------------------------------------------------

    #[test]
    fn map_entries_rewrites_keys() {
        let results = Results::from_entries(
            Query::new(),
            vec![Entry::new(Key::new("/a"), Bytes::from_static(b"v"))],
        )
        .map_entries(|e| {
            let key = Key::new("/ns").child(&e.key);
            Ok(e.with_key(key))
        });
        let entries = results.rest().unwrap();
        assert_eq!(keys(&entries), ["/ns/a"]);
        assert_eq!(entries[0].value, Some(Bytes::from_static(b"v")));
    }

    #[test]
    fn map_entries_failure_becomes_error_item() {
        let results = Results::from_entries(Query::new(), sample_entries())
            .map_entries(|e| Err(StoreError::OutsidePrefix(e.key)));
        assert!(results.rest().is_err());
    }

    // -----------------------------------------------------------------------
    // Naive application
    // -----------------------------------------------------------------------

    #[test]
    fn naive_apply_canonical_order() {
        // Filtering and ordering happen before paging, so offset/limit
        // page over the final logical result set.
        let query = Query::new()
            .with_prefix("/ab")
            .with_order(KeyAscending)
            .with_offset(1)
            .with_limit(2);
        let results =
            Results::from_entries(query.clone(), sample_entries()).naive_apply(&query);
        assert_eq!(keys(&results.rest().unwrap()), ["/ab/c", "/ab/cd"]);
    }

    #[test]
    fn naive_apply_prefix_only() {
        let query = Query::new().with_prefix("/ab/");
        let results =
            Results::from_entries(query.clone(), sample_entries()).naive_apply(&query);
        assert_eq!(keys(&results.rest().unwrap()), ["/ab/c", "/ab/cd"]);
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn dropping_results_stops_producer() {
        let builder = Results::builder(Query::new());
        let tx = builder.sender();
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&produced);
        let handle = std::thread::spawn(move || {
            for i in 0..1000 {
                if tx.send(Ok(Entry::key_only(Key::new(&format!("/k{i}"))))).is_err() {
                    break;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let mut results = builder.build();
        let _ = results.next();
        let _ = results.next();
        drop(results);
        handle.join().unwrap();
        // Two delivered plus at most a few in flight; the producer must
        // not have run anywhere near to completion.
        assert!(produced.load(Ordering::SeqCst) < 10);
    }

    #[test]
    fn limit_tears_down_upstream() {
        let builder = Results::builder(Query::new());
        let tx = builder.sender();
        let handle = std::thread::spawn(move || {
            let mut sent = 0;
            for i in 0..1000 {
                if tx.send(Ok(Entry::key_only(Key::new(&format!("/k{i}"))))).is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        });
        let results = builder.build().limit(3);
        assert_eq!(results.rest().unwrap().len(), 3);
        let sent = handle.join().unwrap();
        assert!(sent < 1000, "producer should have been cut off, sent {sent}");
    }

    #[test]
    fn explicit_close_cancels_token() {
        let results = Results::from_entries(Query::new(), sample_entries());
        let token = results.cancel_token();
        assert!(!token.is_cancelled());
        results.close();
        assert!(token.is_cancelled());
    }

    #[test]
    fn keys_only_uses_larger_buffer() {
        // With a 128-slot buffer the producer can run ahead of the
        // consumer without a rendezvous on every item.
        let builder = Results::builder(Query::new().keys_only());
        let tx = builder.sender();
        let handle = std::thread::spawn(move || {
            let mut sent = 0;
            for i in 0..100 {
                if tx.send(Ok(Entry::key_only(Key::new(&format!("/k{i}"))))).is_err() {
                    break;
                }
                sent += 1;
            }
            sent
        });
        // Producer completes before any pull.
        assert_eq!(handle.join().unwrap(), 100);
        let results = builder.build();
        assert_eq!(results.rest().unwrap().len(), 100);
    }
}
