//! Query model and streaming result pipeline for Strata datastores.
//!
//! A [`Query`] describes what a caller wants back from a datastore: an
//! optional key prefix, ordered filter predicates, ordered comparators,
//! paging (offset/limit), and a keys-only flag. A [`Results`] value is the
//! answer: a pull-based, cancellable stream of [`Entry`] items produced by
//! one worker per pipeline stage.
//!
//! Backends with native query support build a [`Results`] directly from
//! their own enumeration via [`ResultBuilder`]. Backends without it layer
//! generic stages on top of a raw enumeration with
//! [`Results::naive_apply`], which applies the canonical stage order:
//! prefix filter, explicit filters, explicit orders, offset, limit.
//!
//! # Stream discipline
//!
//! Every stage runs on its own OS thread connected by bounded channels, so
//! backpressure propagates naturally. Error items are forwarded
//! immediately and never buffered or dropped. Each query owns one
//! [`CancelToken`] shared by all of its stages; cancelling it (or dropping
//! the [`Results`]) tears the whole pipeline down, including the backend
//! enumeration feeding it.

pub mod entry;
pub mod filter;
pub mod order;
pub mod query;
pub mod results;

pub use entry::Entry;
pub use filter::{CompareOp, Filter, KeyCompareFilter, KeyPrefixFilter, ValueCompareFilter};
pub use order::{ByComparator, KeyAscending, KeyDescending, Order};
pub use query::Query;
pub use results::{CancelToken, ResultBuilder, Results, KEYS_ONLY_BUF_SIZE};
