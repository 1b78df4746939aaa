//! Composition wrappers for Strata datastores.
//!
//! Every type in this crate implements the
//! [`Datastore`](strata_store::Datastore) contract over one or more child
//! datastores, so behaviors compose as a decorator chain:
//!
//! - [`KeyTransformDatastore`] — rewrites keys through a bijective
//!   transform before delegating
//! - [`NamespaceDatastore`] — scopes a child to a key prefix and guards
//!   queries against leaking foreign keys
//! - [`MountDatastore`] — routes operations to one of several children by
//!   key prefix
//! - [`CoalescingDatastore`] — deduplicates concurrent identical requests
//!   into a single child execution
//! - [`TimeCacheDatastore`] — expires entries a fixed TTL after they are
//!   written
//! - [`AutoBatchDatastore`] — buffers puts and flushes them through a
//!   child batch once a threshold is crossed
//! - [`TieredDatastore`] — reads through an ordered list of children,
//!   writes to all of them
//!
//! The reader-writer-lock wrapper lives in `strata-store` (the contract's
//! `synchronized()` constructor builds it), and is re-exported here for
//! convenience.

pub mod autobatch;
pub mod coalesce;
pub mod keytransform;
pub mod mount;
pub mod namespace;
pub mod tiered;
pub mod timecache;

pub use autobatch::AutoBatchDatastore;
pub use coalesce::CoalescingDatastore;
pub use keytransform::{KeyMapPair, KeyTransform, KeyTransformDatastore};
pub use mount::{Mount, MountDatastore};
pub use namespace::{NamespaceDatastore, PrefixTransform};
pub use strata_store::SynchronizedDatastore;
pub use tiered::TieredDatastore;
pub use timecache::TimeCacheDatastore;
