//! Datastore contract and reference backends for Strata.
//!
//! This crate defines the uniform contract every Strata storage component
//! implements — concrete engines and composition wrappers alike:
//!
//! - [`Datastore`] — put/get/has/delete plus streaming [`query`], optional
//!   [`batch`], and a [`synchronized`] constructor
//! - [`Batch`] — a buffered set of writes applied together on commit
//!
//! # Reference Backends
//!
//! - [`MapDatastore`] — `HashMap`-based store for tests and embedding
//! - [`NullDatastore`] — accepts writes, returns nothing; a measuring sink
//!
//! # Design Rules
//!
//! 1. Operations take `&self`; implementations use interior mutability and
//!    are safe to share behind an `Arc`.
//! 2. Capability probing is explicit: `batch()` either returns a batch or
//!    fails with `BatchUnsupported`, resolved once at composition time.
//! 3. Errors are typed [`StoreError`](strata_types::StoreError) values and
//!    are never swallowed by a delegating component.
//! 4. Resource release is RAII: dropping a store releases whatever it
//!    holds; there is no explicit dispose call.
//!
//! [`query`]: Datastore::query
//! [`batch`]: Datastore::batch
//! [`synchronized`]: Datastore::synchronized

pub mod batch;
pub mod map;
pub mod null;
pub mod sync;
pub mod traits;

pub use batch::BasicBatch;
pub use map::MapDatastore;
pub use null::NullDatastore;
pub use sync::SynchronizedDatastore;
pub use traits::{Batch, Datastore};
