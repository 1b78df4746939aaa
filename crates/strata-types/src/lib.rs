//! Foundation types for Strata.
//!
//! This crate provides the hierarchical [`Key`] type and the shared
//! [`StoreError`] taxonomy used by every other Strata crate.
//!
//! # Key Types
//!
//! - [`Key`] — Canonical slash-separated path identifying a stored value
//! - [`StoreError`] — Error taxonomy shared across backends and wrappers
//! - [`StoreResult`] — Result alias for datastore operations

pub mod error;
pub mod key;

pub use error::{StoreError, StoreResult};
pub use key::Key;
