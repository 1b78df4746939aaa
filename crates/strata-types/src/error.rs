use thiserror::Error;

use crate::key::Key;

/// Errors from datastore operations.
///
/// The enum is `Clone` so a single outcome can be handed to every caller
/// that joined a coalesced request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("key not found: {0}")]
    NotFound(Key),

    /// A raw key string violated the canonical-key invariant.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// The datastore has no batching strategy.
    #[error("batching is not supported by this datastore")]
    BatchUnsupported,

    /// No mount prefix covers the given key.
    #[error("no mount covers key: {0}")]
    NoMount(Key),

    /// The query requests capabilities this datastore cannot satisfy.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// A key expected to live under a namespace prefix does not.
    #[error("key is outside the expected prefix: {0}")]
    OutsidePrefix(Key),

    /// I/O error from an underlying storage engine.
    #[error("I/O error: {0}")]
    Io(String),

    /// Opaque fault reported by a concrete backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl StoreError {
    /// Returns `true` if this error is [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Result alias for datastore operations.
pub type StoreResult<T> = Result<T, StoreError>;
