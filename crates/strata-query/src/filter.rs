//! Filter predicates applied to entries by the pipeline's filter stage.

use std::cmp::Ordering;

use bytes::Bytes;
use strata_types::Key;

use crate::entry::Entry;

/// A predicate over entries. Implemented by the concrete filters below and,
/// via the blanket impl, by any `Fn(&Entry) -> bool` closure.
pub trait Filter: Send + Sync {
    /// Returns `true` if the entry should be kept.
    fn matches(&self, entry: &Entry) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&Entry) -> bool + Send + Sync,
{
    fn matches(&self, entry: &Entry) -> bool {
        self(entry)
    }
}

/// Comparison operator for key and value filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl CompareOp {
    fn admits(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Equal => ordering == Ordering::Equal,
            CompareOp::NotEqual => ordering != Ordering::Equal,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEqual => ordering != Ordering::Less,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

/// Keeps entries whose key compares against a fixed key as requested.
#[derive(Clone, Debug)]
pub struct KeyCompareFilter {
    pub op: CompareOp,
    pub key: Key,
}

impl KeyCompareFilter {
    pub fn new(op: CompareOp, key: Key) -> Self {
        Self { op, key }
    }
}

impl Filter for KeyCompareFilter {
    fn matches(&self, entry: &Entry) -> bool {
        self.op.admits(entry.key.cmp(&self.key))
    }
}

/// Keeps entries whose canonical key string starts with a prefix.
///
/// This is the plain string test used by the naive prefix stage; it is
/// intentionally not segment-aware (`/ab` passes a `/a` prefix filter).
#[derive(Clone, Debug)]
pub struct KeyPrefixFilter {
    pub prefix: String,
}

impl KeyPrefixFilter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Filter for KeyPrefixFilter {
    fn matches(&self, entry: &Entry) -> bool {
        entry.key.as_str().starts_with(&self.prefix)
    }
}

/// Keeps entries whose value compares against a fixed payload as requested.
///
/// Keys-only entries carry no value and never match.
#[derive(Clone, Debug)]
pub struct ValueCompareFilter {
    pub op: CompareOp,
    pub value: Bytes,
}

impl ValueCompareFilter {
    pub fn new(op: CompareOp, value: Bytes) -> Self {
        Self { op, value }
    }
}

impl Filter for ValueCompareFilter {
    fn matches(&self, entry: &Entry) -> bool {
        match &entry.value {
            Some(value) => self.op.admits(value.as_ref().cmp(self.value.as_ref())),
            None => false,
        }
    }
}
