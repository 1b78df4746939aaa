//! Comparators applied to buffered entries by the pipeline's order stage.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::entry::Entry;

/// Sorts a buffered batch of entries in place.
///
/// The order stage drains its upstream fully before sorting, so an `Order`
/// always sees the complete logical result set.
pub trait Order: Send + Sync {
    fn sort(&self, entries: &mut [Entry]);
}

/// Ascending by key, using the key's segment-wise total order.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyAscending;

impl Order for KeyAscending {
    fn sort(&self, entries: &mut [Entry]) {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

/// Descending by key.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyDescending;

impl Order for KeyDescending {
    fn sort(&self, entries: &mut [Entry]) {
        entries.sort_by(|a, b| b.key.cmp(&a.key));
    }
}

/// Sorts by an arbitrary entry comparator (e.g. by decoded value).
#[derive(Clone)]
pub struct ByComparator(pub Arc<dyn Fn(&Entry, &Entry) -> Ordering + Send + Sync>);

impl ByComparator {
    pub fn new(cmp: impl Fn(&Entry, &Entry) -> Ordering + Send + Sync + 'static) -> Self {
        Self(Arc::new(cmp))
    }
}

impl Order for ByComparator {
    fn sort(&self, entries: &mut [Entry]) {
        entries.sort_by(|a, b| (self.0)(a, b));
    }
}
