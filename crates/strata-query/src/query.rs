use std::fmt;
use std::sync::Arc;

use crate::filter::Filter;
use crate::order::Order;

/// An immutable query specification.
///
/// A default query matches every entry. Fields are combined with the
/// chainable constructors:
///
/// ```
/// use strata_query::{KeyAscending, Query};
///
/// let q = Query::new()
///     .with_prefix("/users")
///     .with_order(KeyAscending)
///     .with_limit(10);
/// ```
///
/// `limit` and `offset` of `0` mean unbounded and none respectively.
#[derive(Clone, Default)]
pub struct Query {
    /// Keep only keys whose canonical string starts with this prefix.
    pub prefix: Option<String>,
    /// Predicates applied in declaration order.
    pub filters: Vec<Arc<dyn Filter>>,
    /// Comparators applied in declaration order.
    pub orders: Vec<Arc<dyn Order>>,
    /// Maximum number of entries to return; `0` is unbounded.
    pub limit: usize,
    /// Number of leading entries to drop; `0` is none.
    pub offset: usize,
    /// Return keys without payloads.
    pub keys_only: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn with_order(mut self, order: impl Order + 'static) -> Self {
        self.orders.push(Arc::new(order));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    /// Returns `true` if the prefix is the only non-default constraint
    /// (keys-only excepted). Routing datastores only support such queries.
    pub fn is_bare_prefix(&self) -> bool {
        self.filters.is_empty() && self.orders.is_empty() && self.limit == 0 && self.offset == 0
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("prefix", &self.prefix)
            .field("filters", &self.filters.len())
            .field("orders", &self.orders.len())
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("keys_only", &self.keys_only)
            .finish()
    }
}
