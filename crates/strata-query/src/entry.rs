use bytes::Bytes;
use strata_types::Key;

/// A single key/value pair flowing through a query result stream.
///
/// The value is absent when the producing query was keys-only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// The key this entry was stored under.
    pub key: Key,
    /// The stored payload, or `None` for keys-only results.
    pub value: Option<Bytes>,
}

impl Entry {
    /// An entry carrying both key and value.
    pub fn new(key: Key, value: Bytes) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }

    /// A keys-only entry.
    pub fn key_only(key: Key) -> Self {
        Self { key, value: None }
    }

    /// Replace the key, keeping the value. Used by key-rewriting wrappers.
    pub fn with_key(self, key: Key) -> Self {
        Self { key, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_only_has_no_value() {
        let e = Entry::key_only(Key::new("/a"));
        assert!(e.value.is_none());
    }

    #[test]
    fn with_key_preserves_value() {
        let e = Entry::new(Key::new("/a"), Bytes::from_static(b"v"));
        let moved = e.with_key(Key::new("/b"));
        assert_eq!(moved.key, Key::new("/b"));
        assert_eq!(moved.value, Some(Bytes::from_static(b"v")));
    }
}
