//! Canonical hierarchical keys.
//!
//! A [`Key`] is an immutable slash-separated path such as `/users/alice`.
//! The canonical form always begins with `/`, never ends with `/` (except
//! the root key `/` itself), and contains no empty segments.
//!
//! Keys form a total order: segment sequences are compared pairwise by
//! ordinal string comparison, and a key whose segments are a prefix of
//! another's sorts first. That makes prefix scans over a sorted key space
//! contiguous:
//!
//! ```
//! use strata_types::Key;
//!
//! assert!(Key::new("/a") < Key::new("/ab"));
//! assert!(Key::new("/ab") < Key::new("/ab/c"));
//! assert!(Key::new("/ab/cd") < Key::new("/abce"));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Canonical hierarchical path identifying a stored value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Key {
    value: String,
}

impl Key {
    /// Build a key from a raw string, canonicalizing it.
    ///
    /// Canonicalization trims surrounding whitespace, splits on `/`,
    /// drops empty segments, and re-joins with a leading `/`. An empty
    /// input degenerates to the root key `/`; this constructor never
    /// fails.
    ///
    /// ```
    /// use strata_types::Key;
    ///
    /// assert_eq!(Key::new("foo/bar").as_str(), "/foo/bar");
    /// assert_eq!(Key::new("/foo//bar/").as_str(), "/foo/bar");
    /// assert_eq!(Key::new("").as_str(), "/");
    /// ```
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Self::root();
        }
        Self {
            value: format!("/{}", segments.join("/")),
        }
    }

    /// Build a key from a string that must already be canonical.
    ///
    /// Fails with [`StoreError::InvalidKey`] if the string lacks a leading
    /// `/`, ends with `/` (other than exactly `/`), or contains an empty
    /// segment. An empty string maps to the root key.
    pub fn from_raw(raw: &str) -> StoreResult<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        if !raw.starts_with('/')
            || (raw.len() > 1 && raw.ends_with('/'))
            || raw.contains("//")
        {
            return Err(StoreError::InvalidKey(raw.to_string()));
        }
        Ok(Self {
            value: raw.to_string(),
        })
    }

    /// The root key `/`.
    pub fn root() -> Self {
        Self { value: "/".into() }
    }

    /// A fresh key with a single random segment, for scratch data and
    /// test fixtures.
    pub fn random() -> Self {
        Self::new(&uuid::Uuid::new_v4().simple().to_string())
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns `true` if this is the root key `/`.
    pub fn is_root(&self) -> bool {
        self.value == "/"
    }

    /// The ordered path segments. The root key has none.
    pub fn segments(&self) -> Vec<&str> {
        self.value.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// The final path segment, or `None` for the root key.
    pub fn name(&self) -> Option<&str> {
        self.segments().last().copied()
    }

    /// Returns `true` if the key has exactly one segment.
    pub fn is_top_level(&self) -> bool {
        self.segments().len() == 1
    }

    /// The key with the last segment dropped.
    ///
    /// A single-segment key's parent is the root key; the root key is its
    /// own parent.
    pub fn parent(&self) -> Key {
        let segments = self.segments();
        if segments.len() <= 1 {
            return Self::root();
        }
        Self {
            value: format!("/{}", segments[..segments.len() - 1].join("/")),
        }
    }

    /// This key extended with all segments of `other`.
    ///
    /// ```
    /// use strata_types::Key;
    ///
    /// let ns = Key::new("/ns");
    /// assert_eq!(ns.child(&Key::new("/a/b")).as_str(), "/ns/a/b");
    /// ```
    pub fn child(&self, other: &Key) -> Key {
        if self.is_root() {
            return other.clone();
        }
        if other.is_root() {
            return self.clone();
        }
        Self {
            value: format!("{}{}", self.value, other.value),
        }
    }

    /// This key extended with one more (canonicalized) segment string.
    pub fn child_str(&self, segment: &str) -> Key {
        Key::new(&format!("{}/{}", self.value, segment))
    }

    /// Strict ancestor test: `/a` is an ancestor of `/a/b` but not of
    /// itself, and not of `/ab`.
    pub fn is_ancestor_of(&self, other: &Key) -> bool {
        if self.value == other.value {
            return false;
        }
        if self.is_root() {
            return true;
        }
        other.value.starts_with(&self.value)
            && other.value.as_bytes().get(self.value.len()) == Some(&b'/')
    }

    /// Strict descendant test, the inverse of [`Key::is_ancestor_of`].
    pub fn is_descendant_of(&self, other: &Key) -> bool {
        other.is_ancestor_of(self)
    }

    /// The key with its segments in reverse order.
    pub fn reverse(&self) -> Key {
        let mut segments = self.segments();
        segments.reverse();
        Key::new(&segments.join("/"))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        // Pairwise ordinal comparison of segment sequences; a sequence
        // that is a prefix of the other sorts first.
        self.segments().cmp(&other.segments())
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.value)
    }
}

impl FromStr for Key {
    type Err = StoreError;

    fn from_str(s: &str) -> StoreResult<Self> {
        Key::from_raw(s)
    }
}

impl TryFrom<String> for Key {
    type Error = StoreError;

    fn try_from(s: String) -> StoreResult<Self> {
        Key::from_raw(&s)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> String {
        key.value
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.value
    }
}
