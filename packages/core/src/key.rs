//! Slash-separated storage keys.

use std::fmt;

use crate::{Error, Result};

/// A validated storage key such as `certificates/acme/example.com.crt`.
///
/// Components are separated by `/`. There is no leading or trailing slash
/// and no empty component. Components are otherwise opaque: dots, dashes and
/// any other characters are allowed.
///
/// A key `a` is a prefix of `a/b` but not of `ab/c`; prefixes are matched
/// per component.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Key {
    raw: String,
}

impl Key {
    /// Parse and validate a key.
    ///
    /// ```rust
    /// use kvfs_core::Key;
    ///
    /// let key = Key::parse("a/b/c").unwrap();
    /// assert_eq!(key.ancestors().collect::<Vec<_>>(), vec!["a", "a/b"]);
    ///
    /// assert!(Key::parse("/a").is_err());
    /// assert!(Key::parse("a//b").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidKey {
                key: s.to_string(),
                message: "empty key".to_string(),
            });
        }

        if let Some(position) = s.split('/').position(str::is_empty) {
            return Err(Error::InvalidKey {
                key: s.to_string(),
                message: format!("empty component at position {}", position),
            });
        }

        Ok(Key { raw: s.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Iterate over components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.raw.split('/')
    }

    /// Get the number of components.
    pub fn len(&self) -> usize {
        self.components().count()
    }

    /// Always false: a valid key has at least one component.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Every proper ancestor, shortest first: `a`, `a/b` for `a/b/c`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.raw
            .match_indices('/')
            .map(move |(i, _)| &self.raw[..i])
    }

    /// The scan prefix selecting everything beneath this key: `key + "/"`.
    pub fn dir_prefix(&self) -> String {
        format!("{}/", self.raw)
    }

    /// Whether `other` sits strictly beneath this key, at any depth.
    pub fn is_ancestor_of(&self, other: &str) -> bool {
        other
            .strip_prefix(self.raw.as_str())
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'))
    }

    /// Whether `other` is an immediate child: `a/b` for `a`, but not `a/b/c`.
    pub fn is_parent_of(&self, other: &str) -> bool {
        self.is_ancestor_of(other) && !other[self.raw.len() + 1..].contains('/')
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}
