//! The Record type and its attribute-map codec.

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use kvfs_backend::{AttributeValue, Item};

use crate::{Error, Result};

pub(crate) const KEY: &str = "Key";
pub(crate) const CONTENTS: &str = "Contents";
pub(crate) const MODIFIED: &str = "Modified";
pub(crate) const SIZE: &str = "Size";
pub(crate) const IS_TERMINAL: &str = "IsTerminal";

/// One stored entry: either a file or a directory marker.
///
/// Markers are non-terminal records with no contents. They exist only so a
/// prefix such as `a/b` can be found and stat'ed after `a/b/c` is stored.
///
/// # Encoding
///
/// Zero values are omitted from the attribute map: empty contents, unset
/// `modified`, zero size and a false terminal flag are not written. Decoding
/// restores absent attributes to those same zero values, so a sparse marker
/// round-trips.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub contents: Bytes,
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
    pub is_terminal: bool,
}

impl Record {
    /// A terminal record holding `contents`.
    pub fn file(key: impl Into<String>, contents: Bytes, modified: DateTime<Utc>) -> Self {
        Record {
            key: key.into(),
            size: contents.len() as u64,
            contents,
            modified: Some(modified),
            is_terminal: true,
        }
    }

    /// A directory marker.
    pub fn marker(key: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Record {
            key: key.into(),
            contents: Bytes::new(),
            modified: Some(modified),
            size: 0,
            is_terminal: false,
        }
    }

    /// Encode into the backend attribute map.
    pub fn encode(&self) -> Item {
        let mut item = Item::new();
        item.insert(KEY.to_string(), AttributeValue::S(self.key.clone()));
        if !self.contents.is_empty() {
            item.insert(
                CONTENTS.to_string(),
                AttributeValue::B(self.contents.clone()),
            );
        }
        if let Some(modified) = self.modified {
            item.insert(
                MODIFIED.to_string(),
                AttributeValue::S(format_timestamp(modified)),
            );
        }
        if self.size > 0 {
            item.insert(SIZE.to_string(), AttributeValue::N(self.size.to_string()));
        }
        if self.is_terminal {
            item.insert(IS_TERMINAL.to_string(), AttributeValue::Bool(true));
        }
        item
    }

    /// Decode from a backend attribute map.
    ///
    /// Fails if `Key` is missing, if any known attribute has the wrong
    /// shape, or if `Modified` or `Size` do not parse.
    pub fn decode(item: &Item) -> Result<Self> {
        let key = key_of(item)?.to_string();

        let contents = match item.get(CONTENTS) {
            None => Bytes::new(),
            Some(value) => value
                .as_b()
                .cloned()
                .ok_or_else(|| wrong_shape(&key, CONTENTS, value, "B"))?,
        };

        let modified = match item.get(MODIFIED) {
            None => None,
            Some(value) => {
                let raw = value
                    .as_s()
                    .ok_or_else(|| wrong_shape(&key, MODIFIED, value, "S"))?;
                Some(
                    parse_timestamp(raw)
                        .map_err(|e| Error::decode(&key, format!("attribute {MODIFIED}: {e}")))?,
                )
            }
        };

        let size = match item.get(SIZE) {
            None => 0,
            Some(value) => value
                .as_n()
                .ok_or_else(|| wrong_shape(&key, SIZE, value, "N"))?
                .parse::<u64>()
                .map_err(|e| Error::decode(&key, format!("attribute {SIZE}: {e}")))?,
        };

        let is_terminal = match item.get(IS_TERMINAL) {
            None => false,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| wrong_shape(&key, IS_TERMINAL, value, "BOOL"))?,
        };

        Ok(Record {
            key,
            contents,
            modified,
            size,
            is_terminal,
        })
    }
}

/// Read just the `Key` attribute of an item.
pub(crate) fn key_of(item: &Item) -> Result<&str> {
    match item.get(KEY) {
        Some(value) => value.as_s().ok_or_else(|| wrong_shape("", KEY, value, "S")),
        None => Err(Error::decode("", format!("missing attribute {KEY}"))),
    }
}

pub(crate) fn format_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}

fn wrong_shape(key: &str, name: &str, found: &AttributeValue, expected: &str) -> Error {
    Error::decode(
        key,
        format!(
            "attribute {} has shape {}, expected {}",
            name,
            found.kind(),
            expected
        ),
    )
}
