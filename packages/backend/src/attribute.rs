//! The attribute model stored by every backend.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A stored item: attribute name to typed attribute value.
///
/// Items are schemaless. The backend never interprets attribute names; the
/// key an item is stored under is passed separately to [`KvBackend`] calls.
///
/// [`KvBackend`]: crate::KvBackend
pub type Item = BTreeMap<String, AttributeValue>;

/// A single typed attribute value.
///
/// Serializes as a single-key tagged object, e.g. `{"S": "text"}` or
/// `{"B": "aGVsbG8="}` (bytes as standard base64).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// UTF-8 string.
    S(String),

    /// Number, kept in its decimal text form.
    N(String),

    /// Opaque bytes.
    B(#[serde(with = "base64_bytes")] Bytes),

    /// Boolean.
    #[serde(rename = "BOOL")]
    Bool(bool),
}

impl AttributeValue {
    /// Name of the attribute shape, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
        }
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_b(&self) -> Option<&Bytes> {
        match self {
            AttributeValue::B(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_match_shape() {
        let s = AttributeValue::S("x".to_string());
        assert_eq!(s.as_s(), Some("x"));
        assert_eq!(s.as_n(), None);
        assert_eq!(s.kind(), "S");

        let b = AttributeValue::B(Bytes::from_static(b"\x00\x01"));
        assert_eq!(b.as_b(), Some(&Bytes::from_static(b"\x00\x01")));
        assert_eq!(b.as_bool(), None);

        assert_eq!(AttributeValue::Bool(true).as_bool(), Some(true));
        assert_eq!(AttributeValue::N("42".to_string()).kind(), "N");
    }

    #[test]
    fn json_form_is_tagged() {
        let mut item = Item::new();
        item.insert("Key".to_string(), AttributeValue::S("a/b".to_string()));
        item.insert(
            "Contents".to_string(),
            AttributeValue::B(Bytes::from_static(b"hello")),
        );
        item.insert("IsTerminal".to_string(), AttributeValue::Bool(true));

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["Key"], serde_json::json!({"S": "a/b"}));
        assert_eq!(json["Contents"], serde_json::json!({"B": "aGVsbG8="}));
        assert_eq!(json["IsTerminal"], serde_json::json!({"BOOL": true}));

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let result: Result<AttributeValue, _> =
            serde_json::from_value(serde_json::json!({"B": "not base64!"}));
        assert!(result.is_err());
    }
}
