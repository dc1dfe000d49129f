//! Tagged JSON codec for collection types that are not JSON-native.
//!
//! Checkpoint and pending-write blobs must round-trip exactly through text,
//! including keyed maps with non-string keys, unique-value sets, and raw byte
//! buffers. [`RichValue`] is a JSON superset covering those three kinds; the
//! codec encodes them as tagged wrapper objects
//! (`{"__type": "Map" | "Set" | "Bytes", "value": …}`) so that
//! `parse(stringify(x)) == x` holds recursively.
//!
//! Plain objects that happen to carry a `__type` key with an unknown tag are
//! left untouched; only the three known tags are interpreted.
//!
//! # Examples
//!
//! ```
//! use trendloom::serde_ext::{parse, stringify, RichValue};
//!
//! let value = RichValue::Set(vec![
//!     RichValue::Number(1.into()),
//!     RichValue::Text("two".into()),
//! ]);
//! let text = stringify(&value).unwrap();
//! assert_eq!(parse(&text).unwrap(), value);
//! ```

use miette::Diagnostic;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use thiserror::Error;

const TYPE_TAG: &str = "__type";
const VALUE_FIELD: &str = "value";

/// Errors produced by the tagged codec.
#[derive(Debug, Error, Diagnostic)]
pub enum SerdeExtError {
    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(trendloom::serde_ext::json),
        help("The input is not valid JSON text.")
    )]
    Json {
        #[from]
        source: serde_json::Error,
    },

    #[error("malformed tagged wrapper: {what}")]
    #[diagnostic(
        code(trendloom::serde_ext::malformed_wrapper),
        help("Tagged wrappers must be {{\"__type\": tag, \"value\": …}} with a well-formed value.")
    )]
    MalformedWrapper { what: String },
}

/// JSON superset value used for checkpoint and pending-write blobs.
///
/// `Object` keys are kept in a `BTreeMap` so serialization output is stable
/// across runs. `Map` preserves entry order and allows arbitrary keys; `Set`
/// preserves insertion order of its (unique) members.
#[derive(Clone, Debug, PartialEq)]
pub enum RichValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<RichValue>),
    Object(BTreeMap<String, RichValue>),
    Map(Vec<(RichValue, RichValue)>),
    Set(Vec<RichValue>),
    Bytes(Vec<u8>),
}

impl RichValue {
    /// Encode into plain JSON, applying tagged wrappers for the extra kinds.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            RichValue::Null => Value::Null,
            RichValue::Bool(b) => Value::Bool(*b),
            RichValue::Number(n) => Value::Number(n.clone()),
            RichValue::Text(s) => Value::String(s.clone()),
            RichValue::List(items) => Value::Array(items.iter().map(RichValue::to_json).collect()),
            RichValue::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json());
                }
                Value::Object(out)
            }
            RichValue::Map(entries) => {
                let pairs: Vec<Value> = entries
                    .iter()
                    .map(|(k, v)| Value::Array(vec![k.to_json(), v.to_json()]))
                    .collect();
                json!({ TYPE_TAG: "Map", VALUE_FIELD: pairs })
            }
            RichValue::Set(members) => {
                let items: Vec<Value> = members.iter().map(RichValue::to_json).collect();
                json!({ TYPE_TAG: "Set", VALUE_FIELD: items })
            }
            RichValue::Bytes(bytes) => {
                json!({ TYPE_TAG: "Bytes", VALUE_FIELD: bytes })
            }
        }
    }

    /// Decode from plain JSON, interpreting known tagged wrappers.
    pub fn from_json(value: &Value) -> Result<Self, SerdeExtError> {
        match value {
            Value::Null => Ok(RichValue::Null),
            Value::Bool(b) => Ok(RichValue::Bool(*b)),
            Value::Number(n) => Ok(RichValue::Number(n.clone())),
            Value::String(s) => Ok(RichValue::Text(s.clone())),
            Value::Array(items) => Ok(RichValue::List(
                items
                    .iter()
                    .map(RichValue::from_json)
                    .collect::<Result<_, _>>()?,
            )),
            Value::Object(map) => match map.get(TYPE_TAG).and_then(Value::as_str) {
                Some(tag @ ("Map" | "Set" | "Bytes")) => Self::from_wrapper(tag, map),
                _ => {
                    let mut out = BTreeMap::new();
                    for (k, v) in map {
                        out.insert(k.clone(), RichValue::from_json(v)?);
                    }
                    Ok(RichValue::Object(out))
                }
            },
        }
    }

    fn from_wrapper(tag: &str, map: &Map<String, Value>) -> Result<Self, SerdeExtError> {
        let payload = map
            .get(VALUE_FIELD)
            .ok_or_else(|| SerdeExtError::MalformedWrapper {
                what: format!("{tag} wrapper missing \"{VALUE_FIELD}\" field"),
            })?;
        let items = payload
            .as_array()
            .ok_or_else(|| SerdeExtError::MalformedWrapper {
                what: format!("{tag} wrapper value must be an array"),
            })?;
        match tag {
            "Map" => {
                let mut entries = Vec::with_capacity(items.len());
                for entry in items {
                    let pair =
                        entry
                            .as_array()
                            .filter(|p| p.len() == 2)
                            .ok_or_else(|| SerdeExtError::MalformedWrapper {
                                what: "Map entries must be [key, value] pairs".into(),
                            })?;
                    entries.push((RichValue::from_json(&pair[0])?, RichValue::from_json(&pair[1])?));
                }
                Ok(RichValue::Map(entries))
            }
            "Set" => Ok(RichValue::Set(
                items
                    .iter()
                    .map(RichValue::from_json)
                    .collect::<Result<_, _>>()?,
            )),
            "Bytes" => {
                let mut bytes = Vec::with_capacity(items.len());
                for item in items {
                    let byte = item
                        .as_u64()
                        .filter(|b| *b <= u8::MAX as u64)
                        .ok_or_else(|| SerdeExtError::MalformedWrapper {
                            what: "Bytes wrapper members must be integers in 0..=255".into(),
                        })?;
                    bytes.push(byte as u8);
                }
                Ok(RichValue::Bytes(bytes))
            }
            _ => unreachable!("caller matched the tag"),
        }
    }
}

/// Serialize a [`RichValue`] into stable JSON text.
pub fn stringify(value: &RichValue) -> Result<String, SerdeExtError> {
    Ok(serde_json::to_string(&value.to_json())?)
}

/// Parse JSON text produced by [`stringify`] back into a [`RichValue`].
pub fn parse(text: &str) -> Result<RichValue, SerdeExtError> {
    let value: Value = serde_json::from_str(text)?;
    RichValue::from_json(&value)
}

/// Encode an arbitrary serde value into blob text via the tagged codec.
///
/// Used for checkpoint envelopes and pending-write values so every persisted
/// blob travels through one codec.
pub fn encode_json<T: serde::Serialize>(value: &T) -> Result<String, SerdeExtError> {
    let json = serde_json::to_value(value)?;
    stringify(&RichValue::from_json(&json)?)
}

/// Decode blob text produced by [`encode_json`].
pub fn decode_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, SerdeExtError> {
    let rich = parse(text)?;
    Ok(serde_json::from_value(rich.to_json())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_wrappers_round_trip() {
        let value = RichValue::Object(BTreeMap::from([
            (
                "versions".to_string(),
                RichValue::Map(vec![
                    (
                        RichValue::Text("messages".into()),
                        RichValue::Number(3.into()),
                    ),
                    (RichValue::Number(7.into()), RichValue::Bool(true)),
                ]),
            ),
            (
                "seen".to_string(),
                RichValue::Set(vec![
                    RichValue::Text("a".into()),
                    RichValue::Bytes(vec![0, 127, 255]),
                ]),
            ),
        ]));
        let text = stringify(&value).unwrap();
        assert_eq!(parse(&text).unwrap(), value);
    }

    #[test]
    fn unknown_type_tag_stays_plain_object() {
        let text = r#"{"__type":"Widget","value":[1,2]}"#;
        let parsed = parse(text).unwrap();
        match parsed {
            RichValue::Object(map) => {
                assert_eq!(map.get(TYPE_TAG), Some(&RichValue::Text("Widget".into())));
            }
            other => panic!("expected plain object, got {other:?}"),
        }
    }

    #[test]
    fn bytes_reject_out_of_range() {
        let text = r#"{"__type":"Bytes","value":[256]}"#;
        assert!(matches!(
            parse(text),
            Err(SerdeExtError::MalformedWrapper { .. })
        ));
    }

    #[test]
    fn stringify_is_stable_for_objects() {
        let a = RichValue::Object(BTreeMap::from([
            ("b".to_string(), RichValue::Number(2.into())),
            ("a".to_string(), RichValue::Number(1.into())),
        ]));
        assert_eq!(stringify(&a).unwrap(), r#"{"a":1,"b":2}"#);
    }
}
