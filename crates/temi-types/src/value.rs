//! Loosely-typed transport values.
//!
//! Command arguments arrive, and replies and event payloads leave, as a
//! [`Value`].  The shape mirrors what a message channel can carry: a
//! primitive, a list, a string-keyed map, or nothing at all.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value carried over the bridge transport.
///
/// Serialises untagged, so `Value::Int(3)` is the JSON number `3` and
/// `Value::Null` is `null`.  Integral JSON numbers decode as [`Value::Int`];
/// everything else numeric decodes as [`Value::Double`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in coercion error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view that accepts both integers and doubles.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `key` when this value is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_json_numbers_decode_as_int() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v, Value::Int(42));

        let v: Value = serde_json::from_str("0.25").unwrap();
        assert_eq!(v, Value::Double(0.25));
    }

    #[test]
    fn null_and_nested_shapes_decode() {
        let v: Value = serde_json::from_str(r#"[null, true, "x", {"k": [1, 2.5]}]"#).unwrap();
        let items = v.as_list().expect("list");
        assert!(items[0].is_null());
        assert_eq!(items[1].as_bool(), Some(true));
        assert_eq!(items[2].as_str(), Some("x"));
        let inner = items[3].get("k").and_then(Value::as_list).expect("inner list");
        assert_eq!(inner[0], Value::Int(1));
        assert_eq!(inner[1], Value::Double(2.5));
    }

    #[test]
    fn null_serialises_as_json_null() {
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::from(None::<String>)).unwrap(), "null");
    }

    #[test]
    fn as_f64_accepts_ints_and_doubles() {
        assert_eq!(Value::Int(1).as_f64(), Some(1.0));
        assert_eq!(Value::Double(-0.5).as_f64(), Some(-0.5));
        assert_eq!(Value::from("1").as_f64(), None);
    }

    #[test]
    fn kind_names_every_variant() {
        assert_eq!(Value::Null.kind(), "null");
        assert_eq!(Value::from(vec![1, 2]).kind(), "list");
        assert_eq!(Value::Map(BTreeMap::new()).kind(), "map");
    }
}
