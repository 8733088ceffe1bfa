//! The untyped structured value every configuration layer is expressed in.
//!
//! [`ConfigValue`] mirrors JSON: null, boolean, number, string, list and
//! mapping. Mappings are kept in a [`BTreeMap`], so serializing the same
//! value always yields the same bytes regardless of the order in which
//! keys were inserted or merged.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// Mapping of string key to [`ConfigValue`].
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A structured configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigValue {
    /// Explicit null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer or floating point number.
    Number(Number),
    /// UTF-8 string.
    String(String),
    /// Ordered list.
    List(Vec<ConfigValue>),
    /// String-keyed mapping.
    Map(ConfigMap),
}

/// The variant of a [`ConfigValue`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    List,
    Map,
}

impl ValueKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "mapping",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigValue {
    /// Creates an empty mapping.
    pub fn empty_map() -> Self {
        Self::Map(ConfigMap::new())
    }

    /// Returns the variant of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Looks up a field of a mapping. Returns `None` for non-mappings.
    pub fn get(&self, field: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|map| map.get(field))
    }

    /// Follows a dotted path (`"payments.upi.enabled"`) through nested mappings.
    pub fn pointer(&self, path: &str) -> Option<&ConfigValue> {
        if path.is_empty() {
            return Some(self);
        }
        path.split('.')
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Parses a JSON document.
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Parses a JSON document from a string.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Serializes to compact JSON bytes. Mapping keys are emitted in sorted order.
    pub fn to_json_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Serializes to indented JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// =============================================================================
// serde
// =============================================================================

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => n.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ConfigValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(b),
            ConfigValue::Number(n) => Value::Number(n),
            ConfigValue::String(s) => Value::String(s),
            ConfigValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ConfigValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for ConfigValue {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

/// Non-finite floats have no JSON representation and become `Null`.
impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Null, Self::Number)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(items: Vec<ConfigValue>) -> Self {
        Self::List(items)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(map: ConfigMap) -> Self {
        Self::Map(map)
    }
}

impl<K: Into<String>> FromIterator<(K, ConfigValue)> for ConfigValue {
    fn from_iter<I: IntoIterator<Item = (K, ConfigValue)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_preserves_structure() {
        let source = json!({
            "enabled": true,
            "ratio": 0.5,
            "cities": ["bangalore", "delhi"],
            "limits": {"max": 10, "label": null}
        });
        let value = ConfigValue::from(source.clone());

        assert_eq!(value.get("enabled").and_then(ConfigValue::as_bool), Some(true));
        assert_eq!(value.get("ratio").and_then(ConfigValue::as_f64), Some(0.5));
        assert_eq!(value.pointer("limits.max").and_then(ConfigValue::as_i64), Some(10));
        assert!(value.pointer("limits.label").is_some_and(ConfigValue::is_null));
        assert_eq!(Value::from(value), source);
    }

    #[test]
    fn test_serialization_is_key_sorted() {
        let mut forward = ConfigMap::new();
        forward.insert("zeta".into(), 1i64.into());
        forward.insert("alpha".into(), 2i64.into());

        let backward: ConfigValue = [("alpha", ConfigValue::from(2i64)), ("zeta", 1i64.into())]
            .into_iter()
            .collect();

        let a = ConfigValue::Map(forward).to_json_vec().unwrap();
        let b = backward.to_json_vec().unwrap();
        assert_eq!(a, b);
        assert_eq!(String::from_utf8(a).unwrap(), r#"{"alpha":2,"zeta":1}"#);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        assert!(ConfigValue::from_json_slice(b"{not json").is_err());
        assert_eq!(
            ConfigValue::from_json_str("[1, 2]").unwrap().kind(),
            ValueKind::List
        );
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert!(ConfigValue::from(f64::NAN).is_null());
    }

    #[test]
    fn test_display_is_compact_json() {
        let value = ConfigValue::from(json!({"b": [1, "x"], "a": null}));
        assert_eq!(value.to_string(), r#"{"a":null,"b":[1,"x"]}"#);
    }
}
