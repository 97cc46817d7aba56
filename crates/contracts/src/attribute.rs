//! Attributes, resources and instrumentation scopes.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

/// Attribute value
///
/// Serialized in the OTLP JSON shape (`{"stringValue": "..."}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "intValue")]
    I64(i64),
    #[serde(rename = "doubleValue")]
    F64(f64),
    #[serde(rename = "stringValue")]
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Key/value attribute pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Canonical form of an attribute set: sorted by key, last write wins.
pub fn normalize_attributes(attributes: impl IntoIterator<Item = KeyValue>) -> Vec<KeyValue> {
    let mut out: Vec<KeyValue> = Vec::new();
    for kv in attributes {
        match out.iter_mut().find(|existing| existing.key == kv.key) {
            Some(existing) => existing.value = kv.value,
            None => out.push(kv),
        }
    }
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}

/// Stable string key for an attribute set, used to group equal sets.
///
/// Callers pass normalized attributes. Keys and string values are quoted and
/// escaped and every value carries its type, so distinct sets never share a
/// key.
pub fn attribute_set_key(attributes: &[KeyValue]) -> String {
    let mut key = String::new();
    for kv in attributes {
        // writing into a String cannot fail
        let _ = write!(key, "{:?}={:?},", kv.key, kv.value);
    }
    key
}

/// Entity producing telemetry (service, host, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub attributes: Vec<KeyValue>,
}

impl Resource {
    /// Create a resource from attributes (normalized)
    pub fn new(attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        Self {
            attributes: normalize_attributes(attributes),
        }
    }

    /// Resource with no attributes
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge two resources; `other` wins on conflicting keys
    pub fn merge(&self, other: &Resource) -> Resource {
        Resource::new(
            self.attributes
                .iter()
                .chain(other.attributes.iter())
                .cloned(),
        )
    }

    /// Key identifying equal resources
    pub fn equivalence_key(&self) -> String {
        attribute_set_key(&self.attributes)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Library that produced the telemetry
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: Option<String>,
}

impl InstrumentationScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let attrs = normalize_attributes(vec![
            KeyValue::new("b", 1i64),
            KeyValue::new("a", "x"),
            KeyValue::new("b", 2i64),
        ]);
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[0].key, "a");
        assert_eq!(attrs[1].value, Value::I64(2));
    }

    #[test]
    fn test_resource_merge_prefers_other() {
        let base = Resource::new(vec![
            KeyValue::new("service.name", "a"),
            KeyValue::new("host", "h1"),
        ]);
        let other = Resource::new(vec![KeyValue::new("service.name", "b")]);
        let merged = base.merge(&other);
        assert_eq!(
            merged.equivalence_key(),
            r#""host"=String("h1"),"service.name"=String("b"),"#
        );
    }

    #[test]
    fn test_set_key_keeps_value_types_apart() {
        let int = attribute_set_key(&[KeyValue::new("code", 200i64)]);
        let string = attribute_set_key(&[KeyValue::new("code", "200")]);
        assert_ne!(int, string);
    }

    #[test]
    fn test_set_key_escapes_separators() {
        let one = attribute_set_key(&[KeyValue::new("a", "1,b=2")]);
        let two = attribute_set_key(&normalize_attributes(vec![
            KeyValue::new("a", "1"),
            KeyValue::new("b", "2"),
        ]));
        assert_ne!(one, two);
    }

    #[test]
    fn test_value_serializes_in_otlp_shape() {
        let json = serde_json::to_string(&KeyValue::new("k", "v")).unwrap();
        assert_eq!(json, r#"{"key":"k","value":{"stringValue":"v"}}"#);
    }
}
