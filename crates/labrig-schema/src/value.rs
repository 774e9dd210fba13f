//! Generic attribute values carried by layer definitions.
//!
//! Every declared field of a lab, service, or node is one of three
//! container kinds. The kind decides how the attribute resolver merges
//! values across an ancestor chain: sequences extend, mappings update,
//! scalars replace.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Container kind of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Sequence,
    Mapping,
    Scalar,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sequence => "sequence",
            Self::Mapping => "mapping",
            Self::Scalar => "scalar",
        };
        f.write_str(s)
    }
}

/// A field value tagged with its container kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Sequence(Vec<Value>),
    Mapping(BTreeMap<String, Value>),
    Scalar(Value),
}

impl AttrValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Sequence(_) => FieldKind::Sequence,
            Self::Mapping(_) => FieldKind::Mapping,
            Self::Scalar(_) => FieldKind::Scalar,
        }
    }

    /// The neutral starting value for a field that declares a kind but
    /// no default.
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Sequence => Self::Sequence(Vec::new()),
            FieldKind::Mapping => Self::Mapping(BTreeMap::new()),
            FieldKind::Scalar => Self::Scalar(Value::Null),
        }
    }

    /// Classify a JSON value: arrays are sequences, objects are mappings,
    /// everything else is a scalar.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::Sequence(items),
            Value::Object(map) => Self::Mapping(map.into_iter().collect()),
            other => Self::Scalar(other),
        }
    }

    pub fn from_toml(value: toml::Value) -> Self {
        Self::from_json(toml_to_json(value))
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Scalar string content, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().and_then(Value::as_str)
    }

    pub fn is_unset(&self) -> bool {
        match self {
            Self::Sequence(items) => items.is_empty(),
            Self::Mapping(map) => map.is_empty(),
            Self::Scalar(value) => value.is_null(),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Self::Sequence(items) => Value::Array(items),
            Self::Mapping(map) => Value::Object(map.into_iter().collect()),
            Self::Scalar(value) => value,
        }
    }
}

/// Lossless-enough conversion from TOML to JSON values; datetimes become
/// their string rendering.
pub fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Render a scalar JSON value the way it should appear in an environment
/// mapping: strings stay bare, other scalars use their JSON rendering.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_json_values() {
        assert_eq!(
            AttrValue::from_json(json!([1, 2])).kind(),
            FieldKind::Sequence
        );
        assert_eq!(
            AttrValue::from_json(json!({"a": 1})).kind(),
            FieldKind::Mapping
        );
        assert_eq!(AttrValue::from_json(json!("x")).kind(), FieldKind::Scalar);
        assert_eq!(AttrValue::from_json(json!(3)).kind(), FieldKind::Scalar);
    }

    #[test]
    fn empty_values_are_unset() {
        assert!(AttrValue::empty(FieldKind::Sequence).is_unset());
        assert!(AttrValue::empty(FieldKind::Mapping).is_unset());
        assert!(AttrValue::empty(FieldKind::Scalar).is_unset());
        assert!(!AttrValue::from_json(json!("x")).is_unset());
    }

    #[test]
    fn toml_conversion_preserves_structure() {
        let value: toml::Value = toml::from_str(
            r#"
a = [1, 2]
b = { c = true }
d = "text"
"#,
        )
        .unwrap();
        let json = toml_to_json(value);
        assert_eq!(json["a"], json!([1, 2]));
        assert_eq!(json["b"]["c"], json!(true));
        assert_eq!(json["d"], json!("text"));
    }

    #[test]
    fn scalar_strings_render_bare() {
        assert_eq!(scalar_to_string(&json!("plain")), "plain");
        assert_eq!(scalar_to_string(&json!(true)), "true");
        assert_eq!(scalar_to_string(&json!(6379)), "6379");
    }
}
