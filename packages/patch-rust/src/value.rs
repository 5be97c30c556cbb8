//! Runtime value model for SCIM resources.
//!
//! A resource is an ordered mapping from attribute name to [`Value`]. Scalars
//! cover the JSON shapes a SCIM attribute can take on the wire; date-times,
//! binary blobs, and reference URIs are all carried as strings, and their
//! conformance against the declared kind is checked structurally via
//! [`Value::conforms_to`].
//!
//! `BTreeMap` keeps iteration deterministic, which matters for stable
//! serialization and for test assertions over whole resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::AttributeKind;

/// A SCIM resource: attribute name to value.
pub type Resource = BTreeMap<String, Value>;

/// Runtime value of a SCIM attribute.
///
/// `Complex` holds a single-valued complex attribute (or one element of a
/// multi-valued one); `Multi` holds the ordered element list of a
/// multi-valued attribute.
///
/// # Examples
///
/// ```
/// use scim_patch::Value;
///
/// let v = Value::from("Alice");
/// assert_eq!(v.as_str(), Some("Alice"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit JSON null.
    Null,
    /// Boolean attribute value.
    Bool(bool),
    /// Integer attribute value (signed 64-bit).
    Int(i64),
    /// Decimal attribute value (64-bit IEEE 754).
    Decimal(f64),
    /// String, dateTime, binary, or reference value.
    String(String),
    /// Ordered element list of a multi-valued attribute.
    Multi(Vec<Value>),
    /// Complex attribute value: sub-attribute name to value.
    Complex(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the string slice if this is a `String` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the nested map if this is a `Complex` value.
    #[must_use]
    pub fn as_complex(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Complex(map) => Some(map),
            _ => None,
        }
    }

    /// Mutable access to the nested map if this is a `Complex` value.
    pub fn as_complex_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Complex(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the element list if this is a `Multi` value.
    #[must_use]
    pub fn as_multi(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Multi(list) => Some(list),
            _ => None,
        }
    }

    /// Mutable access to the element list if this is a `Multi` value.
    pub fn as_multi_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Multi(list) => Some(list),
            _ => None,
        }
    }

    /// Whether this value is the explicit JSON null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Checks whether this value's runtime shape satisfies the declared
    /// attribute kind.
    ///
    /// `dateTime`, `binary`, and `reference` attributes carry string values
    /// on the wire, so any `String` conforms to those kinds. Integers are
    /// accepted where a decimal is declared, decimals are not accepted where
    /// an integer is declared.
    #[must_use]
    pub fn conforms_to(&self, kind: AttributeKind) -> bool {
        match kind {
            AttributeKind::Boolean => matches!(self, Value::Bool(_)),
            AttributeKind::Integer => matches!(self, Value::Int(_)),
            AttributeKind::Decimal => matches!(self, Value::Int(_) | Value::Decimal(_)),
            AttributeKind::String
            | AttributeKind::DateTime
            | AttributeKind::Binary
            | AttributeKind::Reference => matches!(self, Value::String(_)),
            AttributeKind::Complex => matches!(self, Value::Complex(_)),
        }
    }

    /// Short human-readable name of this value's runtime shape, for error
    /// detail messages.
    #[must_use]
    pub fn shape_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Multi(_) => "list",
            Value::Complex(_) => "complex",
        }
    }

    /// Converts a `serde_json::Value` into the engine's value model.
    ///
    /// Numbers become `Int` when they fit in `i64`, otherwise `Decimal`.
    #[must_use]
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Value::Decimal(n.as_f64().unwrap_or(0.0)), Value::Int),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Multi(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Complex(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts this value back into a `serde_json::Value`.
    ///
    /// Non-finite decimals degrade to JSON null, mirroring what
    /// `serde_json` itself does when serializing `f64`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Decimal(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Multi(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Complex(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
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

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
