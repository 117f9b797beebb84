//! Unified value representation.
//!
//! `Value` is the single dynamic type flowing through the interpreter, the
//! function table, and component operations: primitives (null, bool, number,
//! string) plus structured data (array, object).

use crate::types::Number;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A unified value type for scripts and component operations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value (integer or float).
    Number(Number),
    /// String value.
    String(String),
    /// Array of values.
    Array(Vec<Value>),
    /// Key-value map.
    Object(HashMap<String, Value>),
}

/// The kind of a stored variable.
///
/// `Structured` covers arrays, objects, and null: the language treats all of
/// them as one self-describing tree type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableKind {
    Number,
    String,
    Boolean,
    Structured,
}

impl VariableKind {
    /// Determines the kind of a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Number(_) => VariableKind::Number,
            Value::String(_) => VariableKind::String,
            Value::Bool(_) => VariableKind::Boolean,
            Value::Null | Value::Array(_) | Value::Object(_) => VariableKind::Structured,
        }
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariableKind::Number => "number",
            VariableKind::String => "string",
            VariableKind::Boolean => "boolean",
            VariableKind::Structured => "structured",
        };
        write!(f, "{name}")
    }
}

impl Value {
    /// Checks if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the kind used for variable-store type checking.
    pub fn kind(&self) -> VariableKind {
        VariableKind::of(self)
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the value as a number.
    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Attempts to get the value as an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|n| n.as_i64())
    }

    /// Attempts to get the value as a non-negative integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self.as_i64() {
            Some(i) if i >= 0 => Some(i as u64),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get the value as an array reference.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Attempts to get the value as an object reference.
    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Converts the value to a `serde_json::Value`.
    ///
    /// Non-finite floats become JSON null, matching serde_json's own policy.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(Number::Integer(i)) => serde_json::Value::from(*i),
            Value::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Object(o) => serde_json::Value::Object(
                o.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(arr) => {
                write!(f, "[")?;
                let mut first = true;
                for v in arr {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                    first = false;
                }
                write!(f, "]")
            }
            Value::Object(obj) => {
                write!(f, "{{")?;
                let mut first = true;
                for (k, v) in obj {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{k}\": {v}")?;
                    first = false;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Number(Number::Integer(i))
                } else {
                    Value::Number(Number::Float(n.as_f64().unwrap_or(0.0)))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(o) => {
                Value::Object(o.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(Number::Integer(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(Number::Float(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(value: HashMap<String, Value>) -> Self {
        Value::Object(value)
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}
