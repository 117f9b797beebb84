//! Numeric value representation.
//!
//! `Number` keeps integers and floats distinguishable while letting callers
//! compare and convert uniformly.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Float(f64),
}

impl Number {
    /// Converts the number to `f64`.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Integer(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Integer(i) => Some(*i),
            Number::Float(_) => None,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Integer(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Integer(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Integer(value as i64)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::Integer(value as i64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_f64() {
        assert_eq!(Number::Integer(42).as_f64(), 42.0);
        assert_eq!(Number::Float(2.5).as_f64(), 2.5);
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Number::Integer(7).as_i64(), Some(7));
        assert_eq!(Number::Float(7.0).as_i64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Number::Integer(-3).to_string(), "-3");
        assert_eq!(Number::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_untagged_deserialization() {
        let n: Number = serde_json::from_str("42").unwrap();
        assert!(matches!(n, Number::Integer(42)));
        let n: Number = serde_json::from_str("4.25").unwrap();
        assert!(matches!(n, Number::Float(f) if (f - 4.25).abs() < f64::EPSILON));
    }
}
