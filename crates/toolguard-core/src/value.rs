//! The argument tree value type.
//!
//! Tool-call arguments form a recursive sum type: null, bool, number,
//! string, array, or object. Operator semantics in the constraint engine
//! and the expression evaluator switch on this tag; coercive-mode
//! conversions are implemented explicitly here rather than leaning on a
//! host language's loose equality.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A node in the argument tree (or the result of an expression evaluation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Stringify for coercive-mode comparisons and expression concatenation.
    pub fn coerce_to_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
        }
    }

    /// Coercive-mode numeric conversion. Booleans become 0/1, numeric
    /// strings parse, everything else fails.
    pub fn coerce_to_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Coercive `==`-style equality: same-type compares directly; numeric
    /// strings compare numerically against numbers; other mismatches fall
    /// back to string comparison.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|bv| v.loose_eq(bv)))
            }
            // Cross-type coercion: number vs numeric-string/bool, and
            // stringified fallback for everything else.
            (Value::Number(_), _) | (_, Value::Number(_)) => {
                match (self.coerce_to_f64(), other.coerce_to_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => self.coerce_to_string() == other.coerce_to_string(),
                }
            }
            _ => self.coerce_to_string() == other.coerce_to_string(),
        }
    }

    pub fn from_json(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => {
                Value::Array(a.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(o) => Value::Object(
                o.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.coerce_to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
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

/// Format a float the way a user-facing comparison expects: integral
/// values print without a trailing `.0`.
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_eq_number_vs_numeric_string() {
        assert!(Value::Number(5.0).loose_eq(&Value::String("5".into())));
        assert!(!Value::Number(5.0).loose_eq(&Value::String("5.5".into())));
    }

    #[test]
    fn loose_eq_bool_vs_number() {
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(Value::Bool(false).loose_eq(&Value::Number(0.0)));
    }

    #[test]
    fn coerce_to_string_formats_integral_floats_without_decimal() {
        assert_eq!(Value::Number(5.0).coerce_to_string(), "5");
        assert_eq!(Value::Number(5.5).coerce_to_string(), "5.5");
    }

    #[test]
    fn from_json_round_trips_nested_structures() {
        let json = serde_json::json!({"a": [1, "two", null, true]});
        let value = Value::from_json(json);
        let obj = value.as_object().unwrap();
        let arr = obj.get("a").unwrap().as_array().unwrap();
        assert_eq!(arr[0], Value::Number(1.0));
        assert_eq!(arr[1], Value::String("two".into()));
        assert_eq!(arr[2], Value::Null);
        assert_eq!(arr[3], Value::Bool(true));
    }
}
