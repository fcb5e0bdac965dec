//! The closed policy value variant.
//!
//! Condition and mutation values are a closed tagged variant rather than an
//! open dynamic type, so equality and membership semantics stay well-defined:
//! numbers compare numerically, everything else by string form.

use serde::{Deserialize, Serialize};

/// A value appearing in a condition (`equals`, `in`, ...) or a mutation.
///
/// Untagged on the wire: `"high"`, `42`, `true`, `["a", "b"]`, and `null` all
/// deserialize to the matching variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent / null.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Numeric value. All document numbers are carried as f64; comparisons
    /// are numeric, so `5` and `5.0` are equal.
    Number(f64),
    /// UTF-8 string.
    String(String),
    /// Ordered list of values (used by `in`/`notIn` and `add` mutations).
    List(Vec<Value>),
}

impl Value {
    /// Returns the canonical string form used for non-numeric equality.
    ///
    /// Lists have no string form; they compare structurally instead.
    pub fn string_form(&self) -> Option<String> {
        match self {
            Self::Null => Some("null".to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::String(s) => Some(s.clone()),
            Self::List(_) => None,
        }
    }

    /// Returns the numeric interpretation, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Structural equality against a resolved JSON value.
    ///
    /// Numbers (on either side) compare numerically; lists compare
    /// element-wise; everything else compares by canonical string form.
    pub fn loosely_equals(&self, json: &serde_json::Value) -> bool {
        match (self, json) {
            (Self::Number(a), serde_json::Value::Number(b)) => {
                b.as_f64().is_some_and(|b| (a - b).abs() < f64::EPSILON)
            }
            (Self::List(items), serde_json::Value::Array(other)) => {
                items.len() == other.len()
                    && items.iter().zip(other).all(|(v, j)| v.loosely_equals(j))
            }
            (Self::Null, serde_json::Value::Null) => true,
            _ => match (self.string_form(), json_string_form(json)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Membership test for `in`/`notIn`: does any element of this list
    /// loosely equal `json`? Non-list values degrade to a single-element
    /// comparison.
    pub fn contains_json(&self, json: &serde_json::Value) -> bool {
        match self {
            Self::List(items) => items.iter().any(|v| v.loosely_equals(json)),
            other => other.loosely_equals(json),
        }
    }

    /// Converts to the `serde_json` representation (used when a mutation
    /// writes this value into a resource).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Canonical string form of a resolved JSON scalar.
///
/// Objects have no string form (they never equal a policy value); arrays are
/// handled structurally before this is consulted.
pub fn json_string_form(json: &serde_json::Value) -> Option<String> {
    match json {
        serde_json::Value::Null => Some("null".to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => n.as_f64().map(format_number),
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

/// Formats a number without a trailing `.0` so `5`, `5.0`, and `"5"` share a
/// string form.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        return format!("{}", n as i64);
    }
    format!("{n}")
}
