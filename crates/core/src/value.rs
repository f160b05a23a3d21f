//! Typed parameter values passed from parsed actions to tools.
//!
//! LLM output is text; tools want typed arguments. [`ParamValue`] is the
//! tagged union in between, so coercion happens once (in the action builder)
//! and every consumer sees an explicit type.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named tool parameters. Ordered so prompts and logs are deterministic.
pub type Parameters = BTreeMap<String, ParamValue>;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    String(String),
    Array(Vec<ParamValue>),
    Object(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name used in tool catalogs and diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "number",
            Self::DateTime(_) => "datetime",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::from(self.clone())
    }
}

impl fmt::Display for ParamValue {
    /// Strings render bare; everything else renders as compact JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<serde_json::Value> for ParamValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<ParamValue> for serde_json::Value {
    fn from(value: ParamValue) -> Self {
        use serde_json::Value;
        match value {
            ParamValue::Null => Value::Null,
            ParamValue::Bool(b) => Value::Bool(b),
            ParamValue::Int(i) => Value::from(i),
            ParamValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ParamValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            ParamValue::String(s) => Value::String(s),
            ParamValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ParamValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

/// Convert a parameter map into a JSON object.
pub fn parameters_to_json(params: &Parameters) -> serde_json::Value {
    serde_json::Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_integer_type() {
        assert_eq!(ParamValue::from(json!(42)), ParamValue::Int(42));
        assert_eq!(ParamValue::from(json!(2.5)), ParamValue::Float(2.5));
    }

    #[test]
    fn nested_objects_convert() {
        let value = ParamValue::from(json!({"a": [1, "x"], "b": null}));
        let ParamValue::Object(map) = &value else {
            panic!("expected object");
        };
        assert_eq!(
            map["a"],
            ParamValue::Array(vec![ParamValue::Int(1), ParamValue::String("x".into())])
        );
        assert!(map["b"].is_null());
        assert_eq!(value.to_json(), json!({"a": [1, "x"], "b": null}));
    }

    #[test]
    fn display_strings_bare() {
        assert_eq!(ParamValue::from("rust").to_string(), "rust");
        assert_eq!(ParamValue::Int(7).to_string(), "7");
        assert_eq!(ParamValue::Bool(true).to_string(), "true");
    }

    #[test]
    fn serde_goes_through_json_shape() {
        let mut params = Parameters::new();
        params.insert("query".into(), "weather".into());
        params.insert("limit".into(), ParamValue::Int(3));
        let text = serde_json::to_string(&params).unwrap();
        assert_eq!(text, r#"{"limit":3,"query":"weather"}"#);
        let back: Parameters = serde_json::from_str(&text).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(ParamValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ParamValue::from("3").as_f64(), None);
    }
}
