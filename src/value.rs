//! Dynamic attribute values and bind-type tags
//!
//! Entities are open-ended property bags, so attribute values are carried in
//! a `Value` enum rather than concrete column types. Values convert to and
//! from JSON for the serialize/unserialize round trip.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Bind-type tags telling the connection how to encode a bound parameter.
///
/// These are part of the connection capability contract and must not be
/// renumbered.
pub mod bind {
    pub const PARAM_NULL: u32 = 0;
    pub const PARAM_INT: u32 = 1;
    pub const PARAM_STR: u32 = 2;
    pub const PARAM_BOOL: u32 = 5;
    pub const PARAM_DECIMAL: u32 = 32;
    /// Sentinel: bind the value untyped, the connection must not coerce it.
    pub const SKIP: u32 = 1024;
}

/// Dynamically-typed scalar value for entity attributes and query binds
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Emptiness test used by the existence check and the not-null validator:
    /// null, false, zero and the strings "" / "0" are all empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::String(s) => s.is_empty() || s == "0",
            _ => false,
        }
    }

    /// Numeric-string test applied to attributes declared numeric
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        }
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number(serde_json::Number::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            Value::Json(j) => j.clone(),
        }
    }

    /// Create a value from a JSON value
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            JsonValue::String(s) => {
                if let Ok(uuid) = Uuid::parse_str(&s) {
                    Value::Uuid(uuid)
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                    Value::DateTime(dt.with_timezone(&Utc))
                } else {
                    Value::String(s)
                }
            }
            JsonValue::Array(_) | JsonValue::Object(_) => Value::Json(json),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
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

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::Json(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emptiness() {
        assert!(Value::Null.is_empty());
        assert!(Value::Bool(false).is_empty());
        assert!(Value::Int(0).is_empty());
        assert!(Value::String(String::new()).is_empty());
        assert!(Value::String("0".to_string()).is_empty());
        assert!(!Value::Int(1952).is_empty());
        assert!(!Value::String("Astro Boy".to_string()).is_empty());
    }

    #[test]
    fn test_numeric_strings() {
        assert!(Value::Int(7).is_numeric());
        assert!(Value::String("3.14".to_string()).is_numeric());
        assert!(Value::String(" 42 ".to_string()).is_numeric());
        assert!(!Value::String("mechanical".to_string()).is_numeric());
        assert!(!Value::Null.is_numeric());
    }

    #[test]
    fn test_json_round_trip() {
        let values = vec![
            Value::Int(1),
            Value::String("Astro Boy".to_string()),
            Value::Float(0.5),
            Value::Bool(true),
            Value::Null,
        ];
        for value in values {
            assert_eq!(Value::from_json(value.to_json()), value);
        }
    }

    #[test]
    fn test_uuid_string_recognized() {
        let uuid = Uuid::new_v4();
        let restored = Value::from_json(JsonValue::String(uuid.to_string()));
        assert_eq!(restored, Value::Uuid(uuid));
    }

    #[test]
    fn test_skip_sentinel_is_stable() {
        assert_eq!(bind::SKIP, 1024);
    }
}
