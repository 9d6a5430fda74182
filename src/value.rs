//! Property value representation for OData entities

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A property value as stored in an entity proxy or used as a filter
/// literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    /// Null/empty value
    Null,
    /// String value
    String(String),
    /// Whole number
    Int(i64),
    /// Floating point (decimal, double)
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Date and time
    DateTime(DateTime<Utc>),
    /// Unique identifier
    Guid(Uuid),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as GUID
    pub fn as_guid(&self) -> Option<Uuid> {
        match self {
            Value::Guid(g) => Some(*g),
            _ => None,
        }
    }

    /// Render as an OData v2 URL literal, as used in `$filter` predicates
    /// and key-addressed resource paths.
    ///
    /// Strings are single-quoted with embedded quotes doubled; numbers and
    /// booleans render bare; dates and GUIDs get their typed literal
    /// wrapper.
    pub fn to_odata_literal(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => {
                format!("datetime'{}'", dt.format("%Y-%m-%dT%H:%M:%S"))
            }
            Value::Guid(g) => format!("guid'{}'", g),
        }
    }

    /// Convert to a JSON value for request payloads.
    ///
    /// OData v2 carries Int64/Decimal values as JSON strings and datetimes
    /// in the `/Date(ms)/` wire format; plain JSON numbers stay numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::json!(*i),
            Value::Float(f) => serde_json::json!(*f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::DateTime(dt) => {
                serde_json::Value::String(format!("/Date({})/", dt.timestamp_millis()))
            }
            Value::Guid(g) => serde_json::Value::String(g.to_string()),
        }
    }

    /// Parse from a JSON value with no schema hint.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => {
                if let Some(dt) = parse_odata_date(s) {
                    return Value::DateTime(dt);
                }
                Value::String(s.clone())
            }
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Value::String(json.to_string())
            }
        }
    }
}

/// Parse the OData v2 JSON date format `/Date(1658966400000)/`, with or
/// without the escaped leading slash some servers emit.
pub(crate) fn parse_odata_date(s: &str) -> Option<DateTime<Utc>> {
    let unescaped = s.replace("\\/", "/");
    let inner = unescaped.strip_prefix("/Date(")?.strip_suffix(")/")?;
    // Timezone offsets like "1658966400000+0200" are carried after the
    // millisecond count; the timestamp itself is already UTC.
    let millis_end = inner[1..]
        .find(['+', '-'])
        .map(|i| i + 1)
        .unwrap_or(inner.len());
    let millis: i64 = inner[..millis_end].parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "(null)"),
            Value::String(s) => write!(f, "{}", s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::Bool(b) => write!(f, "{}", b),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Guid(g) => write!(f, "{}", g),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
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

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Uuid> for Value {
    fn from(g: Uuid) -> Self {
        Value::Guid(g)
    }
}
