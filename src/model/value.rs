//! Domain values
//!
//! A [`Value`] is what a model hands to the manager for one property and
//! what the manager hands back after decoding a column.

use crate::model::Record;
use chrono::{DateTime, Utc};

/// A single property value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (SQL NULL)
    Null,

    /// Text value
    Text(String),

    /// Integer value
    Integer(i64),

    /// Floating point value
    Float(f64),

    /// Boolean value
    Boolean(bool),

    /// Point in time
    Timestamp(DateTime<Utc>),

    /// JSON document
    Json(serde_json::Value),

    /// List value (stored as a PostgreSQL array)
    List(Vec<Value>),

    /// Reference to an object persisted by another manager
    Reference(ObjectRef),
}

/// Reference to another persisted object.
///
/// Loading a model leaves references unresolved (only the id is known);
/// `TableManager::get_property` resolves them through the referenced
/// model's own manager and fills in `record`.
#[derive(Debug, Clone)]
pub struct ObjectRef {
    /// Class name of the referenced model
    pub class: String,
    /// Identifier of the referenced object
    pub id: String,
    /// The referenced object's values, once resolved
    pub record: Option<Box<Record>>,
}

impl ObjectRef {
    /// Reference known only by id
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: id.into(),
            record: None,
        }
    }

    /// Reference carrying the loaded object
    pub fn resolved(class: impl Into<String>, record: Record) -> Self {
        Self {
            class: class.into(),
            id: record.id().to_string(),
            record: Some(Box::new(record)),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.record.is_some()
    }
}

// Two references are equal when they point at the same row, whether or not
// either side has been resolved.
impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.class == other.class && self.id == other.id
    }
}

/// A JSON document counts as set unless it is `null`, `false`, zero, or an
/// empty string, array or object
fn json_is_truthy(v: &serde_json::Value) -> bool {
    match v {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}

impl Value {
    /// Check if this is a NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value counts as "set" when building INSERT/UPDATE
    /// statements. Null, empty text, zero, false, empty lists and empty or
    /// falsy JSON do not.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Text(s) => !s.is_empty(),
            Value::Integer(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Boolean(b) => *b,
            Value::Timestamp(_) => true,
            Value::Json(v) => json_is_truthy(v),
            Value::List(items) => !items.is_empty(),
            Value::Reference(r) => !r.id.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&ObjectRef> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Reference(r)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
