//! Persisted model definitions
//!
//! A model is an application type that knows its [`ModelSchema`], exposes
//! its property values, and can be built from a [`Record`] loaded out of
//! the database.

pub mod schema;
pub mod value;

pub use schema::{DataType, ModelSchema, Property};
pub use value::{ObjectRef, Value};

use crate::error::{ManagerError, ManagerResult};
use std::collections::BTreeMap;

/// A type persisted by a `TableManager`.
///
/// Objects are built in one go by [`Model::from_record`], so there is no
/// half-populated state to guard while a row is being loaded.
///
/// # Example
///
/// ```
/// use std::sync::LazyLock;
/// use pgmanager::model::{Model, ModelSchema, Property, Record, Value};
/// use pgmanager::error::ManagerResult;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Person {
///     id: Option<String>,
///     name: String,
///     age: i64,
/// }
///
/// static PERSON: LazyLock<ModelSchema> = LazyLock::new(|| {
///     ModelSchema::new("Person")
///         .property(Property::text("name"))
///         .property(Property::integer("age"))
/// });
///
/// impl Model for Person {
///     fn schema() -> &'static ModelSchema {
///         &PERSON
///     }
///     fn id(&self) -> Option<&str> {
///         self.id.as_deref()
///     }
///     fn assign_id(&mut self, id: String) {
///         self.id = Some(id);
///     }
///     fn value(&self, property: &str) -> Value {
///         match property {
///             "name" => self.name.clone().into(),
///             "age" => self.age.into(),
///             _ => Value::Null,
///         }
///     }
///     fn from_record(mut record: Record) -> ManagerResult<Self> {
///         Ok(Self {
///             name: record.take_text("name").unwrap_or_default(),
///             age: record.take_integer("age").unwrap_or_default(),
///             id: Some(record.into_id()),
///         })
///     }
/// }
/// ```
pub trait Model: Sized + Send + Sync + 'static {
    /// Schema shared by every instance of the type
    fn schema() -> &'static ModelSchema;

    /// Identifier, `None` until the object is first saved
    fn id(&self) -> Option<&str>;

    /// Set the identifier. Called once, by `save_object`, on objects
    /// without one.
    fn assign_id(&mut self, id: String);

    /// Current value of a property as it should be stored
    fn value(&self, property: &str) -> Value;

    /// Build a complete object from a loaded row
    fn from_record(record: Record) -> ManagerResult<Self>;
}

/// One row's worth of property values plus the identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    values: BTreeMap<String, Value>,
}

static NULL: Value = Value::Null;

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn into_id(self) -> String {
        self.id
    }

    /// Value of a property; missing properties read as `Null`
    pub fn get(&self, name: &str) -> &Value {
        self.values.get(name).unwrap_or(&NULL)
    }

    /// Remove and return a property value
    pub fn take(&mut self, name: &str) -> Value {
        self.values.remove(name).unwrap_or(Value::Null)
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        match self.take(name) {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn take_integer(&mut self, name: &str) -> Option<i64> {
        self.take(name).as_integer()
    }

    pub fn take_float(&mut self, name: &str) -> Option<f64> {
        self.take(name).as_float()
    }

    pub fn take_bool(&mut self, name: &str) -> Option<bool> {
        self.take(name).as_bool()
    }

    pub fn take_list(&mut self, name: &str) -> Option<Vec<Value>> {
        match self.take(name) {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn take_reference(&mut self, name: &str) -> Option<ObjectRef> {
        match self.take(name) {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Like [`Record::take_text`], but fails when the value is missing
    pub fn require_text(&mut self, name: &str) -> ManagerResult<String> {
        self.take_text(name).ok_or_else(|| {
            ManagerError::conversion(format!("Missing text value for {} on {}", name, self.id))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
