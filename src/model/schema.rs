//! Model schema descriptors
//!
//! Each persisted type describes itself once with a [`ModelSchema`]: its
//! class name, where its DDL lives and an ordered list of typed
//! properties. The manager reads everything it needs from here.

use crate::model::Value;
use std::path::{Path, PathBuf};

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Json,
    /// Identifier of an object owned by another model's manager
    Reference,
    /// Array of `item_type` elements
    List,
}

impl DataType {
    /// PostgreSQL type the encoded text is cast to when bound
    pub fn pg_type(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::Integer => "bigint",
            DataType::Float => "double precision",
            DataType::Boolean => "boolean",
            DataType::Timestamp => "timestamptz",
            DataType::Json => "jsonb",
            DataType::Reference => "text",
            // Nested lists are not supported; a list of lists is bound as text[]
            DataType::List => "text",
        }
    }
}

/// One persisted property of a model
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property (and column) name
    pub name: String,
    /// Declared type
    pub data_type: DataType,
    /// Element type for list properties
    pub item_type: Option<DataType>,
    /// Target class name for reference properties
    pub reference_class: Option<String>,
    /// Value used when the stored column is empty
    pub default: Option<Value>,
    /// Hidden properties have no column and are never persisted
    pub hidden: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            item_type: None,
            reference_class: None,
            default: None,
            hidden: false,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Timestamp)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, DataType::Json)
    }

    /// List property whose elements are `item_type`
    pub fn list(name: impl Into<String>, item_type: DataType) -> Self {
        Self {
            item_type: Some(item_type),
            ..Self::new(name, DataType::List)
        }
    }

    /// Reference to an object of `class`
    pub fn reference(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            reference_class: Some(class.into()),
            ..Self::new(name, DataType::Reference)
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_list(&self) -> bool {
        self.data_type == DataType::List
    }

    /// Value to use when the stored value is empty
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// Whether `value` counts as "nothing stored"
    pub fn empty(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// SQL cast applied to this property's bound text, e.g. `bigint[]`
    pub fn pg_cast(&self) -> String {
        if self.is_list() {
            let item = self.item_type.map_or("text", |t| t.pg_type());
            format!("{}[]", item)
        } else {
            self.data_type.pg_type().to_string()
        }
    }
}

/// Schema of one persisted model type
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    class_name: String,
    module_dir: PathBuf,
    properties: Vec<Property>,
}

impl ModelSchema {
    /// Start a schema for `class_name`; the module directory defaults to
    /// the current directory.
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            module_dir: PathBuf::from("."),
            properties: Vec::new(),
        }
    }

    /// Directory whose `models/` subdirectory holds this model's DDL
    pub fn module_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.module_dir = dir.into();
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// All properties, hidden ones included, in declaration order
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Properties backed by a column
    pub fn visible_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter().filter(|p| !p.hidden)
    }

    /// Look up a column-backed property by name
    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.visible_properties().find(|p| p.name == name)
    }

    /// Location of the DDL file: `<ddl_dir>/<ClassName>.ddl` when an
    /// override is configured, else `<module_dir>/models/<ClassName>.ddl`
    pub fn ddl_path(&self, ddl_dir: Option<&Path>) -> PathBuf {
        let file = format!("{}.ddl", self.class_name);
        match ddl_dir {
            Some(dir) => dir.join(file),
            None => self.module_dir.join("models").join(file),
        }
    }
}
