//! Common test utilities and helpers
//!
//! Shared models and connection setup for the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use pgmanager::config::{ConnectionConfig, Settings, SslMode};
use pgmanager::db::{ManagerRegistry, TableManager};
use pgmanager::error::ManagerResult;
use pgmanager::model::{DataType, Model, ModelSchema, ObjectRef, Property, Record, Value};
use std::sync::{Arc, LazyLock};

const MODELS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/integration");

pub const PERSON_COLUMNS: &str = "id varchar(64) PRIMARY KEY, name text, age bigint, tags text[]";
pub const PET_COLUMNS: &str = "id varchar(64) PRIMARY KEY, name text, owner text";
pub const MEASUREMENT_COLUMNS: &str = "id text PRIMARY KEY, label text, ratio double precision, \
     active boolean, seen_at timestamptz, meta jsonb";

/// Test database connection config, overridable through TEST_DB_* variables
pub fn test_config() -> ConnectionConfig {
    let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    let port = std::env::var("TEST_DB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5433);

    ConnectionConfig::new(
        env("TEST_DB_HOST", "localhost"),
        env("TEST_DB_NAME", "test_db"),
        env("TEST_DB_USER", "test_user"),
    )
    .with_port(port)
    .with_password(env("TEST_DB_PASSWORD", "test_password"))
    .with_ssl_mode(SslMode::Disable)
}

/// Table name no other test uses
pub fn unique_table(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Connect a manager to a freshly created table. Returns `None` (after
/// printing why) when the test database is not reachable.
pub async fn fresh_manager<M: Model>(
    prefix: &str,
    columns: &str,
    registry: &Arc<ManagerRegistry>,
) -> Option<TableManager<M>> {
    let table = unique_table(prefix);
    let ddl_dir = std::env::temp_dir().join(format!("pgmanager-{}", table));
    std::fs::create_dir_all(&ddl_dir).unwrap();
    std::fs::write(
        ddl_dir.join(format!("{}.ddl", M::schema().class_name())),
        format!("CREATE TABLE \"{}\" ({});", table, columns),
    )
    .unwrap();

    let config = test_config();
    let manager = match TableManager::<M>::connect(&config, table.clone()).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!(
                "Skipping test: Database not available at {}:{} - {}",
                config.host, config.port, e
            );
            return None;
        }
    };

    let settings = Settings {
        ddl_dir: Some(ddl_dir),
        ..Settings::default()
    };
    let manager = manager
        .with_settings(settings)
        .with_registry(Arc::clone(registry));
    manager.create_table().await.unwrap();
    Some(manager)
}

static PERSON: LazyLock<ModelSchema> = LazyLock::new(|| {
    ModelSchema::new("Person")
        .module_dir(MODELS_DIR)
        .property(Property::text("name"))
        .property(Property::integer("age"))
        .property(Property::list("tags", DataType::Text))
        .property(Property::text("nickname").hidden())
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    pub id: Option<String>,
    pub name: String,
    pub age: i64,
    pub tags: Vec<String>,
    pub nickname: String,
}

impl Person {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: name.to_string(),
            age,
            ..Default::default()
        }
    }
}

impl Model for Person {
    fn schema() -> &'static ModelSchema {
        &PERSON
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, property: &str) -> Value {
        match property {
            "name" => self.name.clone().into(),
            "age" => self.age.into(),
            "tags" => self.tags.clone().into(),
            "nickname" => self.nickname.clone().into(),
            _ => Value::Null,
        }
    }

    fn from_record(mut record: Record) -> ManagerResult<Self> {
        let tags = record
            .take_list("tags")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|tag| tag.as_text().map(str::to_string))
            .collect();
        Ok(Self {
            name: record.require_text("name")?,
            age: record.take_integer("age").unwrap_or_default(),
            tags,
            nickname: String::new(),
            id: Some(record.into_id()),
        })
    }
}

static PET: LazyLock<ModelSchema> = LazyLock::new(|| {
    ModelSchema::new("Pet")
        .module_dir(MODELS_DIR)
        .property(Property::text("name"))
        .property(Property::reference("owner", "Person"))
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pet {
    pub id: Option<String>,
    pub name: String,
    pub owner: Option<ObjectRef>,
}

impl Model for Pet {
    fn schema() -> &'static ModelSchema {
        &PET
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, property: &str) -> Value {
        match property {
            "name" => self.name.clone().into(),
            "owner" => self.owner.clone().into(),
            _ => Value::Null,
        }
    }

    fn from_record(mut record: Record) -> ManagerResult<Self> {
        Ok(Self {
            name: record.take_text("name").unwrap_or_default(),
            owner: record.take_reference("owner"),
            id: Some(record.into_id()),
        })
    }
}

static MEASUREMENT: LazyLock<ModelSchema> = LazyLock::new(|| {
    ModelSchema::new("Measurement")
        .property(Property::text("label"))
        .property(Property::float("ratio"))
        .property(Property::boolean("active"))
        .property(Property::timestamp("seen_at"))
        .property(Property::json("meta"))
});

/// Exercises every scalar type against the server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurement {
    pub id: Option<String>,
    pub label: String,
    pub ratio: f64,
    pub active: bool,
    pub seen_at: Option<DateTime<Utc>>,
    pub meta: Option<serde_json::Value>,
}

impl Model for Measurement {
    fn schema() -> &'static ModelSchema {
        &MEASUREMENT
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn value(&self, property: &str) -> Value {
        match property {
            "label" => self.label.clone().into(),
            "ratio" => self.ratio.into(),
            "active" => self.active.into(),
            "seen_at" => self.seen_at.into(),
            "meta" => self.meta.clone().into(),
            _ => Value::Null,
        }
    }

    fn from_record(mut record: Record) -> ManagerResult<Self> {
        Ok(Self {
            label: record.take_text("label").unwrap_or_default(),
            ratio: record.take_float("ratio").unwrap_or_default(),
            active: record.take_bool("active").unwrap_or_default(),
            seen_at: record.take("seen_at").as_timestamp(),
            meta: record.take("meta").as_json().cloned(),
            id: Some(record.into_id()),
        })
    }
}
