//! Table manager
//!
//! A `TableManager<M>` owns one connection and maps objects of model `M`
//! to rows of one table. Every statement is built by
//! [`statements`](crate::db::statements) and executed in autocommit mode.

use crate::config::{ConnectionConfig, Settings};
use crate::convert::{Converter, decode_value, encode_property};
use crate::db::filter::{Filter, FilterOp};
use crate::db::postgres;
use crate::db::registry::{ManagerRegistry, ObjectResolver};
use crate::db::statements::{self, Statement};
use crate::db::types::QueryResults;
use crate::error::{ManagerError, ManagerResult};
use crate::model::{Model, ModelSchema, Property, Record, Value};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use tokio_postgres::Client;
use tokio_postgres::types::ToSql;
use tracing::debug;
use uuid::Uuid;

/// Lazy, forward-only sequence of objects produced by [`TableManager::query`]
pub type ObjectStream<M> = Pin<Box<dyn Stream<Item = ManagerResult<M>> + Send>>;

/// Persists objects of one model type in one table
pub struct TableManager<M: Model> {
    client: Client,
    table: String,
    settings: Settings,
    converter: Converter,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> TableManager<M> {
    /// Open a connection and bind it to `table`.
    ///
    /// # Errors
    /// Returns `ManagerError::ConnectionFailed` if the server cannot be
    /// reached or rejects the credentials. There is no retry.
    pub async fn connect(config: &ConnectionConfig, table: impl Into<String>) -> ManagerResult<Self> {
        let client = postgres::connect(config).await?;
        Ok(Self::from_client(client, table))
    }

    /// Wrap an already connected client
    pub fn from_client(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            settings: Settings::default(),
            converter: Converter::new(ManagerRegistry::global()),
            _model: PhantomData,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve references through `registry` instead of the global one
    pub fn with_registry(mut self, registry: Arc<ManagerRegistry>) -> Self {
        self.converter = Converter::new(registry);
        self
    }

    /// Share the manager and register it as the resolver for `M`'s class,
    /// so reference properties pointing at `M` can be loaded
    pub fn into_shared(self) -> Arc<Self> {
        let shared = Arc::new(self);
        shared
            .converter
            .registry()
            .register(M::schema().class_name(), &shared);
        shared
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ManagerRegistry> {
        self.converter.registry()
    }

    pub fn converter(&self) -> &Converter {
        &self.converter
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Run the model's DDL file as one batch
    ///
    /// # Errors
    /// Returns `ManagerError::Ddl` if the file cannot be read
    pub async fn create_table(&self) -> ManagerResult<()> {
        let path = M::schema().ddl_path(self.settings.ddl_dir.as_deref());
        let ddl = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ManagerError::Ddl {
                path: path.clone(),
                source,
            })?;
        if self.settings.log_statements {
            debug!(table = %self.table, op = "create_table", path = %path.display(), "statement");
        }
        self.client.batch_execute(&ddl).await?;
        Ok(())
    }

    pub async fn delete_table(&self) -> ManagerResult<()> {
        let sql = statements::drop_table(&self.table);
        if self.settings.log_statements {
            debug!(table = %self.table, op = "delete_table", sql = %sql, "statement");
        }
        self.client.batch_execute(&sql).await?;
        Ok(())
    }

    /// Insert `obj` if it has no id yet, otherwise update its row. Only
    /// properties with a set value are written. Returns the id.
    pub async fn save_object(&self, obj: &mut M) -> ManagerResult<String> {
        let fields = encode_fields(obj);
        let existing = obj.id().filter(|id| !id.is_empty()).map(str::to_string);

        match existing {
            Some(id) => {
                if let Some(stmt) = statements::update(&self.table, &id, &fields) {
                    self.execute("update", &stmt).await?;
                }
                Ok(id)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let stmt = statements::insert(&self.table, &id, &fields);
                self.execute("insert", &stmt).await?;
                obj.assign_id(id.clone());
                Ok(id)
            }
        }
    }

    /// # Errors
    /// Returns `ManagerError::Persistence` if `obj` was never saved
    pub async fn delete_object(&self, obj: &M) -> ManagerResult<()> {
        let id = obj
            .id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ManagerError::Persistence("Cannot delete an object without an id".to_string()))?;
        let stmt = statements::delete_by_id(&self.table, id);
        self.execute("delete", &stmt).await?;
        Ok(())
    }

    /// # Errors
    /// Returns `ManagerError::ObjectNotFound` if no row has this id
    pub async fn get_object(&self, id: &str) -> ManagerResult<M> {
        M::from_record(self.get_record(id).await?)
    }

    /// Load one row's values without building the object
    pub async fn get_record(&self, id: &str) -> ManagerResult<Record> {
        let stmt = statements::select_by_id(&self.table, M::schema(), id);
        let rows = self.fetch("get", &stmt).await?;
        match rows.first() {
            Some(row) => record_from_row(M::schema(), row),
            None => Err(ManagerError::ObjectNotFound {
                class: M::schema().class_name().to_string(),
                id: id.to_string(),
            }),
        }
    }

    /// Find the single object whose `field` equals `value`
    ///
    /// # Errors
    /// - `ManagerError::InvalidField` if `field` is not a visible property
    /// - `ManagerError::NotFound` if nothing matches
    /// - `ManagerError::MultipleResults` if more than one row matches
    pub async fn lookup(&self, field: &str, value: impl Into<Value>) -> ManagerResult<M> {
        let property = find_property(M::schema(), field)?;
        let encoded = encode_property(property, &value.into());
        let stmt = statements::select_where_eq(&self.table, M::schema(), property, encoded);
        let rows = self.fetch("lookup", &stmt).await?;
        match rows.as_slice() {
            [] => Err(ManagerError::NotFound),
            [row] => M::from_record(record_from_row(M::schema(), row)?),
            _ => Err(ManagerError::MultipleResults),
        }
    }

    /// Stream the objects matching every filter. Each filter is a
    /// `"<field> <op>"` expression paired with a value, e.g. `("age >=", 18)`.
    /// No filters selects the whole table.
    ///
    /// # Errors
    /// Returns `ManagerError::InvalidFilter` or `ManagerError::InvalidField`
    /// before anything is sent to the server
    pub async fn query<I, S, V>(&self, filters: I) -> ManagerResult<ObjectStream<M>>
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<Value>,
    {
        let filters = filters
            .into_iter()
            .map(|(expr, value)| Filter::parse(expr.as_ref(), value))
            .collect::<ManagerResult<Vec<_>>>()?;
        let bound = bind_filters(M::schema(), &filters)?;
        let stmt = statements::select_filtered(
            &self.table,
            M::schema(),
            &bound,
            self.settings.filter_join,
        );
        self.log_statement("query", &stmt);

        let rows = self
            .client
            .query_raw(stmt.sql.as_str(), stmt.params.iter().map(|p| p as &dyn ToSql))
            .await?;
        let objects = rows.map(|row| -> ManagerResult<M> {
            let row = row?;
            M::from_record(record_from_row(M::schema(), &row)?)
        });
        Ok(Box::pin(objects))
    }

    /// Every object in the table
    pub async fn all(&self) -> ManagerResult<ObjectStream<M>> {
        self.query(std::iter::empty::<(&str, Value)>()).await
    }

    /// Read one stored property of `obj`, resolving references
    ///
    /// # Errors
    /// Returns `ManagerError::InvalidField` for unknown names and
    /// `ManagerError::Persistence` unless exactly one row matches
    pub async fn get_property(&self, obj: &M, name: &str) -> ManagerResult<Value> {
        let property = find_property(M::schema(), name)?;
        let problem = || ManagerError::Persistence(format!("problem getting {}", name));
        let id = obj.id().ok_or_else(problem)?;

        let stmt = statements::select_column(&self.table, property, id);
        let rows = self.fetch("get_property", &stmt).await?;
        let [row] = rows.as_slice() else {
            return Err(problem());
        };
        let text: Option<String> = row.try_get(0)?;
        self.converter.decode_property(property, text.as_deref()).await
    }

    /// Write one property of `obj` straight to its row
    pub async fn set_property(&self, obj: &M, name: &str, value: impl Into<Value>) -> ManagerResult<()> {
        let property = find_property(M::schema(), name)?;
        let id = obj.id().ok_or_else(|| {
            ManagerError::Persistence(format!("Cannot set {} on an object without an id", name))
        })?;
        let encoded = encode_property(property, &value.into());
        let stmt = statements::update_column(&self.table, property, encoded, id);
        self.execute("set_property", &stmt).await?;
        Ok(())
    }

    /// Run an arbitrary parameterized statement on this manager's
    /// connection and return the raw rows
    pub async fn query_sql(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> ManagerResult<QueryResults> {
        if self.settings.log_statements {
            debug!(table = %self.table, op = "query_sql", sql = %sql, params = params.len(), "statement");
        }
        postgres::run_query(&self.client, sql, params).await
    }

    async fn execute(&self, op: &'static str, stmt: &Statement) -> ManagerResult<u64> {
        self.log_statement(op, stmt);
        let params = bind_params(stmt);
        Ok(self.client.execute(stmt.sql.as_str(), &params).await?)
    }

    async fn fetch(&self, op: &'static str, stmt: &Statement) -> ManagerResult<Vec<tokio_postgres::Row>> {
        self.log_statement(op, stmt);
        let params = bind_params(stmt);
        Ok(self.client.query(stmt.sql.as_str(), &params).await?)
    }

    fn log_statement(&self, op: &'static str, stmt: &Statement) {
        if self.settings.log_statements {
            debug!(
                table = %self.table,
                op,
                sql = %stmt.sql,
                params = stmt.params.len(),
                "statement"
            );
        }
    }
}

impl<M: Model> std::fmt::Debug for TableManager<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableManager")
            .field("class", &M::schema().class_name())
            .field("table", &self.table)
            .field("settings", &self.settings)
            .finish()
    }
}

#[async_trait]
impl<M: Model> ObjectResolver for TableManager<M> {
    async fn resolve(&self, id: &str) -> ManagerResult<Record> {
        self.get_record(id).await
    }
}

fn bind_params(stmt: &Statement) -> Vec<&(dyn ToSql + Sync)> {
    stmt.params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect()
}

fn find_property<'s>(schema: &'s ModelSchema, name: &str) -> ManagerResult<&'s Property> {
    schema
        .find_property(name)
        .ok_or_else(|| ManagerError::InvalidField(name.to_string()))
}

/// Encoded values of the visible properties that are set on `obj`
fn encode_fields<M: Model>(obj: &M) -> Vec<(&'static Property, Option<String>)> {
    M::schema()
        .visible_properties()
        .filter_map(|property| {
            let value = obj.value(&property.name);
            value
                .is_truthy()
                .then(|| (property, encode_property(property, &value)))
        })
        .collect()
}

/// Check each filter's field against the schema and encode its value
fn bind_filters<'s>(
    schema: &'s ModelSchema,
    filters: &[Filter],
) -> ManagerResult<Vec<(&'s Property, FilterOp, Option<String>)>> {
    filters
        .iter()
        .map(|filter| {
            let property = find_property(schema, &filter.field)?;
            Ok((property, filter.op, encode_property(property, &filter.value)))
        })
        .collect()
}

/// Rows are selected as `id` followed by the visible properties, all as text
fn record_from_row(schema: &ModelSchema, row: &tokio_postgres::Row) -> ManagerResult<Record> {
    let id: String = row.try_get(0)?;
    let texts = (1..row.len())
        .map(|idx| row.try_get::<_, Option<String>>(idx))
        .collect::<Result<Vec<_>, _>>()?;
    build_record(schema, id, texts)
}

/// Decode column texts in visible-property order. References stay
/// unresolved; empty values fall back to the property default.
fn build_record(schema: &ModelSchema, id: String, texts: Vec<Option<String>>) -> ManagerResult<Record> {
    let mut record = Record::new(id);
    for (property, text) in schema.visible_properties().zip(texts) {
        let value = decode_value(property, text.as_deref())?;
        let value = if property.empty(&value) {
            property.default_value()
        } else {
            value
        };
        record.insert(property.name.clone(), value);
    }
    Ok(record)
}
