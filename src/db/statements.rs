//! Statement construction
//!
//! Builds the SQL for every manager operation. Values never appear in the
//! SQL text: each one is a `$n` placeholder bound as text and cast to the
//! property's PostgreSQL type (`$2::text::bigint`). Identifiers come from
//! the model schema and are always double-quoted.

use crate::config::FilterJoin;
use crate::db::filter::FilterOp;
use crate::model::{DataType, ModelSchema, Property};

/// SQL text plus its bound parameters, in placeholder order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Bind `value` and return its placeholder, cast for `pg_type`
    fn bind(&mut self, value: Option<String>, pg_type: &str) -> String {
        self.params.push(value);
        let n = self.params.len();
        if pg_type == "text" {
            format!("${}::text", n)
        } else {
            format!("${}::text::{}", n, pg_type)
        }
    }

    fn bind_id(&mut self, id: &str) -> String {
        self.bind(Some(id.to_string()), "text")
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `to_char` pattern for timestamps read back by the converter
const UTC_TIMESTAMP_FORMAT: &str = r#"'YYYY-MM-DD"T"HH24:MI:SS.US"Z"'"#;

/// Text form of a stored column as the converter reads it.
///
/// Plain `::text` follows the session's `TimeZone` and `DateStyle`, so
/// timestamps (and lists of them) are rendered as UTC RFC 3339 instead.
pub fn read_column(property: &Property) -> String {
    let col = quote_ident(&property.name);
    let as_utc = |expr: &str| format!("to_char({} AT TIME ZONE 'UTC', {})", expr, UTC_TIMESTAMP_FORMAT);
    match (property.data_type, property.item_type) {
        (DataType::Timestamp, _) => as_utc(&col),
        (DataType::List, Some(DataType::Timestamp)) => format!(
            "CASE WHEN {col} IS NULL THEN NULL ELSE ARRAY(SELECT {item} FROM unnest({col}) \
             WITH ORDINALITY AS u(item, n) ORDER BY n)::text END",
            col = col,
            item = as_utc("item"),
        ),
        _ => format!("{}::text", col),
    }
}

/// `"id"::text AS "id", "name"::text AS "name", ...` over the visible
/// properties. Every column is read back as text for the converter.
pub fn select_list(schema: &ModelSchema) -> String {
    std::iter::once(format!("{}::text AS {}", quote_ident("id"), quote_ident("id")))
        .chain(
            schema
                .visible_properties()
                .map(|p| format!("{} AS {}", read_column(p), quote_ident(&p.name))),
        )
        .collect::<Vec<_>>()
        .join(", ")
}

/// INSERT of a new row with `id` and the given encoded fields
pub fn insert(table: &str, id: &str, fields: &[(&Property, Option<String>)]) -> Statement {
    let mut stmt = Statement::new();
    let mut columns = vec![quote_ident("id")];
    let mut values = vec![stmt.bind_id(id)];
    for (property, value) in fields {
        columns.push(quote_ident(&property.name));
        values.push(stmt.bind(value.clone(), &property.pg_cast()));
    }
    stmt.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        values.join(", ")
    );
    stmt
}

/// UPDATE of the given encoded fields by id; `None` when there is nothing
/// to set
pub fn update(table: &str, id: &str, fields: &[(&Property, Option<String>)]) -> Option<Statement> {
    if fields.is_empty() {
        return None;
    }
    let mut stmt = Statement::new();
    let assignments: Vec<String> = fields
        .iter()
        .map(|(property, value)| {
            let placeholder = stmt.bind(value.clone(), &property.pg_cast());
            format!("{} = {}", quote_ident(&property.name), placeholder)
        })
        .collect();
    let id_placeholder = stmt.bind_id(id);
    stmt.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_ident(table),
        assignments.join(", "),
        quote_ident("id"),
        id_placeholder
    );
    Some(stmt)
}

pub fn select_by_id(table: &str, schema: &ModelSchema, id: &str) -> Statement {
    let mut stmt = Statement::new();
    let placeholder = stmt.bind_id(id);
    stmt.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_list(schema),
        quote_ident(table),
        quote_ident("id"),
        placeholder
    );
    stmt
}

/// Equality lookup on one property
pub fn select_where_eq(
    table: &str,
    schema: &ModelSchema,
    property: &Property,
    value: Option<String>,
) -> Statement {
    select_filtered(
        table,
        schema,
        &[(property, FilterOp::Eq, value)],
        FilterJoin::And,
    )
}

/// SELECT with one condition per filter, joined per `join`
pub fn select_filtered(
    table: &str,
    schema: &ModelSchema,
    filters: &[(&Property, FilterOp, Option<String>)],
    join: FilterJoin,
) -> Statement {
    let mut stmt = Statement::new();
    let mut sql = format!("SELECT {} FROM {}", select_list(schema), quote_ident(table));
    if !filters.is_empty() {
        let parts: Vec<String> = filters
            .iter()
            .map(|(property, op, value)| {
                let placeholder = stmt.bind(value.clone(), &property.pg_cast());
                format!("{} {} {}", quote_ident(&property.name), op.as_sql(), placeholder)
            })
            .collect();
        sql.push_str(" WHERE ");
        sql.push_str(&parts.join(join.separator()));
    }
    stmt.sql = sql;
    stmt
}

/// Read one column of one row
pub fn select_column(table: &str, property: &Property, id: &str) -> Statement {
    let mut stmt = Statement::new();
    let placeholder = stmt.bind_id(id);
    stmt.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        read_column(property),
        quote_ident(table),
        quote_ident("id"),
        placeholder
    );
    stmt
}

/// Write one column of one row
pub fn update_column(
    table: &str,
    property: &Property,
    value: Option<String>,
    id: &str,
) -> Statement {
    let mut stmt = Statement::new();
    let value_placeholder = stmt.bind(value, &property.pg_cast());
    let id_placeholder = stmt.bind_id(id);
    stmt.sql = format!(
        "UPDATE {} SET {} = {} WHERE {} = {}",
        quote_ident(table),
        quote_ident(&property.name),
        value_placeholder,
        quote_ident("id"),
        id_placeholder
    );
    stmt
}

pub fn delete_by_id(table: &str, id: &str) -> Statement {
    let mut stmt = Statement::new();
    let placeholder = stmt.bind_id(id);
    stmt.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quote_ident(table),
        quote_ident("id"),
        placeholder
    );
    stmt
}

pub fn drop_table(table: &str) -> String {
    format!("DROP TABLE {}", quote_ident(table))
}
