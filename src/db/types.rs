//! Raw result types
//!
//! Core data structures for results of `TableManager::query_sql`, which
//! hands back rows as typed cells instead of model objects.

use std::fmt;
use std::time::Duration;

/// Rows returned by a raw statement, with the server's column types
#[derive(Debug, Clone)]
pub struct QueryResults {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Row>,
    /// Wall time from prepare to the last row
    pub execution_time: Duration,
    pub row_count: usize,
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// Column types a raw result can carry. Anything else is `Unknown` with
/// the server's type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Text,
    Varchar,
    Char,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Json,
    Jsonb,
    Bytea,
    Uuid,
    Array(Box<ColumnType>),
    Unknown(String),
}

/// Cells of one result row, in column order
#[derive(Debug, Clone)]
pub struct Row {
    pub values: Vec<CellValue>,
}

/// One typed cell.
///
/// Numerics keep their exact text; dates and times are rendered with
/// chrono's `Display`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Json(serde_json::Value),
    Binary(Vec<u8>),
    DateTime(String),
    Uuid(String),
    Array(Vec<CellValue>),
}

impl QueryResults {
    pub fn new(
        columns: Vec<ColumnDef>,
        rows: Vec<Row>,
        execution_time: Duration,
        row_count: usize,
    ) -> Self {
        Self {
            columns,
            rows,
            execution_time,
            row_count,
        }
    }

    /// Position of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell at `row`, column `name`
    pub fn cell(&self, row: usize, name: &str) -> Option<&CellValue> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.values.get(idx)
    }
}

impl ColumnType {
    /// Get a human-readable display name for this type
    pub fn display_name(&self) -> String {
        match self {
            ColumnType::SmallInt => "smallint".to_string(),
            ColumnType::Integer => "integer".to_string(),
            ColumnType::BigInt => "bigint".to_string(),
            ColumnType::Real => "real".to_string(),
            ColumnType::Double => "double precision".to_string(),
            ColumnType::Numeric => "numeric".to_string(),
            ColumnType::Text => "text".to_string(),
            ColumnType::Varchar => "varchar".to_string(),
            ColumnType::Char => "char".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Date => "date".to_string(),
            ColumnType::Time => "time".to_string(),
            ColumnType::Timestamp => "timestamp".to_string(),
            ColumnType::TimestampTz => "timestamptz".to_string(),
            ColumnType::Interval => "interval".to_string(),
            ColumnType::Json => "json".to_string(),
            ColumnType::Jsonb => "jsonb".to_string(),
            ColumnType::Bytea => "bytea".to_string(),
            ColumnType::Uuid => "uuid".to_string(),
            ColumnType::Array(inner) => format!("{}[]", inner.display_name()),
            ColumnType::Unknown(s) => s.clone(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl CellValue {
    /// Check if this is a NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) | CellValue::DateTime(s) | CellValue::Uuid(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Text(s) | CellValue::DateTime(s) | CellValue::Uuid(s) => f.write_str(s),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Json(v) => write!(f, "{}", v),
            CellValue::Binary(b) => write!(f, "<binary {} bytes>", b.len()),
            CellValue::Array(arr) => {
                let items: Vec<String> = arr.iter().map(|v| v.to_string()).collect();
                write!(f, "{{{}}}", items.join(","))
            }
        }
    }
}
