//! PostgreSQL connection and raw queries
//!
//! Concrete connection handling using tokio-postgres.

use crate::config::ConnectionConfig;
use crate::config::connections::SslMode;
use crate::db::types::{CellValue, ColumnDef, ColumnType, QueryResults, Row};
use crate::error::{ManagerError, ManagerResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::Client;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tracing::{error, info};

/// Connect to a PostgreSQL database.
///
/// The connection's I/O runs on a spawned task; if it ends with an error
/// (server restart, idle timeout) that is logged and every later call on
/// the client fails with the driver's error. There is no reconnect.
pub async fn connect(config: &ConnectionConfig) -> ManagerResult<Client> {
    let conn_string = config.connection_string_with_password();

    let client = match config.ssl_mode {
        SslMode::Disable => {
            let (client, connection) =
                tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                    .await
                    .map_err(|e| ManagerError::ConnectionFailed(e.to_string()))?;
            let target = config.name.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!(connection = %target, error = %e, "connection lost");
                }
            });
            client
        }
        SslMode::Prefer | SslMode::Require => {
            let tls_config = make_tls_config();
            let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
            let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                .await
                .map_err(|e| ManagerError::ConnectionFailed(e.to_string()))?;
            let target = config.name.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!(connection = %target, error = %e, "connection lost");
                }
            });
            client
        }
    };

    info!(
        connection = %config.name,
        host = %config.host,
        port = config.port,
        database = %config.database,
        "connected"
    );
    Ok(client)
}

/// Run an arbitrary parameterized statement and collect typed cells
pub async fn run_query(
    client: &Client,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> ManagerResult<QueryResults> {
    let start = std::time::Instant::now();

    let stmt = client.prepare(sql).await?;

    let columns: Vec<ColumnDef> = stmt
        .columns()
        .iter()
        .map(|col| ColumnDef {
            name: col.name().to_string(),
            column_type: pg_type_to_column_type(col.type_()),
        })
        .collect();

    let pg_rows = client.query(&stmt, params).await?;

    let row_count = pg_rows.len();
    let mut rows = Vec::with_capacity(row_count);

    for pg_row in &pg_rows {
        let mut values = Vec::with_capacity(columns.len());
        for (i, col_def) in columns.iter().enumerate() {
            values.push(extract_cell_value(pg_row, i, &col_def.column_type));
        }
        rows.push(Row { values });
    }

    Ok(QueryResults::new(columns, rows, start.elapsed(), row_count))
}

/// Map tokio_postgres Type to our ColumnType enum
fn pg_type_to_column_type(pg_type: &Type) -> ColumnType {
    match *pg_type {
        Type::INT2 => ColumnType::SmallInt,
        Type::INT4 => ColumnType::Integer,
        Type::INT8 => ColumnType::BigInt,
        Type::FLOAT4 => ColumnType::Real,
        Type::FLOAT8 => ColumnType::Double,
        Type::NUMERIC => ColumnType::Numeric,
        Type::TEXT | Type::NAME => ColumnType::Text,
        Type::VARCHAR => ColumnType::Varchar,
        Type::CHAR | Type::BPCHAR => ColumnType::Char,
        Type::BOOL => ColumnType::Boolean,
        Type::DATE => ColumnType::Date,
        Type::TIME => ColumnType::Time,
        Type::TIMESTAMP => ColumnType::Timestamp,
        Type::TIMESTAMPTZ => ColumnType::TimestampTz,
        Type::INTERVAL => ColumnType::Interval,
        Type::JSON => ColumnType::Json,
        Type::JSONB => ColumnType::Jsonb,
        Type::BYTEA => ColumnType::Bytea,
        Type::UUID => ColumnType::Uuid,
        // Array types
        Type::BOOL_ARRAY => ColumnType::Array(Box::new(ColumnType::Boolean)),
        Type::INT2_ARRAY => ColumnType::Array(Box::new(ColumnType::SmallInt)),
        Type::INT4_ARRAY => ColumnType::Array(Box::new(ColumnType::Integer)),
        Type::INT8_ARRAY => ColumnType::Array(Box::new(ColumnType::BigInt)),
        Type::FLOAT4_ARRAY => ColumnType::Array(Box::new(ColumnType::Real)),
        Type::FLOAT8_ARRAY => ColumnType::Array(Box::new(ColumnType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            ColumnType::Array(Box::new(ColumnType::Text))
        }
        Type::UUID_ARRAY => ColumnType::Array(Box::new(ColumnType::Uuid)),
        Type::JSONB_ARRAY => ColumnType::Array(Box::new(ColumnType::Jsonb)),
        Type::JSON_ARRAY => ColumnType::Array(Box::new(ColumnType::Json)),
        Type::NUMERIC_ARRAY => ColumnType::Array(Box::new(ColumnType::Numeric)),
        _ => ColumnType::Unknown(pg_type.name().to_string()),
    }
}

/// TLS client config trusting the OS certificate store, or Mozilla's roots
/// when the store yields nothing
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Read one cell as `T`, wrapping it with `wrap`. NULL stays NULL; a type
/// mismatch falls back to the text representation.
fn cell<'a, T>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    wrap: impl FnOnce(T) -> CellValue,
) -> CellValue
where
    T: FromSql<'a>,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => CellValue::Null,
        Err(_) => try_as_string(row, idx),
    }
}

/// Read one array cell whose elements are `T`
fn array_cell<'a, T>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    wrap: impl Fn(T) -> CellValue,
) -> CellValue
where
    T: FromSql<'a>,
{
    cell(row, idx, |items: Vec<T>| {
        CellValue::Array(items.into_iter().map(wrap).collect())
    })
}

/// Extract a cell value based on the column's reported type
fn extract_cell_value(row: &tokio_postgres::Row, idx: usize, column_type: &ColumnType) -> CellValue {
    match column_type {
        ColumnType::SmallInt => cell(row, idx, |v: i16| CellValue::Integer(v.into())),
        ColumnType::Integer => cell(row, idx, |v: i32| CellValue::Integer(v.into())),
        ColumnType::BigInt => cell(row, idx, CellValue::Integer),
        ColumnType::Real => cell(row, idx, |v: f32| CellValue::Float(v.into())),
        ColumnType::Double => cell(row, idx, CellValue::Float),
        ColumnType::Numeric => cell(row, idx, |v: Decimal| CellValue::Text(v.to_string())),
        ColumnType::Boolean => cell(row, idx, CellValue::Boolean),
        ColumnType::Json | ColumnType::Jsonb => cell(row, idx, CellValue::Json),
        ColumnType::Bytea => cell(row, idx, CellValue::Binary),
        ColumnType::Uuid => cell(row, idx, |v: uuid::Uuid| CellValue::Uuid(v.to_string())),
        ColumnType::Timestamp => cell(row, idx, |v: NaiveDateTime| {
            CellValue::DateTime(v.to_string())
        }),
        ColumnType::TimestampTz => cell(row, idx, |v: DateTime<Utc>| {
            CellValue::DateTime(v.to_rfc3339())
        }),
        ColumnType::Date => cell(row, idx, |v: NaiveDate| CellValue::DateTime(v.to_string())),
        ColumnType::Time => cell(row, idx, |v: NaiveTime| CellValue::DateTime(v.to_string())),
        ColumnType::Array(inner) => extract_array_value(row, idx, inner),
        // Text types, intervals and anything unmapped
        _ => try_as_string(row, idx),
    }
}

fn extract_array_value(row: &tokio_postgres::Row, idx: usize, inner: &ColumnType) -> CellValue {
    match inner {
        ColumnType::Text | ColumnType::Varchar | ColumnType::Char => {
            array_cell(row, idx, CellValue::Text)
        }
        ColumnType::SmallInt => array_cell(row, idx, |v: i16| CellValue::Integer(v.into())),
        ColumnType::Integer => array_cell(row, idx, |v: i32| CellValue::Integer(v.into())),
        ColumnType::BigInt => array_cell(row, idx, CellValue::Integer),
        ColumnType::Real => array_cell(row, idx, |v: f32| CellValue::Float(v.into())),
        ColumnType::Double => array_cell(row, idx, CellValue::Float),
        ColumnType::Boolean => array_cell(row, idx, CellValue::Boolean),
        ColumnType::Uuid => array_cell(row, idx, |v: uuid::Uuid| CellValue::Uuid(v.to_string())),
        ColumnType::Json | ColumnType::Jsonb => array_cell(row, idx, CellValue::Json),
        ColumnType::Numeric => array_cell(row, idx, |v: Decimal| CellValue::Text(v.to_string())),
        _ => try_as_string(row, idx),
    }
}

/// Fallback: read the cell as text. When even that fails the message names
/// the server type that could not be read.
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unreadable {}>", type_name))
        }
    }
}
