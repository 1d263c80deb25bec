//! Statement execution over an `sqlx` SQLite pool.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use schemix_core::dialect::{Dialect, SqliteDialect};
use schemix_core::driver::{Driver, ExecutionMode, ExecutionOutcome, Introspect, Row};
use schemix_core::{Error, Result, Schema, SqlValue};

use crate::introspect::introspect_pool;

/// Executes compiled statements against SQLite.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteDriver {
    /// Wraps an existing pool.
    ///
    /// Foreign keys are not switched on here; use [`SqliteDriver::from_pool`]
    /// or [`SqliteDriver::connect`] for that.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            dialect: SqliteDialect::new(),
        }
    }

    /// Wraps an existing pool and enables foreign-key enforcement.
    ///
    /// The pragma is per connection, so this is only reliable for pools
    /// with a single connection (such as in-memory databases).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExecutionFailed`] if the pragma fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .map_err(Error::execution)?;
        Ok(Self::new(pool))
    }

    /// Opens a pool for `url`, creating the database file if missing.
    /// Every connection enforces foreign keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExecutionFailed`] for a malformed URL or a failed
    /// connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(Error::execution)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(Error::execution)?;
        debug!(url, "Connected to SQLite");
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn bind_value<'q>(query: SqliteQuery<'q>, value: &SqlValue) -> SqliteQuery<'q> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(n) => query.bind(*n),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        // Temporal and JSON values are stored as text
        other => query.bind(other.to_text()),
    }
}

/// Reads a column by its storage class.
fn decode_value(row: &SqliteRow, index: usize) -> sqlx::Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => SqlValue::Int(row.try_get_unchecked(index)?),
        "REAL" => SqlValue::Float(row.try_get_unchecked(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = decode_value(row, i).map_err(Error::execution)?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

#[async_trait]
impl Driver for SqliteDriver {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: ExecutionMode,
    ) -> Result<ExecutionOutcome> {
        debug!(sql = %sql, params = params.len(), ?mode, "Executing SQL");
        let query = params.iter().fold(sqlx::query(sql), bind_value);

        match mode {
            ExecutionMode::Rows => {
                let rows = query
                    .fetch_all(&self.pool)
                    .await
                    .map_err(Error::execution)?;
                rows.iter()
                    .map(decode_row)
                    .collect::<Result<Vec<_>>>()
                    .map(ExecutionOutcome::Rows)
            }
            ExecutionMode::AffectedCount => {
                let done = query.execute(&self.pool).await.map_err(Error::execution)?;
                Ok(ExecutionOutcome::Affected(done.rows_affected()))
            }
        }
    }
}

#[async_trait]
impl Introspect for SqliteDriver {
    async fn introspect(&self) -> Result<Schema> {
        introspect_pool(&self.pool).await
    }
}
