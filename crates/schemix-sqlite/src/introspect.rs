//! Reads the live SQLite schema back into the core schema model.

use std::collections::BTreeMap;

use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};

use schemix_core::schema::{
    Column, ColumnDefault, ForeignKey, ForeignKeyAction, Schema, Table, TableBuilder,
};
use schemix_core::{ColumnType, Error, Result};

/// One row of `pragma_table_info`.
type ColumnInfo = (String, String, i64, Option<String>, i64);

/// One row of `pragma_foreign_key_list`.
type ForeignKeyInfo = (String, String, Option<String>, String, String);

/// Reads every user table of the database behind `pool`.
///
/// Types are normalized through [`ColumnType::from_native`] and defaults
/// through [`ColumnDefault::from_sql`]. Foreign keys are not resolved, so a
/// database with dangling references still introspects.
///
/// # Errors
///
/// - [`Error::ExecutionFailed`] if a catalog query fails.
/// - [`Error::InvalidSchema`] for a column type with no semantic mapping.
pub async fn introspect_pool(pool: &SqlitePool) -> Result<Schema> {
    let tables: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(Error::execution)?;

    let mut out = Vec::with_capacity(tables.len());
    for (name, sql) in tables {
        out.push(introspect_table(pool, &name, sql.as_deref().unwrap_or_default()).await?);
    }
    debug!(tables = out.len(), "Introspected SQLite schema");
    Schema::lenient(out)
}

async fn introspect_table(pool: &SqlitePool, name: &str, create_sql: &str) -> Result<Table> {
    let infos: Vec<ColumnInfo> = sqlx::query_as(
        r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
    )
    .bind(name)
    .fetch_all(pool)
    .await
    .map_err(Error::execution)?;

    let keys = foreign_keys(pool, name).await?;
    let autoincrement = create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");

    let mut primary_key: Vec<(i64, String)> = Vec::new();
    let mut columns = Vec::with_capacity(infos.len());
    for (column_name, native, not_null, default, pk) in infos {
        let ty = ColumnType::from_native(&native).map_err(|e| {
            Error::InvalidSchema(format!("{name}.{column_name}: {e}"))
        })?;
        let mut column = Column::new(column_name.clone(), ty);
        column.nullable = not_null == 0;
        column.default = default.map(|d| ColumnDefault::from_sql(&d, ty));
        column.references = keys.get(&column_name).cloned();
        if pk > 0 {
            primary_key.push((pk, column_name));
        }
        columns.push(column);
    }

    primary_key.sort();
    let key: Vec<&str> = primary_key.iter().map(|(_, c)| c.as_str()).collect();
    if let [single] = key.as_slice() {
        if let Some(column) = columns.iter_mut().find(|c| c.name == *single) {
            // Only an INTEGER PRIMARY KEY can carry AUTOINCREMENT
            column.autoincrement = autoincrement && column.ty.is_integer();
        }
    }

    let mut builder = TableBuilder::new(name).columns(columns);
    if !key.is_empty() {
        builder = builder.primary_key(&key);
    }
    for unique in unique_constraints(pool, name).await? {
        let unique: Vec<&str> = unique.iter().map(String::as_str).collect();
        builder = builder.unique(&unique);
    }
    builder.build()
}

async fn foreign_keys(pool: &SqlitePool, table: &str) -> Result<BTreeMap<String, ForeignKey>> {
    let rows: Vec<ForeignKeyInfo> = sqlx::query_as(
        r#"SELECT "from", "table", "to", on_delete, on_update
           FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(Error::execution)?;

    let mut keys = BTreeMap::new();
    for (from, target, to, on_delete, on_update) in rows {
        // REFERENCES t without a column targets the primary key
        let column = match to {
            Some(column) => column,
            None => primary_key_of(pool, &target).await?.unwrap_or_default(),
        };
        let mut reference = ForeignKey::new(target, column);
        reference.on_delete = ForeignKeyAction::from_sql(&on_delete);
        reference.on_update = ForeignKeyAction::from_sql(&on_update);
        if keys.insert(from.clone(), reference).is_some() {
            warn!(table, column = %from, "Column has several foreign keys, keeping the last");
        }
    }
    Ok(keys)
}

async fn primary_key_of(pool: &SqlitePool, table: &str) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info(?1) WHERE pk = 1")
        .bind(table)
        .fetch_optional(pool)
        .await
        .map_err(Error::execution)
}

/// UNIQUE constraints declared on the table (not indexes created separately).
async fn unique_constraints(pool: &SqlitePool, table: &str) -> Result<Vec<Vec<String>>> {
    let indexes: Vec<String> = sqlx::query_scalar(
        r#"SELECT name FROM pragma_index_list(?1) WHERE origin = 'u' AND "unique" = 1 ORDER BY name"#,
    )
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(Error::execution)?;

    let mut constraints = Vec::with_capacity(indexes.len());
    for index in indexes {
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")
                .bind(&index)
                .fetch_all(pool)
                .await
                .map_err(Error::execution)?;
        constraints.push(columns);
    }
    Ok(constraints)
}
