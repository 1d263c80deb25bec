//! Contracts for the external collaborators: statement execution and
//! schema introspection.
//!
//! The core never performs I/O. Driver crates implement [`Driver`] and
//! [`Introspect`] over their native client and map every native error to
//! [`Error::ExecutionFailed`].

use async_trait::async_trait;

use crate::compile::CompiledQuery;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::schema::Schema;
use crate::value::{FromSqlValue, SqlValue};

/// What the caller expects back from a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// The statement returns rows (SELECT, or anything with RETURNING).
    Rows,
    /// The statement returns the number of affected rows.
    AffectedCount,
}

/// One result row: column names mapped to values, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column.
    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    /// Returns the raw value of `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    /// Reads `name` as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if the row has no such column and
    /// [`Error::TypeMismatch`] if the value does not convert.
    pub fn get<T: FromSqlValue>(&self, name: &str) -> Result<T> {
        let value = self.value(name).ok_or_else(|| Error::UnknownColumn {
            column: name.to_string(),
            scope: String::from("result row"),
        })?;
        T::from_sql_value(value)
    }

    /// Column names in result order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SqlValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Rows returned by the statement.
    Rows(Vec<Row>),
    /// Number of rows affected.
    Affected(u64),
}

impl ExecutionOutcome {
    /// Returns the rows, or an empty list for an affected count.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) => Vec::new(),
        }
    }

    /// Returns the affected count, or the number of rows returned.
    #[must_use]
    pub fn affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Affected(n) => *n,
        }
    }
}

/// Executes SQL text with bound parameters.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The dialect statements for this driver are compiled with.
    fn dialect(&self) -> &dyn Dialect;

    /// Executes one statement.
    async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        mode: ExecutionMode,
    ) -> Result<ExecutionOutcome>;

    /// Executes a compiled query and returns its rows.
    async fn fetch_all(&self, query: &CompiledQuery) -> Result<Vec<Row>> {
        Ok(self
            .execute(&query.sql, &query.params, ExecutionMode::Rows)
            .await?
            .into_rows())
    }

    /// Executes a compiled query and returns the affected count.
    async fn execute_compiled(&self, query: &CompiledQuery) -> Result<u64> {
        Ok(self
            .execute(&query.sql, &query.params, ExecutionMode::AffectedCount)
            .await?
            .affected())
    }
}

/// Reads the live schema in the shape the differ consumes.
#[async_trait]
pub trait Introspect: Send + Sync {
    /// Returns the live schema.
    async fn introspect(&self) -> Result<Schema>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::compile::compile;
    use crate::dialect::SqliteDialect;
    use crate::query::delete;
    use crate::schema::{integer, TableBuilder};

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, Vec<SqlValue>, ExecutionMode)>>,
    }

    #[async_trait]
    impl Driver for Recording {
        fn dialect(&self) -> &dyn Dialect {
            &SqliteDialect
        }

        async fn execute(
            &self,
            sql: &str,
            params: &[SqlValue],
            mode: ExecutionMode,
        ) -> Result<ExecutionOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_string(), params.to_vec(), mode));
            Ok(match mode {
                ExecutionMode::Rows => ExecutionOutcome::Rows(vec![[(
                    String::from("id"),
                    SqlValue::Int(7),
                )]
                .into_iter()
                .collect()]),
                ExecutionMode::AffectedCount => ExecutionOutcome::Affected(3),
            })
        }
    }

    #[test]
    fn test_row_access() {
        let mut row = Row::new();
        row.push("id", SqlValue::Int(1));
        row.push("active", SqlValue::Int(1));
        row.push("name", SqlValue::Null);

        assert_eq!(row.get::<i64>("id").unwrap(), 1);
        assert!(row.get::<bool>("active").unwrap());
        assert_eq!(row.get::<Option<String>>("name").unwrap(), None);
        assert!(matches!(
            row.get::<i64>("missing"),
            Err(Error::UnknownColumn { .. })
        ));
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["id", "active", "name"]);
    }

    #[tokio::test]
    async fn test_compiled_query_execution() {
        let sessions = TableBuilder::new("sessions")
            .column(integer("id").primary_key())
            .build()
            .unwrap();
        let id = sessions.col("id").unwrap();
        let query = delete(&sessions)
            .where_clause(id.eq(5).unwrap())
            .unwrap()
            .build()
            .unwrap();

        let driver = Recording::default();
        let compiled = compile(&query, driver.dialect()).unwrap();
        assert_eq!(driver.execute_compiled(&compiled).await.unwrap(), 3);

        let rows = driver.fetch_all(&compiled).await.unwrap();
        assert_eq!(rows[0].get::<i64>("id").unwrap(), 7);

        let calls = driver.calls.lock().unwrap();
        assert_eq!(calls[0].0, "DELETE FROM \"sessions\" WHERE \"id\" = ?");
        assert_eq!(calls[0].1, vec![SqlValue::Int(5)]);
        assert_eq!(calls[0].2, ExecutionMode::AffectedCount);
        assert_eq!(calls[1].2, ExecutionMode::Rows);
    }
}
