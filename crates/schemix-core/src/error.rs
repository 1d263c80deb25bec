//! Error types for schema declaration, query building and compilation.

/// Errors raised while declaring schemas, building queries or compiling them.
///
/// Every variant except [`Error::ExecutionFailed`] is produced synchronously
/// by the core, before any connection is touched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operand does not match the type expected by an operator or column.
    #[error("Type mismatch: expected {expected}, found {found} ({context})")]
    TypeMismatch {
        /// The expected type family.
        expected: String,
        /// The type family that was supplied.
        found: String,
        /// Where the mismatch happened.
        context: String,
    },

    /// Two columns in one table share a name.
    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumnName {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A foreign key points at a missing or incompatible column.
    #[error("Invalid foreign key {table}.{column}: {reason}")]
    InvalidForeignKey {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
        /// What is wrong with the reference.
        reason: String,
    },

    /// A column name does not resolve in the current scope.
    #[error("Unknown column '{column}' in {scope}")]
    UnknownColumn {
        /// The unresolved column, possibly qualified.
        column: String,
        /// Description of the scope that was searched.
        scope: String,
    },

    /// A select was compiled without a FROM table.
    #[error("SELECT has no source table; call from() before build()")]
    NoSourceTable,

    /// LIMIT or OFFSET was negative.
    #[error("Invalid {clause} bound: {value} (must be non-negative)")]
    InvalidBound {
        /// `LIMIT` or `OFFSET`.
        clause: &'static str,
        /// The rejected value.
        value: i64,
    },

    /// A projected or ordered column is neither aggregated nor grouped.
    #[error("Column '{column}' must appear in GROUP BY or be used in an aggregate")]
    InvalidGrouping {
        /// The offending column.
        column: String,
    },

    /// The dialect cannot express a construct.
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedFeature {
        /// The construct that was requested.
        feature: String,
        /// The dialect name.
        dialect: String,
    },

    /// The differ found destructive changes that were not allowed.
    #[error("Destructive changes require confirmation: {}", .operations.join(", "))]
    RequiresConfirmation {
        /// Human-readable descriptions of the blocked operations.
        operations: Vec<String>,
    },

    /// The driver failed to execute a statement.
    #[error("Execution failed: {0}")]
    ExecutionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A select has no projected expressions.
    #[error("SELECT requires at least one projected expression")]
    EmptyProjection,

    /// An insert or update has no assignments.
    #[error("{statement} on '{table}' has no values")]
    NoValues {
        /// `INSERT` or `UPDATE`.
        statement: &'static str,
        /// Target table.
        table: String,
    },

    /// A statement clause is incomplete.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The rows of a multi-row insert assign different columns.
    #[error("Row {row} of INSERT into '{table}' sets different columns than the first row")]
    MismatchedRows {
        /// Target table.
        table: String,
        /// Zero-based index of the offending row.
        row: usize,
    },

    /// Two tables in one schema share a name.
    #[error("Duplicate table '{0}'")]
    DuplicateTable(String),

    /// A table name does not resolve in the schema.
    #[error("Unknown table '{0}'")]
    UnknownTable(String),

    /// Introspected or deserialized schema data is malformed.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
}

impl Error {
    /// Wraps a driver error.
    pub fn execution<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ExecutionFailed(Box::new(err))
    }

    pub(crate) fn type_mismatch(
        expected: impl Into<String>,
        found: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
            context: context.into(),
        }
    }

    pub(crate) fn unsupported(feature: impl Into<String>, dialect: &str) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            dialect: dialect.to_string(),
        }
    }
}

/// Result type for schemix operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidBound {
            clause: "LIMIT",
            value: -1,
        };
        assert_eq!(err.to_string(), "Invalid LIMIT bound: -1 (must be non-negative)");

        let err = Error::RequiresConfirmation {
            operations: vec![
                String::from("DROP TABLE legacy"),
                String::from("DROP COLUMN users.age"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Destructive changes require confirmation: DROP TABLE legacy, DROP COLUMN users.age"
        );
    }

    #[test]
    fn test_execution_failed_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::other("connection reset");
        let err = Error::execution(io);
        assert!(matches!(err, Error::ExecutionFailed(_)));
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("connection reset")
        );
    }
}
