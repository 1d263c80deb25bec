//! SQL dialects.
//!
//! A [`Dialect`] is a stateless descriptor: identifier quoting, placeholder
//! style, native type names and the optional features a backend
//! understands. The DDL methods carry ANSI defaults; dialects override the
//! ones whose syntax differs.

mod custom;
mod generic;
mod mysql;
mod postgres;
mod sqlite;

pub use custom::CustomDialect;
pub use generic::GenericDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::DdlOperation;
use crate::error::{Error, Result};
use crate::schema::{Column, ColumnDefault, ForeignKey, Schema, Table, TableConstraint};
use crate::types::ColumnType;
use crate::value::SqlValue;

/// How bound parameters appear in SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?`
    #[default]
    Question,
    /// `$1`, `$2`, ...
    Numbered,
    /// `:p1`, `:p2`, ...
    NamedColon,
}

impl PlaceholderStyle {
    /// Renders the placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn render(self, index: usize) -> String {
        match self {
            Self::Question => String::from("?"),
            Self::Numbered => format!("${index}"),
            Self::NamedColon => format!(":{}", param_name(index)),
        }
    }
}

/// Name of the 1-based parameter `index` in the named style.
#[must_use]
pub fn param_name(index: usize) -> String {
    format!("p{index}")
}

/// Upper-case standard spelling of a type, with length and precision.
///
/// Every name returned here parses back through
/// [`ColumnType::from_native`].
#[must_use]
pub fn standard_type_name(ty: ColumnType) -> String {
    match ty {
        ColumnType::Numeric {
            precision: Some(p),
            scale: Some(s),
        } => format!("NUMERIC({p}, {s})"),
        ColumnType::Numeric {
            precision: Some(p),
            scale: None,
        } => format!("NUMERIC({p})"),
        ColumnType::Char(n) => format!("CHAR({n})"),
        ColumnType::Varchar(n) => format!("VARCHAR({n})"),
        other => other.kind().to_ascii_uppercase(),
    }
}

/// Optional constructs a dialect may or may not support.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// `FULL OUTER JOIN`
    FullOuterJoin,
    /// `RIGHT JOIN`
    RightJoin,
    /// `RETURNING` on INSERT, UPDATE and DELETE.
    #[serde(alias = "returning_clause")]
    Returning,
    /// `ON CONFLICT ... DO ...`
    OnConflict,
    /// `ILIKE` / `NOT ILIKE`
    #[serde(rename = "ilike")]
    ILike,
    /// `ALTER TABLE ... ALTER COLUMN`
    AlterColumn,
    /// Adding and dropping constraints on existing tables.
    AlterConstraints,
    /// `ALTER TABLE ... DROP COLUMN`
    DropColumn,
}

impl Feature {
    /// Human-readable construct name used in errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullOuterJoin => "FULL OUTER JOIN",
            Self::RightJoin => "RIGHT JOIN",
            Self::Returning => "RETURNING",
            Self::OnConflict => "ON CONFLICT",
            Self::ILike => "ILIKE",
            Self::AlterColumn => "ALTER COLUMN",
            Self::AlterConstraints => "ALTER TABLE ADD/DROP CONSTRAINT",
            Self::DropColumn => "DROP COLUMN",
        }
    }
}

/// A database backend's syntax, type and feature profile.
pub trait Dialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &str;

    /// Opening and closing identifier quote characters.
    fn identifier_quotes(&self) -> (char, char) {
        ('"', '"')
    }

    /// Parameter placeholder style.
    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }

    /// Native type name, or `None` if the backend has no such type.
    fn type_name(&self, ty: ColumnType) -> Option<String>;

    /// Returns whether an optional construct is supported.
    fn supports(&self, feature: Feature) -> bool;

    /// Type that replaces the declared one on autoincrementing keys
    /// (`SERIAL`), if any.
    fn autoincrement_type(&self, ty: ColumnType) -> Option<String> {
        let _ = ty;
        None
    }

    /// Keyword appended after `PRIMARY KEY` on autoincrementing keys.
    fn autoincrement_keyword(&self) -> Option<&str> {
        None
    }

    /// Boolean literal for inline defaults.
    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// True if `||` must be rendered as `CONCAT(a, b)`.
    fn concat_as_function(&self) -> bool {
        false
    }

    /// LIMIT value to emit when only OFFSET was requested, for backends
    /// that reject a bare OFFSET.
    fn offset_without_limit(&self) -> Option<&str> {
        None
    }

    /// Quotes an identifier, doubling embedded closing quotes.
    fn quote_identifier(&self, name: &str) -> String {
        let (open, close) = self.identifier_quotes();
        let mut escaped = String::with_capacity(name.len());
        for ch in name.chars() {
            if ch == close {
                escaped.push(close);
            }
            escaped.push(ch);
        }
        format!("{open}{escaped}{close}")
    }

    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String {
        self.placeholder_style().render(index)
    }

    /// Fails with [`Error::UnsupportedFeature`] if `feature` is missing.
    ///
    /// # Errors
    ///
    /// See above.
    fn require(&self, feature: Feature) -> Result<()> {
        if self.supports(feature) {
            Ok(())
        } else {
            Err(Error::unsupported(feature.as_str(), self.name()))
        }
    }

    /// Name of the constraint backing a single-column foreign key.
    fn foreign_key_name(&self, table: &str, column: &str) -> String {
        format!("{table}_{column}_fkey")
    }

    // =========================================================================
    // DDL
    // =========================================================================

    /// Generates SQL for one diff operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] when the dialect cannot
    /// express the operation.
    fn operation_sql(&self, op: &DdlOperation) -> Result<String> {
        match op {
            DdlOperation::CreateTable(table) => self.create_table(table),
            DdlOperation::AddColumn { table, column } => self.add_column(table, column),
            DdlOperation::DropColumn { table, column } => self.drop_column(table, column),
            DdlOperation::AlterColumnNullability {
                table,
                column,
                nullable,
            } => self.alter_nullability(table, column, *nullable),
            DdlOperation::AddForeignKey {
                table,
                column,
                reference,
            } => self.add_foreign_key(table, column, reference),
            DdlOperation::DropForeignKey { table, column, .. } => {
                self.drop_foreign_key(table, column)
            }
            DdlOperation::DropTable(name) => Ok(self.drop_table(name)),
        }
    }

    /// Generates SQL for CREATE TABLE.
    ///
    /// Foreign keys are emitted as named table constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] for column types the dialect
    /// lacks.
    fn create_table(&self, table: &Table) -> Result<String> {
        let mut defs = table
            .columns()
            .iter()
            .map(|c| self.column_definition(c, false))
            .collect::<Result<Vec<_>>>()?;
        defs.extend(table.constraints().iter().map(|c| self.table_constraint(c)));
        defs.extend(
            table
                .foreign_keys()
                .into_iter()
                .map(|(col, fk)| self.foreign_key_constraint(table.name(), &col.name, fk)),
        );

        let body: Vec<String> = defs.iter().map(|d| format!("    {d}")).collect();
        Ok(format!(
            "CREATE TABLE {} (\n{}\n)",
            self.quote_identifier(table.name()),
            body.join(",\n")
        ))
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(table))
    }

    /// Generates SQL for ADD COLUMN, with an inline REFERENCES clause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] for column types the dialect
    /// lacks.
    fn add_column(&self, table: &str, column: &Column) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, true)?
        ))
    }

    /// Generates SQL for DROP COLUMN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] without [`Feature::DropColumn`].
    fn drop_column(&self, table: &str, column: &str) -> Result<String> {
        self.require(Feature::DropColumn)?;
        Ok(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        ))
    }

    /// Generates SQL that makes `column` nullable or NOT NULL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] without [`Feature::AlterColumn`].
    fn alter_nullability(&self, table: &str, column: &Column, nullable: bool) -> Result<String> {
        self.require(Feature::AlterColumn)?;
        let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        Ok(format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name)
        ))
    }

    /// Generates SQL for ADD FOREIGN KEY.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] without
    /// [`Feature::AlterConstraints`].
    fn add_foreign_key(&self, table: &str, column: &str, reference: &ForeignKey) -> Result<String> {
        self.require(Feature::AlterConstraints)?;
        Ok(format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_constraint(table, column, reference)
        ))
    }

    /// Generates SQL for DROP FOREIGN KEY.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] without
    /// [`Feature::AlterConstraints`].
    fn drop_foreign_key(&self, table: &str, column: &str) -> Result<String> {
        self.require(Feature::AlterConstraints)?;
        Ok(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(&self.foreign_key_name(table, column))
        ))
    }

    /// Native type of a column, autoincrement included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] if the type has no native name.
    fn column_type(&self, column: &Column) -> Result<String> {
        if column.autoincrement {
            if let Some(name) = self.autoincrement_type(column.ty) {
                return Ok(name);
            }
        }
        self.type_name(column.ty)
            .ok_or_else(|| Error::unsupported(format!("column type {}", column.ty), self.name()))
    }

    /// Generates a column definition. With `inline_reference`, a foreign
    /// key is rendered as a REFERENCES clause on the column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFeature`] if the type has no native name.
    fn column_definition(&self, column: &Column, inline_reference: bool) -> Result<String> {
        let mut sql = format!(
            "{} {}",
            self.quote_identifier(&column.name),
            self.column_type(column)?
        );

        if column.primary_key {
            sql.push_str(" PRIMARY KEY");
            if column.autoincrement {
                if let Some(keyword) = self.autoincrement_keyword() {
                    sql.push(' ');
                    sql.push_str(keyword);
                }
            }
        } else {
            if !column.nullable {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
        }

        if let Some(ref default) = column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&self.render_default(default));
        }

        if inline_reference {
            if let Some(ref fk) = column.references {
                sql.push_str(&self.references_clause(fk));
            }
        }

        Ok(sql)
    }

    /// Renders a default value inline.
    fn render_default(&self, default: &ColumnDefault) -> String {
        match default {
            ColumnDefault::Literal(SqlValue::Bool(b)) => self.boolean_literal(*b).to_string(),
            ColumnDefault::Literal(value) => value.to_sql_inline(),
            // Bare keywords such as CURRENT_TIMESTAMP stay unwrapped
            ColumnDefault::Expression(sql)
                if sql.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                sql.clone()
            }
            ColumnDefault::Expression(sql) => format!("({sql})"),
        }
    }

    /// Generates a table-level PRIMARY KEY or UNIQUE constraint.
    fn table_constraint(&self, constraint: &TableConstraint) -> String {
        let keyword = match constraint {
            TableConstraint::PrimaryKey { .. } => "PRIMARY KEY",
            TableConstraint::Unique { .. } => "UNIQUE",
        };
        format!("{keyword} ({})", self.column_list(constraint.columns()))
    }

    /// Generates a named FOREIGN KEY table constraint.
    fn foreign_key_constraint(&self, table: &str, column: &str, reference: &ForeignKey) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}){}",
            self.quote_identifier(&self.foreign_key_name(table, column)),
            self.quote_identifier(column),
            self.references_clause(reference)
        )
    }

    /// ` REFERENCES "t" ("c")` with its referential actions.
    fn references_clause(&self, reference: &ForeignKey) -> String {
        let mut sql = format!(
            " REFERENCES {} ({})",
            self.quote_identifier(&reference.table),
            self.quote_identifier(&reference.column)
        );
        if let Some(action) = reference.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = reference.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        sql
    }

    /// Quoted, comma-separated identifiers.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Generates CREATE TABLE for one table.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] for column types the dialect lacks.
pub fn create_table_sql<D: Dialect + ?Sized>(table: &Table, dialect: &D) -> Result<String> {
    dialect.create_table(table)
}

/// Generates SQL for one diff operation.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] when the dialect cannot express it.
pub fn operation_sql<D: Dialect + ?Sized>(op: &DdlOperation, dialect: &D) -> Result<String> {
    dialect.operation_sql(op)
}

/// Rewrites `schema` with the column types `dialect` actually stores.
///
/// Autoincrementing keys take the dialect's replacement type where it maps
/// back to a [`ColumnType`]; SQLite stores every one as `INTEGER`. Diffing
/// the result against an introspected schema then reports no spurious type
/// changes.
///
/// # Errors
///
/// Same as [`Schema::lenient`].
pub fn stored_schema<D: Dialect + ?Sized>(schema: &Schema, dialect: &D) -> Result<Schema> {
    Schema::lenient(schema.tables().map(|table| {
        table.with_column_types(|column| {
            if !column.autoincrement {
                return column.ty;
            }
            dialect
                .autoincrement_type(column.ty)
                .and_then(|native| ColumnType::from_native(&native).ok())
                .unwrap_or(column.ty)
        })
    }))
}

/// Generates the DDL creating a whole schema, tables in foreign-key
/// dependency order.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] for column types the dialect lacks.
pub fn schema_ddl<D: Dialect + ?Sized>(schema: &Schema, dialect: &D) -> Result<Vec<String>> {
    let mut creates = Vec::with_capacity(schema.len());
    let mut deferred_keys = Vec::new();
    for (table, deferred) in schema.dependency_order() {
        creates.push(DdlOperation::CreateTable(table.without_foreign_keys(&deferred)));
        for column in deferred {
            if let Some(reference) = table.column(&column).and_then(|c| c.references.clone()) {
                deferred_keys.push(DdlOperation::AddForeignKey {
                    table: table.name().to_string(),
                    column,
                    reference,
                });
            }
        }
    }
    creates.extend(deferred_keys);
    compile_plan(&creates, dialect)
}

/// Generates SQL for an ordered list of diff operations.
///
/// Dialects without [`Feature::AlterConstraints`] cannot add a foreign key
/// to an existing table; a deferred foreign key on a table created by the
/// same plan is folded back into its CREATE TABLE instead.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] for the first operation the dialect
/// cannot express.
pub fn compile_plan<D: Dialect + ?Sized>(
    operations: &[DdlOperation],
    dialect: &D,
) -> Result<Vec<String>> {
    let folded;
    let operations = if dialect.supports(Feature::AlterConstraints) {
        operations
    } else {
        folded = fold_foreign_keys(operations);
        &folded
    };

    let statements = operations
        .iter()
        .map(|op| dialect.operation_sql(op))
        .collect::<Result<Vec<_>>>()?;
    debug!(
        dialect = dialect.name(),
        statements = statements.len(),
        "Compiled DDL plan"
    );
    Ok(statements)
}

fn fold_foreign_keys(operations: &[DdlOperation]) -> Vec<DdlOperation> {
    let mut created: BTreeMap<&str, usize> = BTreeMap::new();
    let mut out: Vec<DdlOperation> = Vec::with_capacity(operations.len());
    for op in operations {
        match op {
            DdlOperation::CreateTable(table) => {
                created.insert(table.name(), out.len());
                out.push(op.clone());
            }
            DdlOperation::AddForeignKey {
                table,
                column,
                reference,
            } => {
                let merged = created.get(table.as_str()).and_then(|i| match &out[*i] {
                    DdlOperation::CreateTable(t) => Some((*i, t.with_foreign_key(column, reference))),
                    _ => None,
                });
                match merged {
                    Some((i, t)) => out[i] = DdlOperation::CreateTable(t),
                    None => out.push(op.clone()),
                }
            }
            _ => out.push(op.clone()),
        }
    }
    out
}
