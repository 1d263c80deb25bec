//! Table declarations and the table builder.

use std::collections::HashSet;

use heck::ToSnakeCase;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::expr::ColumnRef;
use crate::types::ColumnType;
use crate::value::SqlValue;

use super::column::{Column, ColumnBuilder, ColumnDefault, ForeignKey};

/// A multi-column table constraint.
///
/// Single-column keys are carried by the column flags instead, so every
/// table has exactly one spelling of each constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableConstraint {
    /// Composite PRIMARY KEY.
    PrimaryKey {
        /// Key columns in order.
        columns: Vec<String>,
    },
    /// Composite UNIQUE.
    Unique {
        /// Constrained columns in order.
        columns: Vec<String>,
    },
}

impl TableConstraint {
    /// Returns the constrained columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            Self::PrimaryKey { columns } | Self::Unique { columns } => columns,
        }
    }
}

/// A validated table: ordered, name-unique columns plus composite constraints.
///
/// Built with [`TableBuilder`] or deserialized (which runs the same checks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    constraints: Vec<TableConstraint>,
}

#[derive(Deserialize)]
struct RawTable {
    name: String,
    columns: Vec<Column>,
    #[serde(default)]
    constraints: Vec<TableConstraint>,
}

impl TryFrom<RawTable> for Table {
    type Error = Error;

    fn try_from(raw: RawTable) -> Result<Self> {
        TableBuilder::new(raw.name)
            .columns(raw.columns)
            .constraints(raw.constraints)
            .build()
    }
}

impl Table {
    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the composite constraints.
    #[must_use]
    pub fn constraints(&self) -> &[TableConstraint] {
        &self.constraints
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the declaration index of a column.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns a typed reference to a column, for building expressions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] if the table has no such column.
    pub fn col(&self, name: &str) -> Result<ColumnRef> {
        self.column(name)
            .map(|c| c.to_ref(&self.name))
            .ok_or_else(|| Error::UnknownColumn {
                column: name.to_string(),
                scope: format!("table '{}'", self.name),
            })
    }

    /// Primary key columns, from the column flag or the composite constraint.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        let composite = self.constraints.iter().find_map(|c| match c {
            TableConstraint::PrimaryKey { columns } => Some(columns),
            TableConstraint::Unique { .. } => None,
        });
        match composite {
            Some(names) => names.iter().filter_map(|n| self.column(n)).collect(),
            None => self.columns.iter().filter(|c| c.primary_key).collect(),
        }
    }

    /// Columns an INSERT must provide.
    #[must_use]
    pub fn required_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| !c.is_optional()).collect()
    }

    /// Columns an INSERT may omit.
    #[must_use]
    pub fn optional_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_optional()).collect()
    }

    /// Columns carrying a single-column UNIQUE constraint.
    #[must_use]
    pub fn unique_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.unique).collect()
    }

    /// Columns with a foreign key, paired with the reference.
    #[must_use]
    pub fn foreign_keys(&self) -> Vec<(&Column, &ForeignKey)> {
        self.columns
            .iter()
            .filter_map(|c| c.references.as_ref().map(|fk| (c, fk)))
            .collect()
    }

    /// True if `column` alone identifies a row (primary key or unique).
    #[must_use]
    pub fn is_unique_key(&self, column: &str) -> bool {
        let single = |cols: &[String]| cols.len() == 1 && cols[0] == column;
        self.column(column)
            .is_some_and(|c| c.primary_key || c.unique)
            || self.constraints.iter().any(|c| single(c.columns()))
    }

    /// Returns a copy of the table without the foreign keys on `columns`.
    pub(crate) fn without_foreign_keys(&self, columns: &[String]) -> Self {
        let mut table = self.clone();
        for col in &mut table.columns {
            if columns.contains(&col.name) {
                col.references = None;
            }
        }
        table
    }

    /// Returns a copy of the table with each column's type replaced by `ty`.
    pub(crate) fn with_column_types(&self, mut ty: impl FnMut(&Column) -> ColumnType) -> Self {
        let mut table = self.clone();
        for col in &mut table.columns {
            col.ty = ty(col);
        }
        table
    }

    /// Returns a copy of the table with `reference` set on `column`.
    pub(crate) fn with_foreign_key(&self, column: &str, reference: &ForeignKey) -> Self {
        let mut table = self.clone();
        if let Some(col) = table.columns.iter_mut().find(|c| c.name == column) {
            col.references = Some(reference.clone());
        }
        table
    }
}

/// Derives a table name from a declaration name.
///
/// The name is snake-cased, a trailing `_table` is dropped and the last word
/// is pluralized with fixed English rules: words ending in `ss`, `x`, `z`,
/// `ch` or `sh` take `es`, a consonant followed by `y` becomes `ies`, other
/// words ending in `s` are kept, everything else takes `s`.
///
/// ```rust
/// use schemix_core::schema::table_name_for;
///
/// assert_eq!(table_name_for("UserProfile"), "user_profiles");
/// assert_eq!(table_name_for("CategoryTable"), "categories");
/// assert_eq!(table_name_for("Address"), "addresses");
/// assert_eq!(table_name_for("news"), "news");
/// ```
#[must_use]
pub fn table_name_for(declaration: &str) -> String {
    let snake = declaration.to_snake_case();
    let base = snake
        .strip_suffix("_table")
        .filter(|rest| !rest.is_empty())
        .unwrap_or(&snake);
    pluralize(base)
}

fn pluralize(word: &str) -> String {
    const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

    if word.ends_with("ss")
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if stem.chars().last().is_some_and(|c| !VOWELS.contains(&c)) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

/// Table declaration builder.
///
/// # Example
///
/// ```rust
/// use schemix_core::schema::{integer, varchar, TableBuilder};
///
/// let users = TableBuilder::declare("User")
///     .column(integer("id").primary_key().autoincrement())
///     .column(varchar("email", 255).not_null().unique())
///     .build()
///     .unwrap();
///
/// assert_eq!(users.name(), "users");
/// assert_eq!(users.columns().len(), 2);
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct TableBuilder {
    name: String,
    columns: Vec<Column>,
    constraints: Vec<TableConstraint>,
    /// Columns given ON DELETE/ON UPDATE without a reference.
    dangling_actions: Vec<String>,
}

impl TableBuilder {
    /// Starts a table with an explicit name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
            dangling_actions: Vec::new(),
        }
    }

    /// Starts a table named after a declaration, see [`table_name_for`].
    pub fn declare(declaration: &str) -> Self {
        Self::new(table_name_for(declaration))
    }

    /// Adds a column.
    pub fn column(mut self, column: impl Into<ColumnBuilder>) -> Self {
        let builder = column.into();
        if builder.has_dangling_action() {
            self.dangling_actions.push(builder.name().to_string());
        }
        self.columns.push(builder.build());
        self
    }

    /// Adds several columns.
    pub fn columns<I>(self, columns: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ColumnBuilder>,
    {
        columns.into_iter().fold(self, Self::column)
    }

    fn constraints(mut self, constraints: Vec<TableConstraint>) -> Self {
        self.constraints.extend(constraints);
        self
    }

    /// Adds a composite PRIMARY KEY.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.constraints.push(TableConstraint::PrimaryKey {
            columns: columns.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// Adds a composite UNIQUE constraint.
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.constraints.push(TableConstraint::Unique {
            columns: columns.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// Validates and builds the table.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateColumnName`] if two columns share a name.
    /// - [`Error::TypeMismatch`] if a literal default does not fit its column.
    /// - [`Error::UnknownColumn`] if a constraint names an absent column.
    /// - [`Error::InvalidForeignKey`] if a reference to this same table
    ///   targets an absent, non-unique or incompatible column.
    /// - [`Error::InvalidSchema`] for an empty table, several primary keys,
    ///   autoincrement outside an integer primary key, or ON DELETE/ON UPDATE
    ///   on a column without a reference.
    pub fn build(self) -> Result<Table> {
        let Self {
            name,
            mut columns,
            constraints,
            dangling_actions,
        } = self;

        if name.is_empty() {
            return Err(Error::InvalidSchema(String::from("table name is empty")));
        }
        if columns.is_empty() {
            return Err(Error::InvalidSchema(format!("table '{name}' has no columns")));
        }
        if let Some(column) = dangling_actions.first() {
            return Err(Error::InvalidSchema(format!(
                "{name}.{column} sets a referential action without a foreign key"
            )));
        }

        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(Error::DuplicateColumnName {
                    table: name.clone(),
                    column: col.name.clone(),
                });
            }
        }

        for col in &mut columns {
            if col.primary_key {
                col.nullable = false;
            }
            col.references = col.references.take().map(ForeignKey::normalized);
        }

        let constraints = normalize_constraints(&name, &mut columns, constraints)?;

        for col in &columns {
            check_default(&name, col)?;
            if col.autoincrement {
                if !col.ty.is_integer() {
                    return Err(Error::type_mismatch(
                        "integer",
                        col.ty.to_string(),
                        format!("autoincrement column {name}.{}", col.name),
                    ));
                }
                if !col.primary_key {
                    return Err(Error::InvalidSchema(format!(
                        "autoincrement column {name}.{} must be the primary key",
                        col.name
                    )));
                }
            }
        }

        let table = Table {
            name,
            columns,
            constraints,
        };

        for (col, fk) in table.foreign_keys() {
            if fk.table == table.name {
                super::check_reference(&table, col, fk, &table)?;
            }
        }

        Ok(table)
    }
}

fn check_default(table: &str, col: &Column) -> Result<()> {
    let Some(ColumnDefault::Literal(value)) = &col.default else {
        return Ok(());
    };
    let context = format!("default of {table}.{}", col.name);
    if matches!(value, SqlValue::Null) && !col.nullable {
        return Err(Error::type_mismatch("non-null value", "null", context));
    }
    col.ty.check_value(value, &context)
}

/// Folds single-column constraints into column flags and flagged columns
/// into composite constraints so each key has one canonical spelling.
fn normalize_constraints(
    table: &str,
    columns: &mut [Column],
    constraints: Vec<TableConstraint>,
) -> Result<Vec<TableConstraint>> {
    let mut out: Vec<TableConstraint> = Vec::new();
    let mut composite_pk = false;

    for constraint in constraints {
        for name in constraint.columns() {
            if !columns.iter().any(|c| &c.name == name) {
                return Err(Error::UnknownColumn {
                    column: name.clone(),
                    scope: format!("constraint on table '{table}'"),
                });
            }
        }
        if constraint.columns().is_empty() {
            return Err(Error::InvalidSchema(format!(
                "empty constraint on table '{table}'"
            )));
        }
        let single = (constraint.columns().len() == 1).then(|| constraint.columns()[0].clone());
        match (constraint, single) {
            (TableConstraint::PrimaryKey { .. }, Some(name)) => {
                if let Some(col) = columns.iter_mut().find(|c| c.name == name) {
                    col.primary_key = true;
                    col.nullable = false;
                }
            }
            (TableConstraint::Unique { .. }, Some(name)) => {
                if let Some(col) = columns.iter_mut().find(|c| c.name == name) {
                    col.unique = true;
                }
            }
            (pk @ TableConstraint::PrimaryKey { .. }, None) => {
                if composite_pk {
                    return Err(Error::InvalidSchema(format!(
                        "table '{table}' declares more than one primary key"
                    )));
                }
                composite_pk = true;
                for col in columns.iter_mut() {
                    if pk.columns().contains(&col.name) {
                        col.nullable = false;
                    }
                }
                out.push(pk);
            }
            (unique, None) => {
                if !out.contains(&unique) {
                    out.push(unique);
                }
            }
        }
    }

    let flagged: Vec<String> = columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.clone())
        .collect();
    if composite_pk && !flagged.is_empty() {
        return Err(Error::InvalidSchema(format!(
            "table '{table}' declares more than one primary key"
        )));
    }
    if flagged.len() > 1 {
        if columns.iter().any(|c| c.autoincrement) {
            return Err(Error::InvalidSchema(format!(
                "autoincrement requires a single-column primary key on '{table}'"
            )));
        }
        for col in columns.iter_mut() {
            col.primary_key = false;
        }
        out.insert(0, TableConstraint::PrimaryKey { columns: flagged });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{boolean, integer, text, varchar, ForeignKeyAction};
    use crate::types::ColumnType;

    #[test]
    fn test_table_name_for() {
        assert_eq!(table_name_for("Post"), "posts");
        assert_eq!(table_name_for("PostTable"), "posts");
        assert_eq!(table_name_for("Category"), "categories");
        assert_eq!(table_name_for("Day"), "days");
        assert_eq!(table_name_for("Box"), "boxes");
        assert_eq!(table_name_for("Match"), "matches");
        assert_eq!(table_name_for("users"), "users");
        assert_eq!(table_name_for("Table"), "tables");
    }

    #[test]
    fn test_duplicate_column_name() {
        let err = TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(text("id"))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateColumnName { ref table, ref column } if table == "users" && column == "id"
        ));
    }

    #[test]
    fn test_default_type_checked() {
        let err = TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(boolean("active").default("yes"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let ok = TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(boolean("active").not_null().default(true))
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_referential_action_needs_reference() {
        let err = TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(integer("author_id").on_delete(ForeignKeyAction::Cascade))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(ref msg) if msg.contains("posts.author_id")));

        let err = TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(
                integer("author_id")
                    .on_update(ForeignKeyAction::Cascade)
                    .references("users", "id"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));

        let table = TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(
                integer("author_id")
                    .references("users", "id")
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .build()
            .unwrap();
        let fk = table.column("author_id").unwrap().references.as_ref().unwrap();
        assert_eq!(fk.on_delete, Some(ForeignKeyAction::Cascade));
    }

    #[test]
    fn test_autoincrement_requires_integer_primary_key() {
        let err = TableBuilder::new("t")
            .column(text("id").primary_key().autoincrement())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        let err = TableBuilder::new("t")
            .column(integer("id").autoincrement())
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
    }

    #[test]
    fn test_self_reference_validated() {
        let ok = TableBuilder::new("categories")
            .column(integer("id").primary_key())
            .column(integer("parent_id").references("categories", "id"))
            .build();
        assert!(ok.is_ok());

        let err = TableBuilder::new("categories")
            .column(integer("id").primary_key())
            .column(integer("parent_id").references("categories", "missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidForeignKey { .. }));

        let err = TableBuilder::new("categories")
            .column(integer("id").primary_key())
            .column(text("slug"))
            .column(integer("parent_id").references("categories", "slug"))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidForeignKey { .. }));
    }

    #[test]
    fn test_constraints_normalized() {
        let table = TableBuilder::new("memberships")
            .column(integer("user_id"))
            .column(integer("group_id"))
            .column(varchar("code", 10))
            .primary_key(&["user_id", "group_id"])
            .unique(&["code"])
            .build()
            .unwrap();
        assert_eq!(
            table.constraints(),
            &[TableConstraint::PrimaryKey {
                columns: vec![String::from("user_id"), String::from("group_id")]
            }]
        );
        assert!(table.column("code").unwrap().unique);
        assert!(!table.column("user_id").unwrap().nullable);
        assert_eq!(table.primary_key_columns().len(), 2);

        let flagged = TableBuilder::new("memberships")
            .column(integer("user_id").primary_key())
            .column(integer("group_id").primary_key())
            .build()
            .unwrap();
        assert_eq!(flagged.constraints(), table.constraints());
    }

    #[test]
    fn test_constraint_on_unknown_column() {
        let err = TableBuilder::new("t")
            .column(integer("a"))
            .unique(&["a", "b"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn test_column_helpers() {
        let table = TableBuilder::new("posts")
            .column(integer("id").primary_key().autoincrement())
            .column(varchar("title", 200).not_null())
            .column(text("body"))
            .column(boolean("published").not_null().default(false))
            .column(varchar("slug", 200).not_null().unique())
            .build()
            .unwrap();

        let names = |cols: Vec<&Column>| cols.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(table.required_columns()), vec!["title", "slug"]);
        assert_eq!(names(table.optional_columns()), vec!["id", "body", "published"]);
        assert_eq!(names(table.unique_columns()), vec!["slug"]);
        assert_eq!(names(table.primary_key_columns()), vec!["id"]);
        assert!(table.is_unique_key("slug"));
        assert!(!table.is_unique_key("title"));

        let title = table.col("title").unwrap();
        assert_eq!(title.ty, ColumnType::Varchar(200));
        assert!(matches!(table.col("nope"), Err(Error::UnknownColumn { .. })));
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let json = r#"{"name": "t", "columns": [
            {"name": "id", "type": "integer", "primary_key": true},
            {"name": "id", "type": "text"}
        ]}"#;
        let err = serde_json::from_str::<Table>(json).unwrap_err();
        assert!(err.to_string().contains("Duplicate column"));
    }
}
