//! Schema differ for push-based synchronization.
//!
//! Compares a desired [`Schema`] with the live one (as returned by an
//! introspection collaborator) and produces the ordered DDL operations
//! that reconcile them. Destructive operations are only emitted when an
//! [`AllowList`] permits them; otherwise they are reported as blocked.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::schema::{dependency_order, Column, ForeignKey, Schema, Table, TableConstraint};
use crate::types::ColumnType;

/// Minimum normalized similarity (0.0 to 1.0) for a dropped and an added
/// column to be reported as a possible rename.
const RENAME_SIMILARITY_THRESHOLD: f64 = 0.4;

// ================================================================
// Public types
// ================================================================

/// One schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlOperation {
    /// Create a table, with its inline constraints.
    CreateTable(Table),
    /// Add a column to an existing table.
    AddColumn {
        /// Table name.
        table: String,
        /// Full column definition.
        column: Column,
    },
    /// Drop a column. Destructive.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Make a column nullable or NOT NULL.
    AlterColumnNullability {
        /// Table name.
        table: String,
        /// Desired column definition.
        column: Column,
        /// Desired nullability.
        nullable: bool,
    },
    /// Add a foreign key to an existing column.
    AddForeignKey {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
        /// Target.
        reference: ForeignKey,
    },
    /// Drop the foreign key of a column.
    DropForeignKey {
        /// Referencing table.
        table: String,
        /// Referencing column.
        column: String,
        /// The reference being dropped.
        reference: ForeignKey,
    },
    /// Drop a table. Destructive.
    DropTable(String),
}

impl DdlOperation {
    /// True for operations that lose data.
    #[must_use]
    pub const fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable(_) | Self::DropColumn { .. })
    }

    /// Name of the table the operation applies to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(table) => table.name(),
            Self::DropTable(table)
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumnNullability { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. } => table,
        }
    }
}

impl fmt::Display for DdlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable(table) => write!(f, "create table {}", table.name()),
            Self::AddColumn { table, column } => {
                write!(f, "add column {table}.{} ({})", column.name, column.ty)
            }
            Self::DropColumn { table, column } => write!(f, "drop column {table}.{column}"),
            Self::AlterColumnNullability {
                table,
                column,
                nullable,
            } => {
                let state = if *nullable { "NULL" } else { "NOT NULL" };
                write!(f, "alter column {table}.{} to {state}", column.name)
            }
            Self::AddForeignKey {
                table,
                column,
                reference,
            } => write!(
                f,
                "add foreign key {table}.{column} -> {}.{}",
                reference.table, reference.column
            ),
            Self::DropForeignKey {
                table,
                column,
                reference,
            } => write!(
                f,
                "drop foreign key {table}.{column} -> {}.{}",
                reference.table, reference.column
            ),
            Self::DropTable(table) => write!(f, "drop table {table}"),
        }
    }
}

/// Destructive operations the caller has agreed to.
///
/// The default allows nothing: the differ runs additive-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    all: bool,
    drop_tables: BTreeSet<String>,
    drop_columns: BTreeSet<(String, String)>,
}

impl AllowList {
    /// Creates an empty allow-list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allows dropping `table`.
    #[must_use]
    pub fn allow_drop_table(mut self, table: impl Into<String>) -> Self {
        self.drop_tables.insert(table.into());
        self
    }

    /// Allows dropping `table.column`.
    #[must_use]
    pub fn allow_drop_column(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.drop_columns.insert((table.into(), column.into()));
        self
    }

    /// Allows every destructive operation.
    #[must_use]
    pub const fn allow_all(mut self) -> Self {
        self.all = true;
        self
    }

    /// Returns whether `op` may be applied.
    #[must_use]
    pub fn permits(&self, op: &DdlOperation) -> bool {
        if self.all {
            return true;
        }
        match op {
            DdlOperation::DropTable(table) => self.drop_tables.contains(table),
            DdlOperation::DropColumn { table, column } => self
                .drop_columns
                .iter()
                .any(|(t, c)| t == table && c == column),
            _ => true,
        }
    }
}

/// A difference the differ detected but does not translate into DDL.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffWarning {
    /// The declared type of a column changed.
    TypeChanged {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Live type.
        from: ColumnType,
        /// Desired type.
        to: ColumnType,
    },
    /// The primary key of a table changed.
    PrimaryKeyChanged {
        /// Table name.
        table: String,
    },
    /// A UNIQUE constraint was added or removed.
    UniqueChanged {
        /// Table name.
        table: String,
        /// Constrained columns.
        columns: Vec<String>,
    },
    /// A column default changed.
    DefaultChanged {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// A dropped and an added column with the same type and similar names.
    PossibleRename {
        /// Table name.
        table: String,
        /// Live column name.
        from: String,
        /// Desired column name.
        to: String,
    },
}

impl fmt::Display for DiffWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeChanged {
                table,
                column,
                from,
                to,
            } => write!(f, "type of {table}.{column} changed from {from} to {to}"),
            Self::PrimaryKeyChanged { table } => write!(f, "primary key of {table} changed"),
            Self::UniqueChanged { table, columns } => {
                write!(f, "unique constraint on {table}({}) changed", columns.join(", "))
            }
            Self::DefaultChanged { table, column } => {
                write!(f, "default of {table}.{column} changed")
            }
            Self::PossibleRename { table, from, to } => {
                write!(f, "{table}.{from} may have been renamed to {table}.{to}")
            }
        }
    }
}

/// Result of comparing two schemas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Operations to apply, in order.
    pub operations: Vec<DdlOperation>,
    /// Destructive operations the allow-list did not permit.
    pub blocked: Vec<DdlOperation>,
    /// Differences left untouched.
    pub warnings: Vec<DiffWarning>,
}

impl SchemaDiff {
    /// True when there is nothing to apply and nothing blocked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.blocked.is_empty()
    }

    /// Returns the operations, refusing if anything was blocked.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequiresConfirmation`] listing the blocked
    /// operations.
    pub fn confirmed(self) -> Result<Vec<DdlOperation>> {
        if self.blocked.is_empty() {
            Ok(self.operations)
        } else {
            Err(Error::RequiresConfirmation {
                operations: self.blocked.iter().map(ToString::to_string).collect(),
            })
        }
    }
}

// ================================================================
// Schema-level diff
// ================================================================

#[derive(Default)]
struct Buckets {
    drop_fks: Vec<DdlOperation>,
    creates: Vec<DdlOperation>,
    add_columns: Vec<DdlOperation>,
    nullability: Vec<DdlOperation>,
    add_fks: Vec<DdlOperation>,
    drop_columns: Vec<DdlOperation>,
    drop_tables: Vec<DdlOperation>,
}

impl Buckets {
    fn into_ordered(self) -> Vec<DdlOperation> {
        let mut ops = self.drop_fks;
        ops.extend(self.creates);
        ops.extend(self.add_columns);
        ops.extend(self.nullability);
        ops.extend(self.add_fks);
        ops.extend(self.drop_columns);
        ops.extend(self.drop_tables);
        ops
    }
}

/// Computes the operations that turn `actual` into `desired`.
///
/// Operation order: DropForeignKey, CreateTable (foreign-key dependency
/// order, references closing a cycle deferred to AddForeignKey),
/// AddColumn, AlterColumnNullability, AddForeignKey, DropColumn,
/// DropTable (referencing tables first). Within a group, tables and
/// columns otherwise keep schema order.
#[must_use]
pub fn diff_schemas(desired: &Schema, actual: &Schema, allow: &AllowList) -> SchemaDiff {
    let mut buckets = Buckets::default();
    let mut warnings = Vec::new();

    let new_tables: Vec<_> = desired
        .tables()
        .filter(|t| actual.get(t.name()).is_none())
        .collect();
    for (table, deferred) in dependency_order(new_tables) {
        buckets
            .creates
            .push(DdlOperation::CreateTable(table.without_foreign_keys(&deferred)));
        for column in deferred {
            if let Some(reference) = table.column(&column).and_then(|c| c.references.clone()) {
                buckets.add_fks.push(DdlOperation::AddForeignKey {
                    table: table.name().to_string(),
                    column,
                    reference,
                });
            }
        }
    }

    for table in desired.tables() {
        if let Some(live) = actual.get(table.name()) {
            diff_table(table, live, &mut buckets, &mut warnings);
        }
    }

    // Referencing tables go before the tables they reference. A reference
    // that closes a cycle is dropped first.
    let dropped: Vec<_> = actual
        .tables()
        .filter(|t| desired.get(t.name()).is_none())
        .collect();
    for (table, deferred) in dependency_order(dropped).into_iter().rev() {
        let drop = DdlOperation::DropTable(table.name().to_string());
        if allow.permits(&drop) {
            for column in deferred {
                if let Some(reference) = table.column(&column).and_then(|c| c.references.clone()) {
                    buckets.drop_fks.push(DdlOperation::DropForeignKey {
                        table: table.name().to_string(),
                        column,
                        reference,
                    });
                }
            }
        }
        buckets.drop_tables.push(drop);
    }

    let (operations, blocked): (Vec<_>, Vec<_>) = buckets
        .into_ordered()
        .into_iter()
        .partition(|op| allow.permits(op));

    for op in &blocked {
        warn!(operation = %op, "Destructive change blocked");
    }
    for warning in &warnings {
        warn!(warning = %warning, "Schema difference not applied");
    }
    info!(
        operations = operations.len(),
        blocked = blocked.len(),
        warnings = warnings.len(),
        "Computed schema diff"
    );

    SchemaDiff {
        operations,
        blocked,
        warnings,
    }
}

fn diff_table(desired: &Table, live: &Table, buckets: &mut Buckets, warnings: &mut Vec<DiffWarning>) {
    let name = desired.name().to_string();
    let mut added: Vec<&Column> = Vec::new();

    for column in desired.columns() {
        let Some(current) = live.column(&column.name) else {
            added.push(column);
            buckets.add_columns.push(DdlOperation::AddColumn {
                table: name.clone(),
                column: column.clone(),
            });
            continue;
        };

        if current.ty != column.ty {
            warnings.push(DiffWarning::TypeChanged {
                table: name.clone(),
                column: column.name.clone(),
                from: current.ty,
                to: column.ty,
            });
        }
        if current.default != column.default {
            warnings.push(DiffWarning::DefaultChanged {
                table: name.clone(),
                column: column.name.clone(),
            });
        }
        if current.unique != column.unique && !column.primary_key && !current.primary_key {
            warnings.push(DiffWarning::UniqueChanged {
                table: name.clone(),
                columns: vec![column.name.clone()],
            });
        }
        // Primary key columns are NOT NULL by construction
        if current.nullable != column.nullable && !column.primary_key && !current.primary_key {
            buckets.nullability.push(DdlOperation::AlterColumnNullability {
                table: name.clone(),
                column: column.clone(),
                nullable: column.nullable,
            });
        }
        if current.references != column.references {
            if let Some(ref reference) = current.references {
                buckets.drop_fks.push(DdlOperation::DropForeignKey {
                    table: name.clone(),
                    column: column.name.clone(),
                    reference: reference.clone(),
                });
            }
            if let Some(ref reference) = column.references {
                buckets.add_fks.push(DdlOperation::AddForeignKey {
                    table: name.clone(),
                    column: column.name.clone(),
                    reference: reference.clone(),
                });
            }
        }
    }

    let key = |t: &Table| -> Vec<String> {
        t.primary_key_columns().iter().map(|c| c.name.clone()).collect()
    };
    if key(desired) != key(live) || autoincrement_changed(desired, live) {
        warnings.push(DiffWarning::PrimaryKeyChanged { table: name.clone() });
    }

    let composite_unique = |t: &Table| -> BTreeSet<Vec<String>> {
        t.constraints()
            .iter()
            .filter(|c| matches!(c, TableConstraint::Unique { .. }))
            .map(|c| c.columns().to_vec())
            .collect()
    };
    let (wanted, present) = (composite_unique(desired), composite_unique(live));
    for columns in wanted.symmetric_difference(&present) {
        warnings.push(DiffWarning::UniqueChanged {
            table: name.clone(),
            columns: columns.clone(),
        });
    }

    let mut dropped: Vec<&Column> = Vec::new();
    for current in live.columns() {
        if desired.column(&current.name).is_none() {
            dropped.push(current);
            buckets.drop_columns.push(DdlOperation::DropColumn {
                table: name.clone(),
                column: current.name.clone(),
            });
        }
    }

    warnings.extend(possible_renames(&name, &dropped, &added));
}

fn autoincrement_changed(desired: &Table, live: &Table) -> bool {
    let flags = |t: &Table| -> BTreeMap<String, bool> {
        t.columns()
            .iter()
            .map(|c| (c.name.clone(), c.autoincrement))
            .collect()
    };
    let (wanted, present) = (flags(desired), flags(live));
    wanted
        .iter()
        .any(|(name, flag)| present.get(name).is_some_and(|p| p != flag))
}

/// Pairs each dropped column with its most similar added column of the
/// same type.
fn possible_renames(table: &str, dropped: &[&Column], added: &[&Column]) -> Vec<DiffWarning> {
    let mut taken: BTreeSet<&str> = BTreeSet::new();
    let mut out = Vec::new();
    for old in dropped {
        let best = added
            .iter()
            .filter(|new| new.ty == old.ty && !taken.contains(new.name.as_str()))
            .map(|new| (new, strsim::normalized_levenshtein(&old.name, &new.name)))
            .filter(|(_, score)| *score >= RENAME_SIMILARITY_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((new, _)) = best {
            taken.insert(new.name.as_str());
            out.push(DiffWarning::PossibleRename {
                table: table.to_string(),
                from: old.name.clone(),
                to: new.name.clone(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, text, varchar, ForeignKeyAction, TableBuilder};

    fn users(extra: bool) -> Table {
        let mut builder = TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(varchar("name", 100).not_null());
        if extra {
            builder = builder.column(text("bio"));
        }
        builder.build().unwrap()
    }

    fn posts() -> Table {
        TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(integer("author_id").not_null().references("users", "id"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_identical_schemas() {
        let schema = Schema::new([users(false), posts()]).unwrap();
        let diff = diff_schemas(&schema, &schema, &AllowList::new());
        assert!(diff.is_empty());
        assert!(diff.warnings.is_empty());
    }

    #[test]
    fn test_create_tables_in_dependency_order() {
        let desired = Schema::new([users(false), posts()]).unwrap();
        let diff = diff_schemas(&desired, &Schema::default(), &AllowList::new());
        let names: Vec<&str> = diff.operations.iter().map(DdlOperation::table).collect();
        assert_eq!(names, vec!["users", "posts"]);
    }

    #[test]
    fn test_add_column_and_nullability() {
        let live_users = TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(varchar("name", 100))
            .column(text("legacy"))
            .build()
            .unwrap();
        let actual = Schema::new([live_users]).unwrap();
        let desired = Schema::new([users(true)]).unwrap();

        let diff = diff_schemas(&desired, &actual, &AllowList::new());
        assert!(matches!(
            &diff.operations[0],
            DdlOperation::AddColumn { column, .. } if column.name == "bio"
        ));
        assert!(matches!(
            &diff.operations[1],
            DdlOperation::AlterColumnNullability { nullable: false, .. }
        ));
        assert_eq!(diff.operations.len(), 2);
        assert_eq!(
            diff.blocked,
            vec![DdlOperation::DropColumn {
                table: String::from("users"),
                column: String::from("legacy"),
            }]
        );
    }

    #[test]
    fn test_destructive_changes_require_confirmation() {
        let actual = Schema::new([users(false), posts()]).unwrap();
        let desired = Schema::new([users(false)]).unwrap();

        let diff = diff_schemas(&desired, &actual, &AllowList::new());
        assert!(diff.operations.is_empty());
        let err = diff.confirmed().unwrap_err();
        assert!(
            matches!(err, Error::RequiresConfirmation { ref operations } if operations == &["drop table posts"])
        );

        let allowed = diff_schemas(&desired, &actual, &AllowList::new().allow_drop_table("posts"));
        assert_eq!(
            allowed.confirmed().unwrap(),
            vec![DdlOperation::DropTable(String::from("posts"))]
        );
    }

    #[test]
    fn test_allow_list() {
        let allow = AllowList::new().allow_drop_column("users", "bio");
        let drop_bio = DdlOperation::DropColumn {
            table: String::from("users"),
            column: String::from("bio"),
        };
        let drop_name = DdlOperation::DropColumn {
            table: String::from("users"),
            column: String::from("name"),
        };
        assert!(allow.permits(&drop_bio));
        assert!(!allow.permits(&drop_name));
        assert!(AllowList::new().allow_all().permits(&drop_name));
        assert!(AllowList::new().permits(&DdlOperation::CreateTable(users(false))));
    }

    #[test]
    fn test_foreign_key_change() {
        let actual = Schema::new([users(false), posts()]).unwrap();
        let cascading = TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(
                integer("author_id")
                    .not_null()
                    .references("users", "id")
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .build()
            .unwrap();
        let desired = Schema::new([users(false), cascading]).unwrap();

        let diff = diff_schemas(&desired, &actual, &AllowList::new());
        assert_eq!(diff.operations.len(), 2);
        assert!(matches!(diff.operations[0], DdlOperation::DropForeignKey { .. }));
        assert!(matches!(
            &diff.operations[1],
            DdlOperation::AddForeignKey { reference, .. }
                if reference.on_delete == Some(ForeignKeyAction::Cascade)
        ));
    }

    #[test]
    fn test_cycle_defers_foreign_key() {
        let a = TableBuilder::new("a")
            .column(integer("id").primary_key())
            .column(integer("b_id").references("b", "id"))
            .build()
            .unwrap();
        let b = TableBuilder::new("b")
            .column(integer("id").primary_key())
            .column(integer("a_id").references("a", "id"))
            .build()
            .unwrap();
        let desired = Schema::new([a, b]).unwrap();
        let diff = diff_schemas(&desired, &Schema::default(), &AllowList::new());

        assert_eq!(diff.operations.len(), 3);
        let DdlOperation::CreateTable(first) = &diff.operations[0] else {
            panic!("expected create table");
        };
        assert_eq!(first.name(), "a");
        assert!(first.column("b_id").unwrap().references.is_none());
        assert!(matches!(
            &diff.operations[2],
            DdlOperation::AddForeignKey { table, column, .. } if table == "a" && column == "b_id"
        ));
    }

    #[test]
    fn test_warnings() {
        let actual = Schema::new([TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(varchar("name", 50).not_null())
            .column(text("fullname"))
            .build()
            .unwrap()])
        .unwrap();
        let desired = Schema::new([TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(varchar("name", 100).not_null())
            .column(text("full_name"))
            .build()
            .unwrap()])
        .unwrap();

        let diff = diff_schemas(&desired, &actual, &AllowList::new());
        assert!(diff.warnings.contains(&DiffWarning::TypeChanged {
            table: String::from("users"),
            column: String::from("name"),
            from: ColumnType::Varchar(50),
            to: ColumnType::Varchar(100),
        }));
        assert!(diff.warnings.contains(&DiffWarning::PossibleRename {
            table: String::from("users"),
            from: String::from("fullname"),
            to: String::from("full_name"),
        }));
    }
}
