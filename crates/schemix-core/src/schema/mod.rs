//! Schema model: columns, tables and the schema registry.
//!
//! Tables reference each other by name only. A [`Schema`] is the
//! arena that resolves those names; it validates every cross-table foreign
//! key when it is created and is immutable afterwards. The process-wide
//! [`Registry`] swaps whole schemas atomically.

mod column;
mod table;

pub use column::{
    bigint, boolean, char, date, integer, json, jsonb, numeric, real, smallint, text, time,
    timestamp, timestamptz, varchar, Column, ColumnBuilder, ColumnDefault, ForeignKey,
    ForeignKeyAction,
};
pub use table::{table_name_for, Table, TableBuilder, TableConstraint};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Checks one foreign key against its resolved target table.
pub(crate) fn check_reference(
    table: &Table,
    col: &Column,
    fk: &ForeignKey,
    target: &Table,
) -> Result<()> {
    let invalid = |reason: String| Error::InvalidForeignKey {
        table: table.name().to_string(),
        column: col.name.clone(),
        reason,
    };
    let Some(target_col) = target.column(&fk.column) else {
        return Err(invalid(format!(
            "referenced column {}.{} does not exist",
            fk.table, fk.column
        )));
    };
    if target_col.ty.family() != col.ty.family() {
        return Err(invalid(format!(
            "type {} is incompatible with referenced {}.{} of type {}",
            col.ty, fk.table, fk.column, target_col.ty
        )));
    }
    if !target.is_unique_key(&fk.column) {
        return Err(invalid(format!(
            "referenced column {}.{} is neither a primary key nor unique",
            fk.table, fk.column
        )));
    }
    Ok(())
}

/// An immutable, name-ordered set of tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Table>", try_from = "Vec<Table>")]
pub struct Schema {
    tables: BTreeMap<String, Arc<Table>>,
}

impl Schema {
    /// Creates a schema, validating every foreign key.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateTable`] if two tables share a name.
    /// - [`Error::InvalidForeignKey`] if a reference targets a missing table,
    ///   a missing or non-unique column, or a column of another type family.
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Result<Self> {
        let schema = Self::lenient(tables)?;
        for table in schema.tables.values() {
            for (col, fk) in table.foreign_keys() {
                let Some(target) = schema.tables.get(&fk.table) else {
                    return Err(Error::InvalidForeignKey {
                        table: table.name().to_string(),
                        column: col.name.clone(),
                        reason: format!("referenced table '{}' does not exist", fk.table),
                    });
                };
                check_reference(table, col, fk, target)?;
            }
        }
        Ok(schema)
    }

    /// Creates a schema without resolving foreign keys.
    ///
    /// Used for introspected databases, which may legitimately hold
    /// dangling references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTable`] if two tables share a name.
    pub fn lenient(tables: impl IntoIterator<Item = Table>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for table in tables {
            let name = table.name().to_string();
            if map.insert(name.clone(), Arc::new(table)).is_some() {
                return Err(Error::DuplicateTable(name));
            }
        }
        Ok(Self { tables: map })
    }

    /// Looks up a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTable`] if the schema has no such table.
    pub fn table(&self, name: &str) -> Result<&Arc<Table>> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Looks up a table, returning `None` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Table>> {
        self.tables.get(name)
    }

    /// Iterates tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.values()
    }

    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// True if the schema has no tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Orders tables so that referenced tables come before the tables that
    /// reference them. Ties and cycles are broken by name, so the order is
    /// deterministic.
    ///
    /// Each entry carries the foreign-key columns whose target is not yet
    /// created at that point (the edges that close a cycle).
    #[must_use]
    pub fn dependency_order(&self) -> Vec<(&Arc<Table>, Vec<String>)> {
        dependency_order(self.tables.values())
    }
}

/// Topological order over `tables`, treating references to tables outside
/// the set as satisfied.
pub(crate) fn dependency_order<'a>(
    tables: impl IntoIterator<Item = &'a Arc<Table>>,
) -> Vec<(&'a Arc<Table>, Vec<String>)> {
    let pending_tables: BTreeMap<&str, &Arc<Table>> =
        tables.into_iter().map(|t| (t.name(), t)).collect();
    let mut pending: BTreeSet<&str> = pending_tables.keys().copied().collect();
    let mut order = Vec::with_capacity(pending.len());

    let waits_on = |table: &Table, pending: &BTreeSet<&str>| -> Vec<String> {
        table
            .foreign_keys()
            .into_iter()
            .filter(|(_, fk)| {
                fk.table != table.name() && pending.contains(fk.table.as_str())
            })
            .map(|(col, _)| col.name.clone())
            .collect()
    };

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .copied()
            .find(|name| waits_on(pending_tables[name], &pending).is_empty());
        // In a cycle, take the first pending table by name and defer its
        // unsatisfied references.
        let (name, deferred) = match ready {
            Some(name) => (name, Vec::new()),
            None => {
                let Some(name) = pending.iter().copied().next() else {
                    break;
                };
                (name, waits_on(pending_tables[name], &pending))
            }
        };
        pending.remove(name);
        order.push((pending_tables[name], deferred));
    }
    order
}

impl From<Schema> for Vec<Table> {
    fn from(schema: Schema) -> Self {
        schema
            .tables
            .into_values()
            .map(|t| Arc::try_unwrap(t).unwrap_or_else(|shared| (*shared).clone()))
            .collect()
    }
}

impl TryFrom<Vec<Table>> for Schema {
    type Error = Error;

    fn try_from(tables: Vec<Table>) -> Result<Self> {
        Self::new(tables)
    }
}

/// Holder of the current schema.
///
/// Readers take a snapshot with [`Registry::current`] and keep using it even
/// if a new schema is installed meanwhile; [`Registry::install`] replaces
/// the whole schema at once, never individual tables.
#[derive(Debug, Default)]
pub struct Registry {
    current: RwLock<Arc<Schema>>,
}

impl Registry {
    /// Creates a registry holding `schema`.
    #[must_use]
    pub fn new(schema: Schema) -> Self {
        Self {
            current: RwLock::new(Arc::new(schema)),
        }
    }

    /// Returns the process-wide registry, empty until a schema is installed.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Self::default)
    }

    /// Returns a snapshot of the current schema.
    #[must_use]
    pub fn current(&self) -> Arc<Schema> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replaces the schema, returning the previous one.
    pub fn install(&self, schema: Schema) -> Arc<Schema> {
        let tables = schema.len();
        let next = Arc::new(schema);
        let previous = {
            let mut guard = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *guard, next)
        };
        info!(tables, "Installed schema");
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        TableBuilder::new("users")
            .column(integer("id").primary_key().autoincrement())
            .column(varchar("name", 100).not_null())
            .build()
            .unwrap()
    }

    fn posts() -> Table {
        TableBuilder::new("posts")
            .column(integer("id").primary_key().autoincrement())
            .column(varchar("title", 200).not_null())
            .column(
                integer("author_id")
                    .not_null()
                    .references("users", "id")
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_schema_resolves_references() {
        let schema = Schema::new([posts(), users()]).unwrap();
        assert_eq!(schema.len(), 2);
        let names: Vec<_> = schema.tables().map(|t| t.name().to_string()).collect();
        assert_eq!(names, vec!["posts", "users"]);
        assert!(schema.table("users").is_ok());
        assert!(matches!(schema.table("nope"), Err(Error::UnknownTable(_))));
    }

    #[test]
    fn test_missing_reference_target() {
        let err = Schema::new([posts()]).unwrap_err();
        assert!(matches!(err, Error::InvalidForeignKey { .. }));
        assert!(Schema::lenient([posts()]).is_ok());
    }

    #[test]
    fn test_incompatible_reference_type() {
        let bad = TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(text("author_id").references("users", "id"))
            .build()
            .unwrap();
        let err = Schema::new([users(), bad]).unwrap_err();
        assert!(matches!(err, Error::InvalidForeignKey { .. }));
    }

    #[test]
    fn test_duplicate_table() {
        let err = Schema::new([users(), users()]).unwrap_err();
        assert!(matches!(err, Error::DuplicateTable(ref n) if n == "users"));
    }

    #[test]
    fn test_dependency_order() {
        let schema = Schema::new([posts(), users()]).unwrap();
        let order: Vec<_> = schema
            .dependency_order()
            .into_iter()
            .map(|(t, deferred)| (t.name().to_string(), deferred))
            .collect();
        assert_eq!(
            order,
            vec![
                (String::from("users"), vec![]),
                (String::from("posts"), vec![])
            ]
        );
    }

    #[test]
    fn test_dependency_order_breaks_cycles_by_name() {
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
        let schema = Schema::new([b, a]).unwrap();
        let order = schema.dependency_order();
        assert_eq!(order[0].0.name(), "a");
        assert_eq!(order[0].1, vec![String::from("b_id")]);
        assert_eq!(order[1].0.name(), "b");
        assert!(order[1].1.is_empty());
    }

    #[test]
    fn test_registry_swaps_whole_schema() {
        let registry = Registry::new(Schema::new([users()]).unwrap());
        let before = registry.current();
        let previous = registry.install(Schema::new([users(), posts()]).unwrap());
        assert_eq!(before.len(), 1);
        assert_eq!(previous.len(), 1);
        assert_eq!(registry.current().len(), 2);
    }

    #[test]
    fn test_schema_json_round_trip() {
        let schema = Schema::new([users(), posts()]).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        let back: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
