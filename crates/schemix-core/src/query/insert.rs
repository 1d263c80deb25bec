//! INSERT builder.
//!
//! Both the mapping form ([`Insert::values`]) and the named form
//! ([`Insert::value`]) store assignments in column declaration order, so
//! they produce equal plans.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{Expr, IntoOperand, Projection};
use crate::schema::Table;

use super::{check_assignment, lookup, mapping_pairs, projections, IntoTable, Query, Scope};

/// What to do when an inserted row conflicts with an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictAction {
    /// `DO NOTHING`
    DoNothing,
    /// `DO UPDATE SET col = excluded.col` for the listed columns.
    DoUpdate(Vec<String>),
}

/// `ON CONFLICT (target) action`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnConflict {
    /// Conflict target columns.
    pub target: Vec<String>,
    /// Action.
    pub action: ConflictAction,
}

/// A validated INSERT plan.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    /// Target table.
    pub table: Arc<Table>,
    /// Assigned columns, in declaration order.
    pub columns: Vec<String>,
    /// One expression per column for each row.
    pub rows: Vec<Vec<Expr>>,
    /// Upsert clause.
    pub on_conflict: Option<OnConflict>,
    /// RETURNING list.
    pub returning: Vec<Projection>,
}

/// Starts an INSERT into `table`.
pub fn insert(table: impl IntoTable) -> Insert {
    Insert {
        table: table.into_table(),
        rows: vec![Vec::new()],
        on_conflict: None,
        returning: Vec::new(),
    }
}

/// INSERT builder. Every method returns a new builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Insert {
    table: Arc<Table>,
    // Each row keeps (declaration index, value) sorted by index.
    rows: Vec<Vec<(usize, Expr)>>,
    on_conflict: Option<OnConflict>,
    returning: Vec<Projection>,
}

impl Insert {
    fn assign(mut self, name: &str, value: Expr) -> Result<Self> {
        let column = lookup(&self.table, name)?;
        check_assignment(&self.table, column, &value)?;
        let index = self.table.position(name).unwrap_or_default();
        let Some(row) = self.rows.last_mut() else {
            return Ok(self);
        };
        match row.binary_search_by_key(&index, |(i, _)| *i) {
            Ok(pos) => row[pos].1 = value,
            Err(pos) => row.insert(pos, (index, value)),
        }
        Ok(self)
    }

    /// Sets one column of the current row (named form).
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownColumn`] if the table has no such column.
    /// - [`Error::TypeMismatch`] if the value does not fit the column.
    pub fn value(&self, column: &str, value: impl IntoOperand) -> Result<Self> {
        self.clone().assign(column, value.into_operand())
    }

    /// Sets several columns of the current row (mapping form).
    ///
    /// # Errors
    ///
    /// Same as [`Insert::value`].
    pub fn values<I, K, V>(&self, mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoOperand,
    {
        mapping_pairs(mapping)
            .into_iter()
            .try_fold(self.clone(), |acc, (name, value)| acc.assign(&name, value))
    }

    /// Starts a new row for a multi-row insert.
    pub fn row(&self) -> Self {
        let mut next = self.clone();
        next.rows.push(Vec::new());
        next
    }

    /// Starts a new row and sets its columns.
    ///
    /// # Errors
    ///
    /// Same as [`Insert::value`].
    pub fn and_values<I, K, V>(&self, mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoOperand,
    {
        self.row().values(mapping)
    }

    fn conflict_target(&self, columns: &[&str]) -> Result<Vec<String>> {
        columns
            .iter()
            .map(|c| lookup(&self.table, c).map(|col| col.name.clone()))
            .collect()
    }

    /// Adds `ON CONFLICT (columns) DO NOTHING`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] for columns the table lacks.
    pub fn on_conflict_do_nothing(&self, columns: &[&str]) -> Result<Self> {
        let target = self.conflict_target(columns)?;
        let mut next = self.clone();
        next.on_conflict = Some(OnConflict {
            target,
            action: ConflictAction::DoNothing,
        });
        Ok(next)
    }

    /// Adds `ON CONFLICT (columns) DO UPDATE SET c = excluded.c` for each
    /// column in `update_columns`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownColumn`] for columns the table lacks. An
    /// empty `update_columns` is rejected by [`Insert::build`].
    pub fn on_conflict_do_update(&self, columns: &[&str], update_columns: &[&str]) -> Result<Self> {
        let target = self.conflict_target(columns)?;
        let updates = self.conflict_target(update_columns)?;
        let mut next = self.clone();
        next.on_conflict = Some(OnConflict {
            target,
            action: ConflictAction::DoUpdate(updates),
        });
        Ok(next)
    }

    /// Sets the RETURNING list.
    pub fn returning<P: Into<Projection>>(&self, items: impl IntoIterator<Item = P>) -> Self {
        let mut next = self.clone();
        next.returning = projections(items);
        next
    }

    /// Validates the statement and returns its plan.
    ///
    /// # Errors
    ///
    /// - [`Error::NoValues`] if a row assigns nothing.
    /// - [`Error::MismatchedRows`] if rows assign different columns.
    /// - [`Error::UnknownColumn`] if RETURNING references another table.
    /// - [`Error::InvalidQuery`] if ON CONFLICT DO UPDATE sets no columns.
    pub fn build(&self) -> Result<Query> {
        let table_name = self.table.name().to_string();
        let first: Vec<usize> = self
            .rows
            .first()
            .map(|row| row.iter().map(|(i, _)| *i).collect())
            .unwrap_or_default();
        if first.is_empty() {
            return Err(Error::NoValues {
                statement: "INSERT",
                table: table_name,
            });
        }
        for (n, row) in self.rows.iter().enumerate().skip(1) {
            if !row.iter().map(|(i, _)| *i).eq(first.iter().copied()) {
                if row.is_empty() {
                    return Err(Error::NoValues {
                        statement: "INSERT",
                        table: table_name,
                    });
                }
                return Err(Error::MismatchedRows {
                    table: table_name,
                    row: n,
                });
            }
        }

        if let Some(OnConflict {
            action: ConflictAction::DoUpdate(columns),
            ..
        }) = &self.on_conflict
        {
            if columns.is_empty() {
                return Err(Error::InvalidQuery(format!(
                    "ON CONFLICT DO UPDATE on '{table_name}' sets no columns"
                )));
            }
        }

        Scope::new([self.table.as_ref()]).check_all(self.returning.iter().map(|p| &p.expr))?;

        let columns = first
            .iter()
            .map(|i| self.table.columns()[*i].name.clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(|(_, e)| e.clone()).collect())
            .collect();

        Ok(Query::Insert(InsertPlan {
            table: Arc::clone(&self.table),
            columns,
            rows,
            on_conflict: self.on_conflict.clone(),
            returning: self.returning.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{boolean, integer, text, varchar, TableBuilder};
    use crate::value::SqlValue;

    fn posts() -> Table {
        TableBuilder::new("posts")
            .column(integer("id").primary_key().autoincrement())
            .column(varchar("title", 20).not_null())
            .column(text("body"))
            .column(boolean("published").not_null().default(false))
            .build()
            .unwrap()
    }

    #[test]
    fn test_mapping_and_named_forms_are_equal() {
        let posts = posts();
        let mapped = insert(&posts)
            .values([("published", SqlValue::Bool(true)), ("title", SqlValue::Text(String::from("x")))])
            .unwrap();
        let named = insert(&posts)
            .value("title", "x")
            .unwrap()
            .value("published", true)
            .unwrap();
        assert_eq!(mapped.build().unwrap(), named.build().unwrap());
    }

    #[test]
    fn test_conflict_update_needs_columns() {
        let posts = posts();
        let upsert = insert(&posts)
            .value("title", "x")
            .unwrap()
            .on_conflict_do_update(&["title"], &[])
            .unwrap();
        assert!(matches!(upsert.build(), Err(Error::InvalidQuery(_))));

        let ignore = insert(&posts)
            .value("title", "x")
            .unwrap()
            .on_conflict_do_nothing(&["title"])
            .unwrap();
        assert!(ignore.build().is_ok());
    }

    #[test]
    fn test_columns_in_declaration_order() {
        let posts = posts();
        let q = insert(&posts)
            .value("published", true)
            .unwrap()
            .value("title", "x")
            .unwrap()
            .build()
            .unwrap();
        let Query::Insert(plan) = q else {
            panic!("expected insert");
        };
        assert_eq!(plan.columns, vec!["title", "published"]);
    }

    #[test]
    fn test_unknown_column_and_type_mismatch() {
        let posts = posts();
        assert!(matches!(
            insert(&posts).value("nope", 1),
            Err(Error::UnknownColumn { .. })
        ));
        assert!(matches!(
            insert(&posts).value("title", 5),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            insert(&posts).value("title", "this title is far too long"),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            insert(&posts).value("title", SqlValue::Null),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(insert(&posts).value("body", SqlValue::Null).is_ok());
    }

    #[test]
    fn test_no_values() {
        let posts = posts();
        assert!(matches!(
            insert(&posts).build(),
            Err(Error::NoValues { statement: "INSERT", .. })
        ));
    }

    #[test]
    fn test_multi_row() {
        let posts = posts();
        let q = insert(&posts)
            .values([("title", "a")])
            .unwrap()
            .and_values([("title", "b")])
            .unwrap()
            .build()
            .unwrap();
        let Query::Insert(plan) = q else {
            panic!("expected insert");
        };
        assert_eq!(plan.rows.len(), 2);

        let err = insert(&posts)
            .values([("title", "a")])
            .unwrap()
            .row()
            .value("body", "b")
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MismatchedRows { row: 1, .. }));
    }

    #[test]
    fn test_on_conflict_columns_checked() {
        let posts = posts();
        let base = insert(&posts).value("title", "a").unwrap();
        assert!(base.on_conflict_do_nothing(&["id"]).is_ok());
        assert!(matches!(
            base.on_conflict_do_update(&["id"], &["missing"]),
            Err(Error::UnknownColumn { .. })
        ));
    }
}
