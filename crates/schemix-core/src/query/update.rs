//! UPDATE builder.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{Expr, IntoOperand, Projection};
use crate::schema::Table;

use super::{
    check_assignment, combine_predicate, lookup, mapping_pairs, projections, Combine, IntoTable,
    Query, Scope,
};

/// A validated UPDATE plan.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// Target table.
    pub table: Arc<Table>,
    /// `SET` assignments in declaration order.
    pub assignments: Vec<(String, Expr)>,
    /// WHERE predicate.
    pub where_clause: Option<Expr>,
    /// RETURNING list.
    pub returning: Vec<Projection>,
}

/// Starts an UPDATE of `table`.
pub fn update(table: impl IntoTable) -> Update {
    Update {
        table: table.into_table(),
        assignments: Vec::new(),
        where_clause: None,
        returning: Vec::new(),
    }
}

/// UPDATE builder. Every method returns a new builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Update {
    table: Arc<Table>,
    assignments: Vec<(usize, Expr)>,
    where_clause: Option<Expr>,
    returning: Vec<Projection>,
}

impl Update {
    fn assign(mut self, name: &str, value: Expr) -> Result<Self> {
        let column = lookup(&self.table, name)?;
        check_assignment(&self.table, column, &value)?;
        let index = self.table.position(name).unwrap_or_default();
        match self.assignments.binary_search_by_key(&index, |(i, _)| *i) {
            Ok(pos) => self.assignments[pos].1 = value,
            Err(pos) => self.assignments.insert(pos, (index, value)),
        }
        Ok(self)
    }

    /// Assigns one column (named form).
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownColumn`] if the table has no such column, or the
    ///   value references another table.
    /// - [`Error::TypeMismatch`] if the value does not fit the column.
    pub fn set(&self, column: &str, value: impl IntoOperand) -> Result<Self> {
        self.clone().assign(column, value.into_operand())
    }

    /// Assigns several columns (mapping form).
    ///
    /// # Errors
    ///
    /// Same as [`Update::set`].
    pub fn set_all<I, K, V>(&self, mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: IntoOperand,
    {
        mapping_pairs(mapping)
            .into_iter()
            .try_fold(self.clone(), |acc, (name, value)| acc.assign(&name, value))
    }

    fn filter(&self, predicate: Expr, combine: Combine) -> Result<Self> {
        let predicate = combine_predicate(self.where_clause.as_ref(), predicate, combine)?;
        let mut next = self.clone();
        next.where_clause = Some(predicate);
        Ok(next)
    }

    /// Sets the WHERE predicate, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the predicate is not boolean.
    pub fn where_clause(&self, predicate: Expr) -> Result<Self> {
        self.filter(predicate, Combine::Replace)
    }

    /// ANDs a predicate onto the WHERE clause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the predicate is not boolean.
    pub fn and_where(&self, predicate: Expr) -> Result<Self> {
        self.filter(predicate, Combine::And)
    }

    /// ORs a predicate onto the WHERE clause.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the predicate is not boolean.
    pub fn or_where(&self, predicate: Expr) -> Result<Self> {
        self.filter(predicate, Combine::Or)
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
    /// - [`Error::NoValues`] without assignments.
    /// - [`Error::UnknownColumn`] if WHERE or RETURNING reference another table.
    pub fn build(&self) -> Result<Query> {
        if self.assignments.is_empty() {
            return Err(Error::NoValues {
                statement: "UPDATE",
                table: self.table.name().to_string(),
            });
        }
        let scope = Scope::new([self.table.as_ref()]);
        scope.check_all(self.where_clause.iter())?;
        scope.check_all(self.returning.iter().map(|p| &p.expr))?;

        let assignments = self
            .assignments
            .iter()
            .map(|(i, e)| (self.table.columns()[*i].name.clone(), e.clone()))
            .collect();

        Ok(Query::Update(UpdatePlan {
            table: Arc::clone(&self.table),
            assignments,
            where_clause: self.where_clause.clone(),
            returning: self.returning.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{integer, varchar, TableBuilder};

    fn users() -> Table {
        TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(varchar("name", 100).not_null())
            .column(integer("logins").not_null().default(0))
            .build()
            .unwrap()
    }

    #[test]
    fn test_set_and_set_all_are_equal() {
        let users = users();
        let named = update(&users)
            .set("logins", 3)
            .unwrap()
            .set("name", "bob")
            .unwrap();
        let mapped = update(&users)
            .set_all([("name", crate::value::SqlValue::Text(String::from("bob")))])
            .unwrap()
            .set("logins", 3)
            .unwrap();
        assert_eq!(named.build().unwrap(), mapped.build().unwrap());
    }

    #[test]
    fn test_set_expression_on_own_column() {
        let users = users();
        let logins = users.col("logins").unwrap();
        let q = update(&users).set("logins", logins.add(1).unwrap()).unwrap();
        assert!(q.build().is_ok());
    }

    #[test]
    fn test_set_expression_from_other_table() {
        let users = users();
        let other = TableBuilder::new("other")
            .column(integer("n").primary_key())
            .build()
            .unwrap();
        let err = update(&users)
            .set("logins", other.col("n").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn test_update_without_values() {
        let users = users();
        assert!(matches!(
            update(&users).build(),
            Err(Error::NoValues { statement: "UPDATE", .. })
        ));
    }

    #[test]
    fn test_where_replaces() {
        let users = users();
        let id = users.col("id").unwrap();
        let base = update(&users).set("name", "x").unwrap();
        let twice = base
            .where_clause(id.eq(1).unwrap())
            .unwrap()
            .where_clause(id.eq(2).unwrap())
            .unwrap();
        let once = base.where_clause(id.eq(2).unwrap()).unwrap();
        assert_eq!(twice.build().unwrap(), once.build().unwrap());
    }
}
