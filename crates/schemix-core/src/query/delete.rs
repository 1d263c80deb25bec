//! DELETE builder.

use std::sync::Arc;

use crate::error::Result;
use crate::expr::{Expr, Projection};
use crate::schema::Table;

use super::{combine_predicate, projections, Combine, IntoTable, Query, Scope};

/// A validated DELETE plan.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePlan {
    /// Target table.
    pub table: Arc<Table>,
    /// WHERE predicate. `None` deletes every row.
    pub where_clause: Option<Expr>,
    /// RETURNING list.
    pub returning: Vec<Projection>,
}

/// Starts a DELETE from `table`.
pub fn delete(table: impl IntoTable) -> Delete {
    Delete {
        table: table.into_table(),
        where_clause: None,
        returning: Vec::new(),
    }
}

/// DELETE builder. Every method returns a new builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Delete {
    table: Arc<Table>,
    where_clause: Option<Expr>,
    returning: Vec<Projection>,
}

impl Delete {
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
    /// Returns [`crate::Error::TypeMismatch`] if the predicate is not boolean.
    pub fn where_clause(&self, predicate: Expr) -> Result<Self> {
        self.filter(predicate, Combine::Replace)
    }

    /// ANDs a predicate onto the WHERE clause.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeMismatch`] if the predicate is not boolean.
    pub fn and_where(&self, predicate: Expr) -> Result<Self> {
        self.filter(predicate, Combine::And)
    }

    /// ORs a predicate onto the WHERE clause.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TypeMismatch`] if the predicate is not boolean.
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
    /// Returns [`crate::Error::UnknownColumn`] if WHERE or RETURNING
    /// reference another table.
    pub fn build(&self) -> Result<Query> {
        let scope = Scope::new([self.table.as_ref()]);
        scope.check_all(self.where_clause.iter())?;
        scope.check_all(self.returning.iter().map(|p| &p.expr))?;
        Ok(Query::Delete(DeletePlan {
            table: Arc::clone(&self.table),
            where_clause: self.where_clause.clone(),
            returning: self.returning.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::schema::{integer, TableBuilder};

    fn sessions() -> Table {
        TableBuilder::new("sessions")
            .column(integer("id").primary_key())
            .column(integer("user_id").not_null())
            .build()
            .unwrap()
    }

    #[test]
    fn test_delete_with_or_where() {
        let sessions = sessions();
        let id = sessions.col("id").unwrap();
        let q = delete(&sessions)
            .where_clause(id.eq(1).unwrap())
            .unwrap()
            .or_where(id.eq(2).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let Query::Delete(plan) = q else {
            panic!("expected delete");
        };
        assert_eq!(
            plan.where_clause,
            Some(id.eq(1).unwrap().or(id.eq(2).unwrap()).unwrap())
        );
    }

    #[test]
    fn test_delete_where_out_of_scope() {
        let sessions = sessions();
        let other = TableBuilder::new("users")
            .column(integer("id").primary_key())
            .build()
            .unwrap();
        let err = delete(&sessions)
            .where_clause(other.col("id").unwrap().eq(1).unwrap())
            .unwrap()
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }
}
