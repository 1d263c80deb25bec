//! SELECT builder.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{ColumnRef, Expr, IntoOperand, OrderBy, OrderDirection, Projection};
use crate::schema::Table;

use super::{combine_predicate, projections, Combine, IntoTable, Query, Scope};

/// Join kinds, rendered in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT JOIN`
    Left,
    /// `RIGHT JOIN`
    Right,
    /// `FULL OUTER JOIN`
    Full,
    /// `CROSS JOIN`
    Cross,
}

impl JoinKind {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL OUTER JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// One join of a select.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Kind.
    pub kind: JoinKind,
    /// Joined table.
    pub table: Arc<Table>,
    /// Join predicate; `None` only for cross joins.
    pub on: Option<Expr>,
}

/// A validated SELECT plan.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    /// `SELECT DISTINCT` when true.
    pub distinct: bool,
    /// Projected expressions in order.
    pub projection: Vec<Projection>,
    /// Source table.
    pub from: Arc<Table>,
    /// Joins in call order.
    pub joins: Vec<Join>,
    /// WHERE predicate.
    pub where_clause: Option<Expr>,
    /// GROUP BY expressions.
    pub group_by: Vec<Expr>,
    /// HAVING predicate.
    pub having: Option<Expr>,
    /// ORDER BY items.
    pub order_by: Vec<OrderBy>,
    /// LIMIT.
    pub limit: Option<i64>,
    /// OFFSET.
    pub offset: Option<i64>,
}

/// Starts a SELECT with the given projection.
///
/// An empty projection is rejected by [`Select::build`].
pub fn select<P: Into<Projection>>(projection: impl IntoIterator<Item = P>) -> Select {
    Select {
        distinct: false,
        projection: projections(projection),
        from: None,
        joins: Vec::new(),
        where_clause: None,
        group_by: Vec::new(),
        having: None,
        order_by: Vec::new(),
        limit: None,
        offset: None,
    }
}

/// SELECT builder. Every method returns a new builder.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Select {
    distinct: bool,
    projection: Vec<Projection>,
    from: Option<Arc<Table>>,
    joins: Vec<Join>,
    where_clause: Option<Expr>,
    group_by: Vec<Expr>,
    having: Option<Expr>,
    order_by: Vec<OrderBy>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Select {
    fn with(&self, f: impl FnOnce(&mut Self)) -> Self {
        let mut next = self.clone();
        f(&mut next);
        next
    }

    fn scope(&self) -> Option<Scope<'_>> {
        self.from.as_deref().map(|from| {
            Scope::new(std::iter::once(from).chain(self.joins.iter().map(|j| j.table.as_ref())))
        })
    }

    /// Adds `DISTINCT`.
    pub fn distinct(&self) -> Self {
        self.with(|s| s.distinct = true)
    }

    /// Sets the source table.
    pub fn from(&self, table: impl IntoTable) -> Self {
        let table = table.into_table();
        self.with(|s| s.from = Some(table))
    }

    fn join(&self, kind: JoinKind, table: impl IntoTable, on: Option<Expr>) -> Result<Self> {
        let table = table.into_table();
        if let Some(on) = &on {
            on.check_boolean(&format!("{} predicate", kind.as_sql()))?;
        }
        let next = self.with(|s| {
            s.joins.push(Join {
                kind,
                table,
                on: on.clone(),
            });
        });
        if let (Some(scope), Some(on)) = (next.scope(), &on) {
            scope.check(on)?;
        }
        Ok(next)
    }

    /// Adds an `INNER JOIN`.
    ///
    /// # Errors
    ///
    /// - [`Error::TypeMismatch`] if `on` is not boolean.
    /// - [`Error::UnknownColumn`] if `on` references a table outside the
    ///   source and joined tables (checked now when the source is set, and
    ///   always in [`Select::build`]).
    pub fn inner_join(&self, table: impl IntoTable, on: Expr) -> Result<Self> {
        self.join(JoinKind::Inner, table, Some(on))
    }

    /// Adds a `LEFT JOIN`.
    ///
    /// # Errors
    ///
    /// Same as [`Select::inner_join`].
    pub fn left_join(&self, table: impl IntoTable, on: Expr) -> Result<Self> {
        self.join(JoinKind::Left, table, Some(on))
    }

    /// Adds a `RIGHT JOIN`.
    ///
    /// # Errors
    ///
    /// Same as [`Select::inner_join`].
    pub fn right_join(&self, table: impl IntoTable, on: Expr) -> Result<Self> {
        self.join(JoinKind::Right, table, Some(on))
    }

    /// Adds a `FULL OUTER JOIN`.
    ///
    /// # Errors
    ///
    /// Same as [`Select::inner_join`].
    pub fn full_join(&self, table: impl IntoTable, on: Expr) -> Result<Self> {
        self.join(JoinKind::Full, table, Some(on))
    }

    /// Adds a `CROSS JOIN`.
    pub fn cross_join(&self, table: impl IntoTable) -> Self {
        let table = table.into_table();
        self.with(|s| {
            s.joins.push(Join {
                kind: JoinKind::Cross,
                table,
                on: None,
            });
        })
    }

    fn filter(&self, predicate: Expr, combine: Combine) -> Result<Self> {
        let predicate = combine_predicate(self.where_clause.as_ref(), predicate, combine)?;
        Ok(self.with(|s| s.where_clause = Some(predicate)))
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

    /// Sets the GROUP BY list, replacing any previous one.
    pub fn group_by<T: IntoOperand>(&self, exprs: impl IntoIterator<Item = T>) -> Self {
        let exprs: Vec<Expr> = exprs.into_iter().map(IntoOperand::into_operand).collect();
        self.with(|s| s.group_by = exprs)
    }

    /// Sets the HAVING predicate, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the predicate is not boolean.
    pub fn having(&self, predicate: Expr) -> Result<Self> {
        predicate.check_boolean("HAVING predicate")?;
        Ok(self.with(|s| s.having = Some(predicate)))
    }

    /// Appends an ascending ORDER BY item.
    pub fn order_by(&self, expr: impl IntoOperand) -> Self {
        self.order_by_dir(expr, OrderDirection::Asc)
    }

    /// Appends a descending ORDER BY item.
    pub fn order_by_desc(&self, expr: impl IntoOperand) -> Self {
        self.order_by_dir(expr, OrderDirection::Desc)
    }

    /// Appends an ORDER BY item with an explicit direction.
    pub fn order_by_dir(&self, expr: impl IntoOperand, direction: OrderDirection) -> Self {
        let expr = expr.into_operand();
        self.with(|s| s.order_by.push(OrderBy { expr, direction }))
    }

    /// Sets LIMIT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBound`] for negative values.
    pub fn limit(&self, n: i64) -> Result<Self> {
        if n < 0 {
            return Err(Error::InvalidBound {
                clause: "LIMIT",
                value: n,
            });
        }
        Ok(self.with(|s| s.limit = Some(n)))
    }

    /// Sets OFFSET.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBound`] for negative values.
    pub fn offset(&self, n: i64) -> Result<Self> {
        if n < 0 {
            return Err(Error::InvalidBound {
                clause: "OFFSET",
                value: n,
            });
        }
        Ok(self.with(|s| s.offset = Some(n)))
    }

    /// Validates the statement and returns its plan.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyProjection`] without projected expressions.
    /// - [`Error::NoSourceTable`] if [`Select::from`] was never called.
    /// - [`Error::UnknownColumn`] for references outside the source and
    ///   joined tables, or ORDER BY items neither projected nor in scope.
    /// - [`Error::InvalidGrouping`] for non-aggregated columns missing from
    ///   GROUP BY when the query groups or aggregates.
    pub fn build(&self) -> Result<Query> {
        if self.projection.is_empty() {
            return Err(Error::EmptyProjection);
        }
        let Some(from) = self.from.clone() else {
            return Err(Error::NoSourceTable);
        };
        let scope = Scope::new(
            std::iter::once(from.as_ref()).chain(self.joins.iter().map(|j| j.table.as_ref())),
        );

        scope.check_all(self.projection.iter().map(|p| &p.expr))?;
        scope.check_all(self.joins.iter().filter_map(|j| j.on.as_ref()))?;
        scope.check_all(self.where_clause.iter())?;
        scope.check_all(self.group_by.iter())?;
        scope.check_all(self.having.iter())?;
        for item in &self.order_by {
            let projected = self.projection.iter().any(|p| p.expr == item.expr);
            if !projected {
                scope.check(&item.expr)?;
            }
        }

        self.check_grouping()?;

        Ok(Query::Select(SelectPlan {
            distinct: self.distinct,
            projection: self.projection.clone(),
            from,
            joins: self.joins.clone(),
            where_clause: self.where_clause.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
        }))
    }

    fn check_grouping(&self) -> Result<()> {
        let aggregated = self.having.is_some()
            || self.projection.iter().any(|p| p.expr.contains_aggregate());
        if self.group_by.is_empty() && !aggregated {
            return Ok(());
        }

        let grouped = |expr: &Expr| self.group_by.iter().any(|g| g == expr);
        let grouped_col = |col: &ColumnRef| {
            self.group_by
                .iter()
                .any(|g| matches!(g, Expr::Column(c) if c == col))
        };
        let check = |expr: &Expr| -> Result<()> {
            if grouped(expr) {
                return Ok(());
            }
            match expr.bare_columns().into_iter().find(|c| !grouped_col(c)) {
                Some(col) => Err(Error::InvalidGrouping {
                    column: col.qualified_name(),
                }),
                None => Ok(()),
            }
        };

        for p in &self.projection {
            check(&p.expr)?;
        }
        if let Some(having) = &self.having {
            check(having)?;
        }
        for item in &self.order_by {
            check(&item.expr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::count_all;
    use crate::schema::{boolean, integer, varchar, TableBuilder};

    fn users() -> Table {
        TableBuilder::new("users")
            .column(integer("id").primary_key())
            .column(varchar("name", 100).not_null())
            .build()
            .unwrap()
    }

    fn posts() -> Table {
        TableBuilder::new("posts")
            .column(integer("id").primary_key())
            .column(varchar("title", 200).not_null())
            .column(integer("author_id").not_null().references("users", "id"))
            .column(boolean("published").not_null().default(false))
            .build()
            .unwrap()
    }

    fn plan(query: Query) -> SelectPlan {
        match query {
            Query::Select(plan) => plan,
            other => panic!("expected select, got {other:?}"),
        }
    }

    #[test]
    fn test_where_is_last_call_wins() {
        let posts = posts();
        let a = posts.col("id").unwrap().gt(1).unwrap();
        let b = posts.col("published").unwrap().eq(true).unwrap();
        let base = select([posts.col("title").unwrap()]).from(&posts);

        let twice = base.where_clause(a).unwrap().where_clause(b.clone()).unwrap();
        let once = base.where_clause(b).unwrap();
        assert_eq!(twice.build().unwrap(), once.build().unwrap());
    }

    #[test]
    fn test_and_where_combines() {
        let posts = posts();
        let a = posts.col("id").unwrap().gt(1).unwrap();
        let b = posts.col("published").unwrap().eq(true).unwrap();
        let q = select([posts.col("title").unwrap()])
            .from(&posts)
            .where_clause(a.clone())
            .unwrap()
            .and_where(b.clone())
            .unwrap();
        assert_eq!(plan(q.build().unwrap()).where_clause, Some(a.and(b).unwrap()));
    }

    #[test]
    fn test_where_requires_boolean() {
        let posts = posts();
        let err = select([posts.col("title").unwrap()])
            .where_clause(posts.col("id").unwrap().expr())
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn test_missing_from() {
        let posts = posts();
        let err = select([posts.col("title").unwrap()]).build().unwrap_err();
        assert!(matches!(err, Error::NoSourceTable));
    }

    #[test]
    fn test_empty_projection() {
        let posts = posts();
        let err = select(Vec::<Projection>::new()).from(&posts).build().unwrap_err();
        assert!(matches!(err, Error::EmptyProjection));
    }

    #[test]
    fn test_negative_bounds() {
        let posts = posts();
        let base = select([posts.col("title").unwrap()]).from(&posts);
        assert!(matches!(
            base.limit(-1),
            Err(Error::InvalidBound { clause: "LIMIT", value: -1 })
        ));
        assert!(matches!(
            base.offset(-5),
            Err(Error::InvalidBound { clause: "OFFSET", .. })
        ));
        assert!(base.limit(0).is_ok());
    }

    #[test]
    fn test_join_predicate_out_of_scope() {
        let posts = posts();
        let users = users();
        let comments = TableBuilder::new("comments")
            .column(integer("id").primary_key())
            .column(integer("post_id"))
            .build()
            .unwrap();
        let on = comments
            .col("post_id")
            .unwrap()
            .eq(posts.col("id").unwrap())
            .unwrap();
        let err = select([posts.col("title").unwrap()])
            .from(&posts)
            .inner_join(&users, on)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { ref column, .. } if column == "comments.post_id"));
    }

    #[test]
    fn test_join_checked_at_build_when_from_comes_later() {
        let posts = posts();
        let users = users();
        let on = users.col("name").unwrap().eq("x").unwrap();
        let q = select([posts.col("title").unwrap()])
            .inner_join(&users, on)
            .unwrap()
            .from(&posts);
        assert!(q.build().is_ok());

        let stray = TableBuilder::new("tags")
            .column(integer("id").primary_key())
            .build()
            .unwrap();
        let q = select([posts.col("title").unwrap()])
            .inner_join(&users, stray.col("id").unwrap().eq(1).unwrap())
            .unwrap()
            .from(&posts);
        assert!(matches!(q.build(), Err(Error::UnknownColumn { .. })));
    }

    #[test]
    fn test_projection_out_of_scope() {
        let posts = posts();
        let users = users();
        let err = select([users.col("name").unwrap()])
            .from(&posts)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::UnknownColumn { .. }));
    }

    #[test]
    fn test_invalid_grouping() {
        let posts = posts();
        let q = select([
            Projection::from(posts.col("author_id").unwrap()),
            Projection::from(posts.col("title").unwrap()),
        ])
        .from(&posts)
        .group_by([posts.col("author_id").unwrap()]);
        assert!(matches!(
            q.build(),
            Err(Error::InvalidGrouping { ref column }) if column == "posts.title"
        ));
    }

    #[test]
    fn test_valid_grouping_with_aggregate() {
        let posts = posts();
        let q = select([
            Projection::from(posts.col("author_id").unwrap()),
            count_all().alias("n"),
        ])
        .from(&posts)
        .group_by([posts.col("author_id").unwrap()])
        .having(count_all().gt(2).unwrap())
        .unwrap();
        assert!(q.build().is_ok());
    }

    #[test]
    fn test_aggregate_without_group_by() {
        let posts = posts();
        let ok = select([count_all()]).from(&posts).build();
        assert!(ok.is_ok());

        let bad = select([
            Projection::from(posts.col("title").unwrap()),
            Projection::from(count_all()),
        ])
        .from(&posts)
        .build();
        assert!(matches!(bad, Err(Error::InvalidGrouping { .. })));
    }

    #[test]
    fn test_builders_share_base_without_mutation() {
        let posts = posts();
        let base = select([posts.col("title").unwrap()]).from(&posts);
        let limited = base.limit(5).unwrap();
        let ordered = base.order_by(posts.col("id").unwrap());
        assert_eq!(plan(base.build().unwrap()).limit, None);
        assert_eq!(plan(limited.build().unwrap()).limit, Some(5));
        assert!(plan(limited.build().unwrap()).order_by.is_empty());
        assert_eq!(plan(ordered.build().unwrap()).order_by.len(), 1);
    }

    #[test]
    fn test_join_order_preserved() {
        let posts = posts();
        let users = users();
        let tags = TableBuilder::new("tags")
            .column(integer("id").primary_key())
            .column(integer("post_id"))
            .build()
            .unwrap();
        let q = select([posts.col("title").unwrap()])
            .from(&posts)
            .left_join(
                &tags,
                tags.col("post_id").unwrap().eq(posts.col("id").unwrap()).unwrap(),
            )
            .unwrap()
            .inner_join(
                &users,
                posts.col("author_id").unwrap().eq(users.col("id").unwrap()).unwrap(),
            )
            .unwrap();
        let joins = plan(q.build().unwrap()).joins;
        let order: Vec<_> = joins.iter().map(|j| (j.kind, j.table.name().to_string())).collect();
        assert_eq!(
            order,
            vec![
                (JoinKind::Left, String::from("tags")),
                (JoinKind::Inner, String::from("users"))
            ]
        );
    }
}
