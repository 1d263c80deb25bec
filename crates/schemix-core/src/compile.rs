//! Query compilation.
//!
//! [`compile`] turns a [`Query`] plan into SQL text for one dialect plus
//! the ordered parameter list. Literals never reach the text: each one is
//! replaced by the dialect's placeholder and appended to the parameters in
//! the order it appears in the output. The same plan and dialect always
//! produce the same bytes.

use tracing::debug;

use crate::dialect::{param_name, Dialect, Feature, PlaceholderStyle};
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, ColumnRef, Expr, OrderDirection, Projection, UnaryOp};
use crate::query::{
    ConflictAction, DeletePlan, InsertPlan, JoinKind, Query, SelectPlan, UpdatePlan,
};
use crate::value::SqlValue;

/// SQL text and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// SQL text with placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<SqlValue>,
    /// Placeholder style used in `sql`.
    pub style: PlaceholderStyle,
}

impl CompiledQuery {
    /// Parameters paired with their names (`p1`, `p2`, ...), matching the
    /// `:name` placeholders of [`PlaceholderStyle::NamedColon`].
    #[must_use]
    pub fn named_params(&self) -> Vec<(String, SqlValue)> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, v)| (param_name(i + 1), v.clone()))
            .collect()
    }
}

/// Compiles a query plan for `dialect`.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedFeature`] when the plan uses a
/// construct the dialect lacks (FULL/RIGHT joins, RETURNING, ON CONFLICT,
/// ILIKE).
///
/// # Example
///
/// ```rust
/// use schemix_core::compile::compile;
/// use schemix_core::dialect::PostgresDialect;
/// use schemix_core::query::delete;
/// use schemix_core::schema::{integer, TableBuilder};
/// use schemix_core::SqlValue;
///
/// let sessions = TableBuilder::new("sessions")
///     .column(integer("id").primary_key())
///     .build()
///     .unwrap();
/// let query = delete(&sessions)
///     .where_clause(sessions.col("id").unwrap().eq(7).unwrap())
///     .unwrap()
///     .build()
///     .unwrap();
///
/// let compiled = compile(&query, &PostgresDialect).unwrap();
/// assert_eq!(compiled.sql, r#"DELETE FROM "sessions" WHERE "id" = $1"#);
/// assert_eq!(compiled.params, vec![SqlValue::Int(7)]);
/// ```
pub fn compile<D: Dialect + ?Sized>(query: &Query, dialect: &D) -> Result<CompiledQuery> {
    let mut writer = SqlWriter::new(dialect);
    match query {
        Query::Select(plan) => writer.select(plan)?,
        Query::Insert(plan) => writer.insert(plan)?,
        Query::Update(plan) => writer.update(plan)?,
        Query::Delete(plan) => writer.delete(plan)?,
    }

    let compiled = CompiledQuery {
        sql: writer.sql,
        params: writer.params,
        style: dialect.placeholder_style(),
    };
    debug!(
        dialect = dialect.name(),
        kind = query.kind(),
        sql = %compiled.sql,
        params = compiled.params.len(),
        "Compiled query"
    );
    Ok(compiled)
}

// Binding strength used for parenthesization. Higher binds tighter.
// Raw SQL is opaque, so it is parenthesized under any operator
const PREC_RAW: u8 = 0;
const PREC_NOT: u8 = 3;
const PREC_PREDICATE: u8 = 4;
const PREC_NEG: u8 = 7;
const PREC_ATOM: u8 = 8;

struct SqlWriter<'d, D: ?Sized> {
    dialect: &'d D,
    sql: String,
    params: Vec<SqlValue>,
    // Single-table statements render bare column names.
    qualify: bool,
}

impl<'d, D: Dialect + ?Sized> SqlWriter<'d, D> {
    const fn new(dialect: &'d D) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
            qualify: true,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn ident(&mut self, name: &str) {
        let quoted = self.dialect.quote_identifier(name);
        self.sql.push_str(&quoted);
    }

    fn idents(&mut self, names: &[String]) {
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(name);
        }
    }

    fn param(&mut self, value: SqlValue) {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }

    fn column(&mut self, column: &ColumnRef) {
        if self.qualify {
            self.ident(&column.table);
            self.push(".");
        }
        self.ident(&column.name);
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn precedence(&self, expr: &Expr) -> u8 {
        match expr {
            Expr::Binary {
                op: BinaryOp::Concat,
                ..
            } if self.dialect.concat_as_function() => PREC_ATOM,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { op, .. } => match op {
                UnaryOp::Not => PREC_NOT,
                UnaryOp::IsNull | UnaryOp::IsNotNull => PREC_PREDICATE,
                UnaryOp::Neg => PREC_NEG,
            },
            Expr::InList { .. } | Expr::Between { .. } => PREC_PREDICATE,
            Expr::Raw(_) => PREC_RAW,
            Expr::Column(_) | Expr::Literal(_) | Expr::Aggregate { .. } => PREC_ATOM,
        }
    }

    fn expr(&mut self, expr: &Expr) -> Result<()> {
        self.expr_at(expr, 0)
    }

    /// Renders `expr`, parenthesized if it binds looser than `min`.
    fn expr_at(&mut self, expr: &Expr, min: u8) -> Result<()> {
        let wrap = self.precedence(expr) < min;
        if wrap {
            self.push("(");
        }
        match expr {
            Expr::Column(column) => self.column(column),
            Expr::Literal(value) => self.param(value.clone()),
            Expr::Raw(sql) => self.push(sql),
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => {
                    self.push("NOT ");
                    self.expr_at(operand, PREC_NOT)?;
                }
                UnaryOp::Neg => {
                    // Strictly tighter so `- -x` never becomes a comment
                    self.push("-");
                    self.expr_at(operand, PREC_ATOM)?;
                }
                UnaryOp::IsNull | UnaryOp::IsNotNull => {
                    self.expr_at(operand, PREC_PREDICATE + 1)?;
                    self.push(if *op == UnaryOp::IsNull {
                        " IS NULL"
                    } else {
                        " IS NOT NULL"
                    });
                }
            },
            Expr::Binary { left, op, right } => self.binary(left, *op, right)?,
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    // Nothing is IN an empty list
                    self.push(if *negated { "1 = 1" } else { "1 = 0" });
                } else {
                    self.expr_at(expr, PREC_PREDICATE + 1)?;
                    self.push(if *negated { " NOT IN (" } else { " IN (" });
                    for (i, item) in list.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.expr(item)?;
                    }
                    self.push(")");
                }
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                self.expr_at(expr, PREC_PREDICATE + 1)?;
                self.push(if *negated {
                    " NOT BETWEEN "
                } else {
                    " BETWEEN "
                });
                self.expr_at(low, PREC_PREDICATE + 1)?;
                self.push(" AND ");
                self.expr_at(high, PREC_PREDICATE + 1)?;
            }
            Expr::Aggregate {
                func,
                arg,
                distinct,
            } => {
                self.push(func.as_sql());
                self.push("(");
                if *distinct {
                    self.push("DISTINCT ");
                }
                match arg {
                    Some(arg) => self.expr(arg)?,
                    None => self.push("*"),
                }
                self.push(")");
            }
        }
        if wrap {
            self.push(")");
        }
        Ok(())
    }

    fn binary(&mut self, left: &Expr, op: BinaryOp, right: &Expr) -> Result<()> {
        if op == BinaryOp::Concat && self.dialect.concat_as_function() {
            self.push("CONCAT(");
            self.expr(left)?;
            self.push(", ");
            self.expr(right)?;
            self.push(")");
            return Ok(());
        }
        if matches!(op, BinaryOp::ILike | BinaryOp::NotILike) {
            self.dialect.require(Feature::ILike)?;
        }

        let prec = op.precedence();
        let (left_min, right_min) = match op {
            BinaryOp::And | BinaryOp::Or => (prec, prec),
            // Comparisons do not chain
            _ if prec == PREC_PREDICATE => (prec + 1, prec + 1),
            _ => (prec, prec + 1),
        };
        self.expr_at(left, left_min)?;
        self.push(" ");
        self.push(op.as_sql());
        self.push(" ");
        self.expr_at(right, right_min)
    }

    fn projections(&mut self, items: &[Projection]) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(&item.expr)?;
            if let Some(ref alias) = item.alias {
                self.push(" AS ");
                self.ident(alias);
            }
        }
        Ok(())
    }

    fn where_clause(&mut self, predicate: Option<&Expr>) -> Result<()> {
        if let Some(predicate) = predicate {
            self.push(" WHERE ");
            self.expr(predicate)?;
        }
        Ok(())
    }

    fn returning(&mut self, items: &[Projection]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        self.dialect.require(Feature::Returning)?;
        self.push(" RETURNING ");
        self.projections(items)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn select(&mut self, plan: &SelectPlan) -> Result<()> {
        self.push("SELECT ");
        if plan.distinct {
            self.push("DISTINCT ");
        }
        self.projections(&plan.projection)?;

        self.push(" FROM ");
        self.ident(plan.from.name());

        for join in &plan.joins {
            match join.kind {
                JoinKind::Right => self.dialect.require(Feature::RightJoin)?,
                JoinKind::Full => self.dialect.require(Feature::FullOuterJoin)?,
                JoinKind::Inner | JoinKind::Left | JoinKind::Cross => {}
            }
            self.push(" ");
            self.push(join.kind.as_sql());
            self.push(" ");
            self.ident(join.table.name());
            if let Some(ref on) = join.on {
                self.push(" ON ");
                self.expr(on)?;
            }
        }

        self.where_clause(plan.where_clause.as_ref())?;

        if !plan.group_by.is_empty() {
            self.push(" GROUP BY ");
            for (i, expr) in plan.group_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(expr)?;
            }
        }

        if let Some(ref having) = plan.having {
            self.push(" HAVING ");
            self.expr(having)?;
        }

        if !plan.order_by.is_empty() {
            self.push(" ORDER BY ");
            for (i, item) in plan.order_by.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(&item.expr)?;
                if item.direction == OrderDirection::Desc {
                    self.push(" DESC");
                }
            }
        }

        match (plan.limit, plan.offset) {
            (Some(limit), offset) => {
                self.push(" LIMIT ");
                self.param(SqlValue::Int(limit));
                if let Some(offset) = offset {
                    self.push(" OFFSET ");
                    self.param(SqlValue::Int(offset));
                }
            }
            (None, Some(offset)) => {
                if let Some(all) = self.dialect.offset_without_limit() {
                    self.push(" LIMIT ");
                    self.push(all);
                }
                self.push(" OFFSET ");
                self.param(SqlValue::Int(offset));
            }
            (None, None) => {}
        }
        Ok(())
    }

    fn insert(&mut self, plan: &InsertPlan) -> Result<()> {
        self.qualify = false;
        self.push("INSERT INTO ");
        self.ident(plan.table.name());
        self.push(" (");
        self.idents(&plan.columns);
        self.push(") VALUES ");
        for (i, row) in plan.rows.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push("(");
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    self.push(", ");
                }
                self.expr(value)?;
            }
            self.push(")");
        }

        if let Some(ref conflict) = plan.on_conflict {
            self.dialect.require(Feature::OnConflict)?;
            self.push(" ON CONFLICT");
            if !conflict.target.is_empty() {
                self.push(" (");
                self.idents(&conflict.target);
                self.push(")");
            }
            match &conflict.action {
                ConflictAction::DoUpdate(columns) if columns.is_empty() => {
                    return Err(Error::InvalidQuery(String::from(
                        "ON CONFLICT DO UPDATE sets no columns",
                    )));
                }
                ConflictAction::DoUpdate(columns) => {
                    self.push(" DO UPDATE SET ");
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.ident(column);
                        self.push(" = excluded.");
                        self.ident(column);
                    }
                }
                ConflictAction::DoNothing => self.push(" DO NOTHING"),
            }
        }

        self.returning(&plan.returning)
    }

    fn update(&mut self, plan: &UpdatePlan) -> Result<()> {
        self.qualify = false;
        self.push("UPDATE ");
        self.ident(plan.table.name());
        self.push(" SET ");
        for (i, (column, value)) in plan.assignments.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.ident(column);
            self.push(" = ");
            self.expr(value)?;
        }
        self.where_clause(plan.where_clause.as_ref())?;
        self.returning(&plan.returning)
    }

    fn delete(&mut self, plan: &DeletePlan) -> Result<()> {
        self.qualify = false;
        self.push("DELETE FROM ");
        self.ident(plan.table.name());
        self.where_clause(plan.where_clause.as_ref())?;
        self.returning(&plan.returning)
    }
}
