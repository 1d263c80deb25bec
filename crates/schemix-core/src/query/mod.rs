//! Query plans and their builders.
//!
//! One entry builder per statement kind: [`select`], [`insert`], [`update`]
//! and [`delete`]. Builder methods take `&self` and return a new builder, so
//! a base query can be shared and extended from several places at once.
//! `build()` validates the whole statement and returns an immutable
//! [`Query`] plan for the dialect compiler.
//!
//! ```rust
//! use schemix_core::query::select;
//! use schemix_core::schema::{boolean, integer, varchar, TableBuilder};
//!
//! let posts = TableBuilder::new("posts")
//!     .column(integer("id").primary_key())
//!     .column(varchar("title", 200).not_null())
//!     .column(boolean("published").not_null().default(false))
//!     .build()
//!     .unwrap();
//!
//! let base = select([posts.col("title").unwrap()]).from(&posts);
//! let published = base
//!     .where_clause(posts.col("published").unwrap().eq(true).unwrap())
//!     .unwrap();
//!
//! assert!(base.build().is_ok());
//! assert_ne!(base.build().unwrap(), published.build().unwrap());
//! ```

mod delete;
mod insert;
mod select;
mod update;

pub use delete::{delete, Delete, DeletePlan};
pub use insert::{insert, ConflictAction, Insert, InsertPlan, OnConflict};
pub use select::{select, Join, JoinKind, Select, SelectPlan};
pub use update::{update, Update, UpdatePlan};

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::{ColumnRef, Expr, IntoOperand, Projection};
use crate::schema::{Column, Table};
use crate::types::TypeFamily;
use crate::value::SqlValue;

/// An immutable statement plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// SELECT.
    Select(SelectPlan),
    /// INSERT.
    Insert(InsertPlan),
    /// UPDATE.
    Update(UpdatePlan),
    /// DELETE.
    Delete(DeletePlan),
}

impl Query {
    /// Statement keyword, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "SELECT",
            Self::Insert(_) => "INSERT",
            Self::Update(_) => "UPDATE",
            Self::Delete(_) => "DELETE",
        }
    }
}

/// Anything that can be used as a statement's table.
pub trait IntoTable {
    /// Returns a shared handle to the table.
    fn into_table(self) -> Arc<Table>;
}

impl IntoTable for Arc<Table> {
    fn into_table(self) -> Arc<Table> {
        self
    }
}

impl IntoTable for &Arc<Table> {
    fn into_table(self) -> Arc<Table> {
        Arc::clone(self)
    }
}

impl IntoTable for Table {
    fn into_table(self) -> Arc<Table> {
        Arc::new(self)
    }
}

impl IntoTable for &Table {
    fn into_table(self) -> Arc<Table> {
        Arc::new(self.clone())
    }
}

/// The tables visible to a statement's expressions.
pub(crate) struct Scope<'a> {
    tables: Vec<&'a Table>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(tables: impl IntoIterator<Item = &'a Table>) -> Self {
        Self {
            tables: tables.into_iter().collect(),
        }
    }

    fn describe(&self) -> String {
        let names: Vec<&str> = self.tables.iter().map(|t| t.name()).collect();
        format!("scope [{}]", names.join(", "))
    }

    fn resolves(&self, col: &ColumnRef) -> bool {
        self.tables.iter().any(|t| {
            t.name() == col.table && t.column(&col.name).is_some_and(|c| c.ty == col.ty)
        })
    }

    /// Fails with `UnknownColumn` on the first reference outside the scope.
    pub(crate) fn check(&self, expr: &Expr) -> Result<()> {
        match expr.columns().into_iter().find(|c| !self.resolves(c)) {
            Some(col) => Err(Error::UnknownColumn {
                column: col.qualified_name(),
                scope: self.describe(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn check_all<'e>(&self, exprs: impl IntoIterator<Item = &'e Expr>) -> Result<()> {
        exprs.into_iter().try_for_each(|e| self.check(e))
    }
}

/// Replaces, ANDs or ORs a WHERE predicate.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Combine {
    Replace,
    And,
    Or,
}

pub(crate) fn combine_predicate(
    existing: Option<&Expr>,
    predicate: Expr,
    combine: Combine,
) -> Result<Expr> {
    predicate.check_boolean("WHERE predicate")?;
    match (existing, combine) {
        (None, _) | (Some(_), Combine::Replace) => Ok(predicate),
        (Some(current), Combine::And) => current.clone().and(predicate),
        (Some(current), Combine::Or) => current.clone().or(predicate),
    }
}

/// Checks a value assigned to `column` of `table` by INSERT or UPDATE.
pub(crate) fn check_assignment(table: &Table, column: &Column, value: &Expr) -> Result<()> {
    let context = format!("value for {}.{}", table.name(), column.name);
    if let Expr::Literal(literal) = value {
        if matches!(literal, SqlValue::Null) && !column.nullable {
            return Err(Error::type_mismatch("non-null value", "null", context));
        }
        return column.ty.check_value(literal, &context);
    }
    if let Some(found) = value.family() {
        let expected = column.ty.family();
        let narrowing = expected == TypeFamily::Integer && found == TypeFamily::Float;
        if !expected.is_compatible(found) || narrowing {
            return Err(Error::type_mismatch(column.ty.to_string(), found.as_str(), context));
        }
    }
    Scope::new([table]).check(value)
}

/// Resolves `name` in `table` or fails with `UnknownColumn`.
pub(crate) fn lookup<'t>(table: &'t Table, name: &str) -> Result<&'t Column> {
    table.column(name).ok_or_else(|| Error::UnknownColumn {
        column: name.to_string(),
        scope: format!("table '{}'", table.name()),
    })
}

/// Converts a mapping-form iterator into `(name, expr)` pairs.
pub(crate) fn mapping_pairs<I, K, V>(mapping: I) -> Vec<(String, Expr)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: IntoOperand,
{
    mapping
        .into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.into_operand()))
        .collect()
}

pub(crate) fn projections<P: Into<Projection>>(items: impl IntoIterator<Item = P>) -> Vec<Projection> {
    items.into_iter().map(Into::into).collect()
}
