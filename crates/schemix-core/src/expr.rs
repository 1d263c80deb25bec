//! Type-checked expression trees.
//!
//! Expressions are immutable: every combinator consumes its operands and
//! returns a new node whose children are shared through [`Arc`]. Operand
//! types are checked when the node is built, so an ill-typed predicate never
//! reaches the compiler.
//!
//! ```rust
//! use schemix_core::schema::{integer, varchar, TableBuilder};
//!
//! let users = TableBuilder::new("users")
//!     .column(integer("id").primary_key())
//!     .column(varchar("name", 100).not_null())
//!     .build()
//!     .unwrap();
//!
//! let id = users.col("id").unwrap();
//! let name = users.col("name").unwrap();
//!
//! assert!(id.gt(10).is_ok());
//! assert!(name.eq("alice").is_ok());
//! // Comparing a varchar column with an integer is rejected up front.
//! assert!(name.eq(42).is_err());
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ColumnType, TypeFamily};
use crate::value::{SqlValue, ToSqlValue};

/// A reference to a declared column, carrying enough type information to
/// check combinators without a schema lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Owning table name.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: ColumnType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
}

impl ColumnRef {
    /// Creates a column reference.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        name: impl Into<String>,
        ty: ColumnType,
        nullable: bool,
    ) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            ty,
            nullable,
        }
    }

    /// Returns `table.column`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }

    /// Returns the column as an expression.
    #[must_use]
    pub fn expr(&self) -> Expr {
        Expr::Column(self.clone())
    }

    /// Creates an IS NULL expression.
    #[must_use]
    pub fn is_null(&self) -> Expr {
        self.expr().is_null()
    }

    /// Creates an IS NOT NULL expression.
    #[must_use]
    pub fn is_not_null(&self) -> Expr {
        self.expr().is_not_null()
    }

    /// Attaches an alias for use in a projection.
    #[must_use]
    pub fn alias(&self, alias: impl Into<String>) -> Projection {
        self.expr().alias(alias)
    }
}

/// Forwards fallible binary combinators from [`ColumnRef`] to [`Expr`].
macro_rules! forward_binary {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        impl ColumnRef {
            $(
                $(#[$doc])*
                ///
                /// # Errors
                ///
                /// Returns [`Error::TypeMismatch`] if the operand type is incompatible.
                pub fn $name(&self, other: impl IntoOperand) -> Result<Expr> {
                    self.expr().$name(other)
                }
            )*
        }
    };
}

forward_binary! {
    /// Creates an equality expression.
    eq,
    /// Creates an inequality expression.
    not_eq,
    /// Creates a less-than expression.
    lt,
    /// Creates a less-than-or-equal expression.
    lt_eq,
    /// Creates a greater-than expression.
    gt,
    /// Creates a greater-than-or-equal expression.
    gt_eq,
    /// Creates a LIKE expression.
    like,
    /// Creates a NOT LIKE expression.
    not_like,
    /// Creates an ILIKE expression.
    ilike,
    /// Creates a NOT ILIKE expression.
    not_ilike,
    /// Creates an addition.
    add,
    /// Creates a subtraction.
    sub,
    /// Creates a multiplication.
    mul,
    /// Creates a division.
    div,
    /// Creates a modulo.
    rem,
    /// Creates a string concatenation.
    concat,
}

impl ColumnRef {
    /// Creates a BETWEEN expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if a bound is incompatible.
    pub fn between(&self, low: impl IntoOperand, high: impl IntoOperand) -> Result<Expr> {
        self.expr().between(low, high)
    }

    /// Creates an IN expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if a list item is incompatible.
    pub fn in_list<T: IntoOperand>(&self, items: impl IntoIterator<Item = T>) -> Result<Expr> {
        self.expr().in_list(items)
    }

    /// Creates a NOT IN expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if a list item is incompatible.
    pub fn not_in_list<T: IntoOperand>(&self, items: impl IntoIterator<Item = T>) -> Result<Expr> {
        self.expr().not_in_list(items)
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical NOT.
    Not,
    /// Arithmetic negation.
    Neg,
    /// `IS NULL` (postfix).
    IsNull,
    /// `IS NOT NULL` (postfix).
    IsNotNull,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `ILIKE`
    ILike,
    /// `NOT ILIKE`
    NotILike,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `||`
    Concat,
}

impl BinaryOp {
    /// Returns the SQL operator text.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::ILike => "ILIKE",
            Self::NotILike => "NOT ILIKE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Concat => "||",
        }
    }

    /// Binding strength; higher binds tighter.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq
            | Self::NotEq
            | Self::Lt
            | Self::LtEq
            | Self::Gt
            | Self::GtEq
            | Self::Like
            | Self::NotLike
            | Self::ILike
            | Self::NotILike => 4,
            Self::Add | Self::Sub | Self::Concat => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl AggregateFunc {
    /// Returns the SQL function name.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// An immutable SQL expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference.
    Column(ColumnRef),
    /// Literal, always rendered as a bound parameter.
    Literal(SqlValue),
    /// Unary operator application.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Arc<Expr>,
    },
    /// Binary operator application.
    Binary {
        /// Left operand.
        left: Arc<Expr>,
        /// Operator.
        op: BinaryOp,
        /// Right operand.
        right: Arc<Expr>,
    },
    /// `expr [NOT] IN (list)`.
    InList {
        /// Tested expression.
        expr: Arc<Expr>,
        /// Candidates.
        list: Arc<[Expr]>,
        /// `NOT IN` when true.
        negated: bool,
    },
    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        /// Tested expression.
        expr: Arc<Expr>,
        /// Lower bound.
        low: Arc<Expr>,
        /// Upper bound.
        high: Arc<Expr>,
        /// `NOT BETWEEN` when true.
        negated: bool,
    },
    /// Aggregate call. A `COUNT` without argument is `COUNT(*)`.
    Aggregate {
        /// Function.
        func: AggregateFunc,
        /// Argument, `None` only for `COUNT(*)`.
        arg: Option<Arc<Expr>>,
        /// `DISTINCT` inside the call.
        distinct: bool,
    },
    /// Raw SQL fragment, untyped and unchecked.
    ///
    /// **Warning**: never build this from user input.
    Raw(String),
}

/// Anything that can appear as an operand of a combinator.
pub trait IntoOperand {
    /// Converts into an expression node.
    fn into_operand(self) -> Expr;
}

impl IntoOperand for Expr {
    fn into_operand(self) -> Expr {
        self
    }
}

impl IntoOperand for &Expr {
    fn into_operand(self) -> Expr {
        self.clone()
    }
}

impl IntoOperand for ColumnRef {
    fn into_operand(self) -> Expr {
        Expr::Column(self)
    }
}

impl IntoOperand for &ColumnRef {
    fn into_operand(self) -> Expr {
        Expr::Column(self.clone())
    }
}

macro_rules! literal_operand {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOperand for $ty {
                fn into_operand(self) -> Expr {
                    Expr::Literal(self.to_sql_value())
                }
            }
        )*
    };
}

literal_operand!(
    SqlValue,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    &String,
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    serde_json::Value,
);

impl<T: ToSqlValue> IntoOperand for Option<T> {
    fn into_operand(self) -> Expr {
        Expr::Literal(self.to_sql_value())
    }
}

impl Expr {
    /// Creates a literal expression.
    #[must_use]
    pub fn value<T: ToSqlValue>(value: T) -> Self {
        Self::Literal(value.to_sql_value())
    }

    /// Creates a raw SQL expression.
    ///
    /// **Warning**: Only use this for SQL fragments that don't contain user input.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// Returns the type family the expression evaluates to, or `None` when
    /// it is untyped (NULL literals, raw SQL).
    #[must_use]
    pub fn family(&self) -> Option<TypeFamily> {
        match self {
            Self::Column(c) => Some(c.ty.family()),
            Self::Literal(v) => v.family(),
            Self::Unary { op, operand } => match op {
                UnaryOp::Neg => operand.family(),
                UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsNotNull => Some(TypeFamily::Boolean),
            },
            Self::Binary { left, op, right } => match op {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                    match (left.family(), right.family()) {
                        (Some(TypeFamily::Integer), Some(TypeFamily::Integer)) => {
                            Some(TypeFamily::Integer)
                        }
                        (None, None) => None,
                        (Some(TypeFamily::Integer), None) | (None, Some(TypeFamily::Integer)) => {
                            Some(TypeFamily::Integer)
                        }
                        _ => Some(TypeFamily::Float),
                    }
                }
                BinaryOp::Concat => Some(TypeFamily::Text),
                _ => Some(TypeFamily::Boolean),
            },
            Self::InList { .. } | Self::Between { .. } => Some(TypeFamily::Boolean),
            Self::Aggregate { func, arg, .. } => match func {
                AggregateFunc::Count => Some(TypeFamily::Integer),
                AggregateFunc::Avg => Some(TypeFamily::Float),
                AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => {
                    arg.as_ref().and_then(|a| a.family())
                }
            },
            Self::Raw(_) => None,
        }
    }

    /// Returns true if the expression contains an aggregate call.
    #[must_use]
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Self::Aggregate { .. } => true,
            Self::Column(_) | Self::Literal(_) | Self::Raw(_) => false,
            Self::Unary { operand, .. } => operand.contains_aggregate(),
            Self::Binary { left, right, .. } => {
                left.contains_aggregate() || right.contains_aggregate()
            }
            Self::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Self::contains_aggregate)
            }
            Self::Between {
                expr, low, high, ..
            } => expr.contains_aggregate() || low.contains_aggregate() || high.contains_aggregate(),
        }
    }

    /// Collects every column reference in traversal order.
    #[must_use]
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out, false);
        out
    }

    /// Collects the column references that appear outside aggregate calls.
    #[must_use]
    pub fn bare_columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out, true);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>, skip_aggregates: bool) {
        match self {
            Self::Column(c) => out.push(c),
            Self::Literal(_) | Self::Raw(_) => {}
            Self::Unary { operand, .. } => operand.collect_columns(out, skip_aggregates),
            Self::Binary { left, right, .. } => {
                left.collect_columns(out, skip_aggregates);
                right.collect_columns(out, skip_aggregates);
            }
            Self::InList { expr, list, .. } => {
                expr.collect_columns(out, skip_aggregates);
                for item in list.iter() {
                    item.collect_columns(out, skip_aggregates);
                }
            }
            Self::Between {
                expr, low, high, ..
            } => {
                expr.collect_columns(out, skip_aggregates);
                low.collect_columns(out, skip_aggregates);
                high.collect_columns(out, skip_aggregates);
            }
            Self::Aggregate { arg, .. } => {
                if !skip_aggregates {
                    if let Some(arg) = arg {
                        arg.collect_columns(out, skip_aggregates);
                    }
                }
            }
        }
    }

    /// Fails unless the expression is boolean or untyped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] naming `context`.
    pub fn check_boolean(&self, context: &str) -> Result<()> {
        match self.family() {
            None | Some(TypeFamily::Boolean) => Ok(()),
            Some(found) => Err(Error::type_mismatch("boolean", found.as_str(), context)),
        }
    }

    fn binary(self, op: BinaryOp, other: Self) -> Self {
        Self::Binary {
            left: Arc::new(self),
            op,
            right: Arc::new(other),
        }
    }

    fn check_comparable(&self, other: &Self, op: &str, ordered: bool) -> Result<()> {
        let (left, right) = (self.family(), other.family());
        if let (Some(l), Some(r)) = (left, right) {
            if !l.is_compatible(r) {
                return Err(Error::type_mismatch(
                    l.as_str(),
                    r.as_str(),
                    format!("operand of {op}"),
                ));
            }
        }
        if ordered {
            for family in [left, right].into_iter().flatten() {
                if !family.is_ordered() {
                    return Err(Error::type_mismatch(
                        "ordered type",
                        family.as_str(),
                        format!("operand of {op}"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_family(&self, op: &str, accept: impl Fn(TypeFamily) -> bool, expected: &str) -> Result<()> {
        match self.family() {
            Some(found) if !accept(found) => Err(Error::type_mismatch(
                expected,
                found.as_str(),
                format!("operand of {op}"),
            )),
            _ => Ok(()),
        }
    }

    fn compare(self, op: BinaryOp, other: impl IntoOperand) -> Result<Self> {
        let other = other.into_operand();
        let ordered = !matches!(op, BinaryOp::Eq | BinaryOp::NotEq);
        self.check_comparable(&other, op.as_sql(), ordered)?;
        Ok(self.binary(op, other))
    }

    fn pattern(self, op: BinaryOp, other: impl IntoOperand) -> Result<Self> {
        let other = other.into_operand();
        let is_text = |f: TypeFamily| f == TypeFamily::Text;
        self.check_family(op.as_sql(), is_text, "text")?;
        other.check_family(op.as_sql(), is_text, "text")?;
        Ok(self.binary(op, other))
    }

    fn arithmetic(self, op: BinaryOp, other: impl IntoOperand) -> Result<Self> {
        let other = other.into_operand();
        self.check_family(op.as_sql(), TypeFamily::is_numeric, "numeric")?;
        other.check_family(op.as_sql(), TypeFamily::is_numeric, "numeric")?;
        Ok(self.binary(op, other))
    }

    fn logical(self, op: BinaryOp, other: impl IntoOperand) -> Result<Self> {
        let other = other.into_operand();
        self.check_boolean(&format!("left operand of {}", op.as_sql()))?;
        other.check_boolean(&format!("right operand of {}", op.as_sql()))?;
        Ok(self.binary(op, other))
    }

    /// Creates an equality expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the operands are incompatible.
    pub fn eq(self, other: impl IntoOperand) -> Result<Self> {
        self.compare(BinaryOp::Eq, other)
    }

    /// Creates an inequality expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the operands are incompatible.
    pub fn not_eq(self, other: impl IntoOperand) -> Result<Self> {
        self.compare(BinaryOp::NotEq, other)
    }

    /// Creates a less-than expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the operands are incompatible or unordered.
    pub fn lt(self, other: impl IntoOperand) -> Result<Self> {
        self.compare(BinaryOp::Lt, other)
    }

    /// Creates a less-than-or-equal expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the operands are incompatible or unordered.
    pub fn lt_eq(self, other: impl IntoOperand) -> Result<Self> {
        self.compare(BinaryOp::LtEq, other)
    }

    /// Creates a greater-than expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the operands are incompatible or unordered.
    pub fn gt(self, other: impl IntoOperand) -> Result<Self> {
        self.compare(BinaryOp::Gt, other)
    }

    /// Creates a greater-than-or-equal expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if the operands are incompatible or unordered.
    pub fn gt_eq(self, other: impl IntoOperand) -> Result<Self> {
        self.compare(BinaryOp::GtEq, other)
    }

    /// Creates a LIKE expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are text.
    pub fn like(self, pattern: impl IntoOperand) -> Result<Self> {
        self.pattern(BinaryOp::Like, pattern)
    }

    /// Creates a NOT LIKE expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are text.
    pub fn not_like(self, pattern: impl IntoOperand) -> Result<Self> {
        self.pattern(BinaryOp::NotLike, pattern)
    }

    /// Creates a case-insensitive ILIKE expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are text.
    pub fn ilike(self, pattern: impl IntoOperand) -> Result<Self> {
        self.pattern(BinaryOp::ILike, pattern)
    }

    /// Creates a NOT ILIKE expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are text.
    pub fn not_ilike(self, pattern: impl IntoOperand) -> Result<Self> {
        self.pattern(BinaryOp::NotILike, pattern)
    }

    /// Creates a string concatenation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are text.
    pub fn concat(self, other: impl IntoOperand) -> Result<Self> {
        self.pattern(BinaryOp::Concat, other)
    }

    /// Creates an addition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are numeric.
    pub fn add(self, other: impl IntoOperand) -> Result<Self> {
        self.arithmetic(BinaryOp::Add, other)
    }

    /// Creates a subtraction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are numeric.
    pub fn sub(self, other: impl IntoOperand) -> Result<Self> {
        self.arithmetic(BinaryOp::Sub, other)
    }

    /// Creates a multiplication.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are numeric.
    pub fn mul(self, other: impl IntoOperand) -> Result<Self> {
        self.arithmetic(BinaryOp::Mul, other)
    }

    /// Creates a division.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are numeric.
    pub fn div(self, other: impl IntoOperand) -> Result<Self> {
        self.arithmetic(BinaryOp::Div, other)
    }

    /// Creates a modulo.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are numeric.
    pub fn rem(self, other: impl IntoOperand) -> Result<Self> {
        self.arithmetic(BinaryOp::Rem, other)
    }

    /// Creates a negation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless the operand is numeric.
    pub fn neg(self) -> Result<Self> {
        self.check_family("unary -", TypeFamily::is_numeric, "numeric")?;
        Ok(Self::Unary {
            op: UnaryOp::Neg,
            operand: Arc::new(self),
        })
    }

    /// Combines with AND.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are boolean.
    pub fn and(self, other: impl IntoOperand) -> Result<Self> {
        self.logical(BinaryOp::And, other)
    }

    /// Combines with OR.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless both sides are boolean.
    pub fn or(self, other: impl IntoOperand) -> Result<Self> {
        self.logical(BinaryOp::Or, other)
    }

    /// Negates with NOT.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] unless the operand is boolean.
    pub fn not(self) -> Result<Self> {
        self.check_boolean("operand of NOT")?;
        Ok(Self::Unary {
            op: UnaryOp::Not,
            operand: Arc::new(self),
        })
    }

    /// Creates an IS NULL expression.
    #[must_use]
    pub fn is_null(self) -> Self {
        Self::Unary {
            op: UnaryOp::IsNull,
            operand: Arc::new(self),
        }
    }

    /// Creates an IS NOT NULL expression.
    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::Unary {
            op: UnaryOp::IsNotNull,
            operand: Arc::new(self),
        }
    }

    fn in_list_impl<T: IntoOperand>(
        self,
        items: impl IntoIterator<Item = T>,
        negated: bool,
    ) -> Result<Self> {
        let op = if negated { "NOT IN" } else { "IN" };
        let list = items
            .into_iter()
            .map(|item| {
                let item = item.into_operand();
                self.check_comparable(&item, op, false)?;
                Ok(item)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::InList {
            expr: Arc::new(self),
            list: list.into(),
            negated,
        })
    }

    /// Creates an IN expression. An empty list is always false.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if an item is incompatible.
    pub fn in_list<T: IntoOperand>(self, items: impl IntoIterator<Item = T>) -> Result<Self> {
        self.in_list_impl(items, false)
    }

    /// Creates a NOT IN expression. An empty list is always true.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if an item is incompatible.
    pub fn not_in_list<T: IntoOperand>(self, items: impl IntoIterator<Item = T>) -> Result<Self> {
        self.in_list_impl(items, true)
    }

    fn between_impl(self, low: Self, high: Self, negated: bool) -> Result<Self> {
        let op = if negated { "NOT BETWEEN" } else { "BETWEEN" };
        self.check_comparable(&low, op, true)?;
        self.check_comparable(&high, op, true)?;
        Ok(Self::Between {
            expr: Arc::new(self),
            low: Arc::new(low),
            high: Arc::new(high),
            negated,
        })
    }

    /// Creates a BETWEEN expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if a bound is incompatible or unordered.
    pub fn between(self, low: impl IntoOperand, high: impl IntoOperand) -> Result<Self> {
        self.between_impl(low.into_operand(), high.into_operand(), false)
    }

    /// Creates a NOT BETWEEN expression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if a bound is incompatible or unordered.
    pub fn not_between(self, low: impl IntoOperand, high: impl IntoOperand) -> Result<Self> {
        self.between_impl(low.into_operand(), high.into_operand(), true)
    }

    /// Attaches an alias for use in a projection.
    #[must_use]
    pub fn alias(self, alias: impl Into<String>) -> Projection {
        Projection {
            expr: self,
            alias: Some(alias.into()),
        }
    }
}

// =============================================================================
// Aggregates
// =============================================================================

fn aggregate(func: AggregateFunc, arg: Expr, distinct: bool) -> Expr {
    Expr::Aggregate {
        func,
        arg: Some(Arc::new(arg)),
        distinct,
    }
}

/// `COUNT(*)`.
#[must_use]
pub const fn count_all() -> Expr {
    Expr::Aggregate {
        func: AggregateFunc::Count,
        arg: None,
        distinct: false,
    }
}

/// `COUNT(expr)`.
#[must_use]
pub fn count(arg: impl IntoOperand) -> Expr {
    aggregate(AggregateFunc::Count, arg.into_operand(), false)
}

/// `COUNT(DISTINCT expr)`.
#[must_use]
pub fn count_distinct(arg: impl IntoOperand) -> Expr {
    aggregate(AggregateFunc::Count, arg.into_operand(), true)
}

/// `SUM(expr)`.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] unless the argument is numeric.
pub fn sum(arg: impl IntoOperand) -> Result<Expr> {
    let arg = arg.into_operand();
    arg.check_family("SUM", TypeFamily::is_numeric, "numeric")?;
    Ok(aggregate(AggregateFunc::Sum, arg, false))
}

/// `AVG(expr)`.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] unless the argument is numeric.
pub fn avg(arg: impl IntoOperand) -> Result<Expr> {
    let arg = arg.into_operand();
    arg.check_family("AVG", TypeFamily::is_numeric, "numeric")?;
    Ok(aggregate(AggregateFunc::Avg, arg, false))
}

/// `MIN(expr)`.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] for unordered arguments (boolean, json).
pub fn min(arg: impl IntoOperand) -> Result<Expr> {
    let arg = arg.into_operand();
    arg.check_family("MIN", TypeFamily::is_ordered, "ordered type")?;
    Ok(aggregate(AggregateFunc::Min, arg, false))
}

/// `MAX(expr)`.
///
/// # Errors
///
/// Returns [`Error::TypeMismatch`] for unordered arguments (boolean, json).
pub fn max(arg: impl IntoOperand) -> Result<Expr> {
    let arg = arg.into_operand();
    arg.check_family("MAX", TypeFamily::is_ordered, "ordered type")?;
    Ok(aggregate(AggregateFunc::Max, arg, false))
}

// =============================================================================
// Projections and ordering
// =============================================================================

/// A projected expression with an optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// The expression.
    pub expr: Expr,
    /// `AS alias`.
    pub alias: Option<String>,
}

impl From<Expr> for Projection {
    fn from(expr: Expr) -> Self {
        Self { expr, alias: None }
    }
}

impl From<ColumnRef> for Projection {
    fn from(col: ColumnRef) -> Self {
        Self::from(Expr::Column(col))
    }
}

impl From<&ColumnRef> for Projection {
    fn from(col: &ColumnRef) -> Self {
        Self::from(col.expr())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderDirection {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl OrderDirection {
    /// Returns the SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Sorted expression.
    pub expr: Expr,
    /// Direction.
    pub direction: OrderDirection,
}
