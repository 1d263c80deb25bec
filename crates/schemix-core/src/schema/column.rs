//! Column declarations.
//!
//! Provides a fluent API for declaring columns. Declarators such as
//! [`integer`] or [`varchar`] return a [`ColumnBuilder`]; every constraint
//! call consumes the builder and returns the updated value.

use serde::{Deserialize, Serialize};

use crate::expr::ColumnRef;
use crate::types::{ColumnType, TypeFamily};
use crate::value::{SqlValue, ToSqlValue};

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the SQL spelling reported by catalogs.
    #[must_use]
    pub fn from_sql(sql: &str) -> Option<Self> {
        match sql.trim().to_ascii_uppercase().as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// A reference to a column in another (or the same) table.
///
/// Tables refer to each other by name only; the schema resolves the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    /// The referenced table name.
    pub table: String,
    /// The referenced column name.
    pub column: String,
    /// Action on delete. `None` is the database default (NO ACTION).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update. `None` is the database default (NO ACTION).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKey {
    /// Creates a reference with default actions.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            on_delete: None,
            on_update: None,
        }
    }

    // NO ACTION is what every backend reports for an unspecified action.
    pub(crate) fn normalized(mut self) -> Self {
        if self.on_delete == Some(ForeignKeyAction::NoAction) {
            self.on_delete = None;
        }
        if self.on_update == Some(ForeignKeyAction::NoAction) {
            self.on_update = None;
        }
        self
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    /// Literal value, rendered inline and escaped.
    Literal(SqlValue),
    /// Raw SQL expression (e.g., `CURRENT_TIMESTAMP`).
    Expression(String),
}

impl ColumnDefault {
    /// Normalizes a default as reported by a catalog back into a
    /// [`ColumnDefault`], using the column type to pick the literal form.
    ///
    /// Quoted strings become text (or dates, times, timestamps, JSON when
    /// the column has that type and the text parses), numbers become
    /// integers or floats, `1`/`0` become booleans on boolean columns.
    /// Anything else is kept as an expression.
    #[must_use]
    pub fn from_sql(sql: &str, ty: ColumnType) -> Self {
        let mut text = sql.trim();
        while let Some(inner) = enclosed_in_parens(text) {
            text = inner;
        }
        // Postgres reports casts such as 'x'::character varying.
        if let Some(pos) = text.rfind("::") {
            if text[..pos].ends_with('\'') {
                text = &text[..pos];
            }
        }

        if text.eq_ignore_ascii_case("NULL") {
            return Self::Literal(SqlValue::Null);
        }
        if text.eq_ignore_ascii_case("TRUE") {
            return Self::Literal(SqlValue::Bool(true));
        }
        if text.eq_ignore_ascii_case("FALSE") {
            return Self::Literal(SqlValue::Bool(false));
        }

        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            let inner = text[1..text.len() - 1].replace("''", "'");
            return Self::Literal(typed_text(inner, ty));
        }

        if let Ok(n) = text.parse::<i64>() {
            let value = match ty.family() {
                TypeFamily::Boolean if n == 0 || n == 1 => SqlValue::Bool(n == 1),
                #[allow(clippy::cast_precision_loss)]
                TypeFamily::Float => SqlValue::Float(n as f64),
                _ => SqlValue::Int(n),
            };
            return Self::Literal(value);
        }
        if let Ok(f) = text.parse::<f64>() {
            return Self::Literal(SqlValue::Float(f));
        }

        Self::Expression(text.to_string())
    }
}

/// The contents of `text` when a single pair of parentheses encloses all
/// of it, as in `(0)` but not `(1) + (2)`.
fn enclosed_in_parens(text: &str) -> Option<&str> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    let mut quoted = false;
    for ch in inner.chars() {
        match ch {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.checked_sub(1)?,
            _ => {}
        }
    }
    (depth == 0).then(|| inner.trim())
}

fn typed_text(text: String, ty: ColumnType) -> SqlValue {
    use crate::value::FromSqlValue;

    let raw = SqlValue::Text(text);
    let parsed = match ty.family() {
        TypeFamily::Date => chrono::NaiveDate::from_sql_value(&raw).map(SqlValue::Date).ok(),
        TypeFamily::Time => chrono::NaiveTime::from_sql_value(&raw).map(SqlValue::Time).ok(),
        TypeFamily::Timestamp => chrono::NaiveDateTime::from_sql_value(&raw)
            .map(SqlValue::Timestamp)
            .ok(),
        TypeFamily::Json => serde_json::Value::from_sql_value(&raw).map(SqlValue::Json).ok(),
        _ => None,
    };
    parsed.unwrap_or(raw)
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

const fn default_true() -> bool {
    true
}

/// A declared column, owned by its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared semantic type.
    #[serde(rename = "type")]
    pub ty: ColumnType,
    /// Whether the column accepts NULL.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub nullable: bool,
    /// Single-column primary key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub primary_key: bool,
    /// Single-column UNIQUE constraint.
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// Auto-incrementing integer key.
    #[serde(default, skip_serializing_if = "is_false")]
    pub autoincrement: bool,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ColumnDefault>,
    /// Foreign key reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ForeignKey>,
}

impl Column {
    /// Creates a nullable column with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            primary_key: false,
            unique: false,
            autoincrement: false,
            default: None,
            references: None,
        }
    }

    /// Returns a typed reference to this column in `table`.
    #[must_use]
    pub fn to_ref(&self, table: &str) -> ColumnRef {
        ColumnRef::new(table, self.name.clone(), self.ty, self.nullable)
    }

    /// True if an INSERT may omit this column.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.nullable || self.default.is_some() || self.autoincrement
    }
}

/// Fluent column declaration builder.
#[derive(Debug, Clone)]
#[must_use]
pub struct ColumnBuilder {
    column: Column,
    dangling_action: bool,
}

impl ColumnBuilder {
    /// Creates a new column builder with name and type.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self::from(Column::new(name, ty))
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.column.name
    }

    /// Marks the column as PRIMARY KEY. Primary keys are NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.column.primary_key = true;
        self.column.nullable = false;
        self
    }

    /// Marks the column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.column.nullable = false;
        self
    }

    /// Marks the column as nullable (default).
    pub fn nullable(mut self) -> Self {
        self.column.nullable = true;
        self
    }

    /// Marks the column as UNIQUE.
    pub fn unique(mut self) -> Self {
        self.column.unique = true;
        self
    }

    /// Marks the column as auto-incrementing. Requires an integer primary key.
    pub fn autoincrement(mut self) -> Self {
        self.column.autoincrement = true;
        self
    }

    /// Sets a literal default value. Checked against the type when the
    /// table is built.
    pub fn default(mut self, value: impl ToSqlValue) -> Self {
        self.column.default = Some(ColumnDefault::Literal(value.to_sql_value()));
        self
    }

    /// Sets a raw SQL expression as default (e.g., `CURRENT_TIMESTAMP`).
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.column.default = Some(ColumnDefault::Expression(expr.into()));
        self
    }

    /// Sets a foreign key reference by name.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.column.references = Some(ForeignKey::new(table, column));
        self
    }

    /// Sets a foreign key reference to an already declared column.
    pub fn references_column(self, target: &ColumnRef) -> Self {
        self.references(target.table.clone(), target.name.clone())
    }

    /// Sets the ON DELETE action of the foreign key.
    ///
    /// The reference must be set first; otherwise the table builder
    /// rejects the column.
    pub fn on_delete(mut self, action: ForeignKeyAction) -> Self {
        match self.column.references.as_mut() {
            Some(fk) => fk.on_delete = Some(action),
            None => self.dangling_action = true,
        }
        self
    }

    /// Sets the ON UPDATE action of the foreign key.
    ///
    /// The reference must be set first; otherwise the table builder
    /// rejects the column.
    pub fn on_update(mut self, action: ForeignKeyAction) -> Self {
        match self.column.references.as_mut() {
            Some(fk) => fk.on_update = Some(action),
            None => self.dangling_action = true,
        }
        self
    }

    /// True when a referential action was set without a reference.
    #[must_use]
    pub const fn has_dangling_action(&self) -> bool {
        self.dangling_action
    }

    /// Returns the declared column. Validation happens in the table builder.
    #[must_use]
    pub fn build(self) -> Column {
        self.column
    }
}

impl From<Column> for ColumnBuilder {
    fn from(column: Column) -> Self {
        Self {
            column,
            dangling_action: false,
        }
    }
}

impl From<ColumnBuilder> for Column {
    fn from(builder: ColumnBuilder) -> Self {
        builder.build()
    }
}

// =============================================================================
// Shorthand Functions for Common Types
// =============================================================================

/// Creates a SMALLINT column builder.
pub fn smallint(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::SmallInt)
}

/// Creates an INTEGER column builder.
pub fn integer(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Integer)
}

/// Creates a BIGINT column builder.
pub fn bigint(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::BigInt)
}

/// Creates a REAL column builder.
pub fn real(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Real)
}

/// Creates a NUMERIC(precision, scale) column builder.
pub fn numeric(name: impl Into<String>, precision: u32, scale: u32) -> ColumnBuilder {
    ColumnBuilder::new(
        name,
        ColumnType::Numeric {
            precision: Some(precision),
            scale: Some(scale),
        },
    )
}

/// Creates a CHAR(n) column builder.
pub fn char(name: impl Into<String>, length: u32) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Char(length))
}

/// Creates a VARCHAR(n) column builder.
pub fn varchar(name: impl Into<String>, length: u32) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Varchar(length))
}

/// Creates a TEXT column builder.
pub fn text(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Text)
}

/// Creates a BOOLEAN column builder.
pub fn boolean(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Boolean)
}

/// Creates a DATE column builder.
pub fn date(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Date)
}

/// Creates a TIME column builder.
pub fn time(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Time)
}

/// Creates a TIMESTAMP column builder.
pub fn timestamp(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Timestamp)
}

/// Creates a TIMESTAMP WITH TIME ZONE column builder.
pub fn timestamptz(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::TimestampTz)
}

/// Creates a JSON column builder.
pub fn json(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Json)
}

/// Creates a JSONB column builder.
pub fn jsonb(name: impl Into<String>) -> ColumnBuilder {
    ColumnBuilder::new(name, ColumnType::Jsonb)
}
