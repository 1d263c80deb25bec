//! Semantic column types and the type families used for checking.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::SqlValue;

/// Declared semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Floating point.
    Real,
    /// Exact numeric with optional precision and scale.
    Numeric {
        /// Total digits.
        precision: Option<u32>,
        /// Digits after the decimal point.
        scale: Option<u32>,
    },
    /// Fixed-length string.
    Char(u32),
    /// Variable-length string with a maximum length.
    Varchar(u32),
    /// Unbounded text.
    Text,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    /// JSON document stored as text.
    Json,
    /// Binary JSON.
    Jsonb,
}

/// Coarse grouping of types used by expression and value checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// Integer types.
    Integer,
    /// Floating point and exact numeric types.
    Float,
    /// String types.
    Text,
    /// Booleans.
    Boolean,
    /// Dates.
    Date,
    /// Times of day.
    Time,
    /// Timestamps, with or without zone.
    Timestamp,
    /// JSON documents.
    Json,
}

impl TypeFamily {
    /// Lower-case name used in error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::Json => "json",
        }
    }

    /// Returns true for integer and float families.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Returns true if values of the family have a total order in SQL.
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        !matches!(self, Self::Boolean | Self::Json)
    }

    /// Numeric families compare with each other, others only with themselves.
    #[must_use]
    pub fn is_compatible(self, other: Self) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for TypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ColumnType {
    /// Returns the family used for type checking.
    #[must_use]
    pub const fn family(self) -> TypeFamily {
        match self {
            Self::SmallInt | Self::Integer | Self::BigInt => TypeFamily::Integer,
            Self::Real | Self::Numeric { .. } => TypeFamily::Float,
            Self::Char(_) | Self::Varchar(_) | Self::Text => TypeFamily::Text,
            Self::Boolean => TypeFamily::Boolean,
            Self::Date => TypeFamily::Date,
            Self::Time => TypeFamily::Time,
            Self::Timestamp | Self::TimestampTz => TypeFamily::Timestamp,
            Self::Json | Self::Jsonb => TypeFamily::Json,
        }
    }

    /// Returns the bare type name, without length or precision.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::Numeric { .. } => "numeric",
            Self::Char(_) => "char",
            Self::Varchar(_) => "varchar",
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Time => "time",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Json => "json",
            Self::Jsonb => "jsonb",
        }
    }

    /// Returns true if an autoincrementing key can use this type.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::SmallInt | Self::Integer | Self::BigInt)
    }

    /// Checks that a value can be stored in a column of this type.
    ///
    /// NULL is accepted here; nullability is the column's concern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] when the value's family is incompatible
    /// or a string exceeds a declared length.
    pub fn check_value(self, value: &SqlValue, context: &str) -> Result<()> {
        let Some(found) = value.family() else {
            return Ok(());
        };
        let expected = self.family();
        if !expected.is_compatible(found) || (expected == TypeFamily::Integer && found == TypeFamily::Float) {
            return Err(Error::type_mismatch(self.to_string(), found.as_str(), context));
        }
        if let (Self::Varchar(max) | Self::Char(max), SqlValue::Text(s)) = (self, value) {
            let len = s.chars().count();
            if len > max as usize {
                return Err(Error::type_mismatch(
                    self.to_string(),
                    format!("text of length {len}"),
                    context,
                ));
            }
        }
        Ok(())
    }

    /// Parses a native type name back into a semantic type.
    ///
    /// Accepts the names the built-in dialects emit plus common aliases
    /// (`INT`, `INT8`, `BOOL`, `DATETIME`, `CHARACTER VARYING`, ...).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchema`] for names with no semantic mapping.
    pub fn from_native(native: &str) -> Result<Self> {
        let upper = native.trim().to_ascii_uppercase();
        let (base, args) = match upper.find('(') {
            Some(open) => {
                let close = upper
                    .rfind(')')
                    .filter(|close| *close > open)
                    .ok_or_else(|| Error::InvalidSchema(format!("malformed type name '{native}'")))?;
                (upper[..open].trim(), Some(&upper[open + 1..close]))
            }
            None => (upper.as_str(), None),
        };

        let numbers = match args {
            Some(args) => args
                .split(',')
                .map(|part| {
                    part.trim().parse::<u32>().map_err(|_| {
                        Error::InvalidSchema(format!("malformed type arguments in '{native}'"))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        let length = |name: &str| {
            numbers.first().copied().ok_or_else(|| {
                Error::InvalidSchema(format!("{name} requires a length in '{native}'"))
            })
        };

        let ty = match base {
            "SMALLINT" | "INT2" => Self::SmallInt,
            "INTEGER" | "INT" | "INT4" | "SERIAL" | "MEDIUMINT" => Self::Integer,
            "BIGINT" | "INT8" | "BIGSERIAL" => Self::BigInt,
            "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => Self::Real,
            "NUMERIC" | "DECIMAL" => Self::Numeric {
                precision: numbers.first().copied(),
                scale: numbers.get(1).copied(),
            },
            "CHAR" | "CHARACTER" => Self::Char(length("CHAR")?),
            "VARCHAR" | "CHARACTER VARYING" => match numbers.first() {
                Some(n) => Self::Varchar(*n),
                None => Self::Text,
            },
            "TEXT" | "CLOB" => Self::Text,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            "DATE" => Self::Date,
            "TIME" | "TIME WITHOUT TIME ZONE" => Self::Time,
            "TIMESTAMP" | "DATETIME" | "TIMESTAMP WITHOUT TIME ZONE" => Self::Timestamp,
            "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => Self::TimestampTz,
            "JSON" => Self::Json,
            "JSONB" => Self::Jsonb,
            _ => {
                return Err(Error::InvalidSchema(format!(
                    "unsupported native type '{native}'"
                )))
            }
        };
        Ok(ty)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallInt => f.write_str("smallint"),
            Self::Integer => f.write_str("integer"),
            Self::BigInt => f.write_str("bigint"),
            Self::Real => f.write_str("real"),
            Self::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => write!(f, "numeric({p}, {s})"),
                (Some(p), None) => write!(f, "numeric({p})"),
                _ => f.write_str("numeric"),
            },
            Self::Char(n) => write!(f, "char({n})"),
            Self::Varchar(n) => write!(f, "varchar({n})"),
            Self::Text => f.write_str("text"),
            Self::Boolean => f.write_str("boolean"),
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::TimestampTz => f.write_str("timestamptz"),
            Self::Json => f.write_str("json"),
            Self::Jsonb => f.write_str("jsonb"),
        }
    }
}
