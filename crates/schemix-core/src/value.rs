//! SQL values and parameter handling.
//!
//! Query literals never reach the SQL text: they travel as [`SqlValue`]
//! parameters next to placeholders. Only DDL defaults are rendered inline,
//! through [`SqlValue::to_sql_inline`], which escapes text.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::TypeFamily;

/// A SQL value that can be used as a parameter or a column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlValue {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without zone.
    Timestamp(NaiveDateTime),
    /// JSON document.
    Json(serde_json::Value),
}

impl SqlValue {
    /// Returns the SQL representation for inline use (escaped).
    ///
    /// **Warning**: only DDL uses this. Queries always bind parameters.
    #[must_use]
    pub fn to_sql_inline(&self) -> String {
        match self {
            Self::Null => String::from("NULL"),
            Self::Bool(b) => {
                if *b {
                    String::from("TRUE")
                } else {
                    String::from("FALSE")
                }
            }
            Self::Int(n) => format!("{n}"),
            Self::Float(f) => format!("{f}"),
            Self::Text(s) => quote_text(s),
            Self::Date(_) | Self::Time(_) | Self::Timestamp(_) | Self::Json(_) => {
                quote_text(&self.to_text())
            }
        }
    }

    /// Returns the text form used when a backend stores the value as text.
    ///
    /// Dates use ISO 8601, timestamps use a space separator, JSON is
    /// serialized compactly.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Self::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Self::Json(v) => v.to_string(),
        }
    }

    /// Returns the type family of the value, or `None` for NULL.
    #[must_use]
    pub const fn family(&self) -> Option<TypeFamily> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeFamily::Boolean),
            Self::Int(_) => Some(TypeFamily::Integer),
            Self::Float(_) => Some(TypeFamily::Float),
            Self::Text(_) => Some(TypeFamily::Text),
            Self::Date(_) => Some(TypeFamily::Date),
            Self::Time(_) => Some(TypeFamily::Time),
            Self::Timestamp(_) => Some(TypeFamily::Timestamp),
            Self::Json(_) => Some(TypeFamily::Json),
        }
    }

    /// Returns true for NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn kind(&self) -> &'static str {
        self.family().map_or("null", TypeFamily::as_str)
    }
}

fn quote_text(s: &str) -> String {
    // Escape single quotes by doubling them
    let escaped = s.replace('\'', "''");
    format!("'{escaped}'")
}

/// Trait for types that can be converted to SQL values.
pub trait ToSqlValue {
    /// Converts the value to a `SqlValue`.
    fn to_sql_value(self) -> SqlValue;
}

impl ToSqlValue for SqlValue {
    fn to_sql_value(self) -> SqlValue {
        self
    }
}

macro_rules! impl_to_sql_value {
    ($($ty:ty => |$v:ident| $body:expr),* $(,)?) => {
        $(
            impl ToSqlValue for $ty {
                fn to_sql_value(self) -> SqlValue {
                    let $v = self;
                    $body
                }
            }
        )*
    };
}

impl_to_sql_value! {
    bool => |v| SqlValue::Bool(v),
    i64 => |v| SqlValue::Int(v),
    i32 => |v| SqlValue::Int(i64::from(v)),
    i16 => |v| SqlValue::Int(i64::from(v)),
    i8 => |v| SqlValue::Int(i64::from(v)),
    u32 => |v| SqlValue::Int(i64::from(v)),
    u16 => |v| SqlValue::Int(i64::from(v)),
    u8 => |v| SqlValue::Int(i64::from(v)),
    f64 => |v| SqlValue::Float(v),
    f32 => |v| SqlValue::Float(f64::from(v)),
    String => |v| SqlValue::Text(v),
    &str => |v| SqlValue::Text(String::from(v)),
    &String => |v| SqlValue::Text(v.clone()),
    NaiveDate => |v| SqlValue::Date(v),
    NaiveTime => |v| SqlValue::Time(v),
    NaiveDateTime => |v| SqlValue::Timestamp(v),
    serde_json::Value => |v| SqlValue::Json(v),
}

impl<T: ToSqlValue> ToSqlValue for Option<T> {
    fn to_sql_value(self) -> SqlValue {
        match self {
            Some(v) => v.to_sql_value(),
            None => SqlValue::Null,
        }
    }
}

/// Trait for types that can be read back out of a SQL value.
///
/// Conversions are lenient where backends store a type as text or integers:
/// booleans accept `0`/`1`, dates and JSON accept their text form.
pub trait FromSqlValue: Sized {
    /// Converts the value, failing with [`Error::TypeMismatch`].
    fn from_sql_value(value: &SqlValue) -> Result<Self>;
}

fn mismatch(expected: &str, value: &SqlValue) -> Error {
    Error::type_mismatch(expected, value.kind(), "reading a row value")
}

impl FromSqlValue for SqlValue {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromSqlValue for bool {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(b) => Ok(*b),
            SqlValue::Int(0) => Ok(false),
            SqlValue::Int(1) => Ok(true),
            other => Err(mismatch("boolean", other)),
        }
    }
}

impl FromSqlValue for i64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int(n) => Ok(*n),
            SqlValue::Bool(b) => Ok(Self::from(*b)),
            other => Err(mismatch("integer", other)),
        }
    }
}

impl FromSqlValue for i32 {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        let n = i64::from_sql_value(value)?;
        Self::try_from(n).map_err(|_| {
            Error::type_mismatch("32-bit integer", n.to_string(), "reading a row value")
        })
    }
}

impl FromSqlValue for f64 {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float(f) => Ok(*f),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(n) => Ok(*n as Self),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromSqlValue for String {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Err(mismatch("text", value)),
            SqlValue::Text(s) => Ok(s.clone()),
            other => Ok(other.to_text()),
        }
    }
}

impl FromSqlValue for NaiveDate {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Date(d) => Ok(*d),
            SqlValue::Text(s) => {
                Self::parse_from_str(s, "%Y-%m-%d").map_err(|_| mismatch("date", value))
            }
            other => Err(mismatch("date", other)),
        }
    }
}

impl FromSqlValue for NaiveTime {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Time(t) => Ok(*t),
            SqlValue::Text(s) => {
                Self::parse_from_str(s, "%H:%M:%S%.f").map_err(|_| mismatch("time", value))
            }
            other => Err(mismatch("time", other)),
        }
    }
}

impl FromSqlValue for NaiveDateTime {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Timestamp(ts) => Ok(*ts),
            SqlValue::Text(s) => Self::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| Self::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|_| mismatch("timestamp", value)),
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromSqlValue for serde_json::Value {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Json(v) => Ok(v.clone()),
            SqlValue::Text(s) => serde_json::from_str(s).map_err(|_| mismatch("json", value)),
            other => Err(mismatch("json", other)),
        }
    }
}

impl<T: FromSqlValue> FromSqlValue for Option<T> {
    fn from_sql_value(value: &SqlValue) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_inline_null() {
        assert_eq!(SqlValue::Null.to_sql_inline(), "NULL");
    }

    #[test]
    fn test_sql_value_inline_scalars() {
        assert_eq!(SqlValue::Bool(true).to_sql_inline(), "TRUE");
        assert_eq!(SqlValue::Bool(false).to_sql_inline(), "FALSE");
        assert_eq!(SqlValue::Int(-100).to_sql_inline(), "-100");
        assert_eq!(SqlValue::Float(2.5).to_sql_inline(), "2.5");
    }

    #[test]
    fn test_sql_value_inline_text_escaping() {
        assert_eq!(
            SqlValue::Text(String::from("O'Brien")).to_sql_inline(),
            "'O''Brien'"
        );
        let malicious = SqlValue::Text(String::from("'; DROP TABLE users; --"));
        assert_eq!(malicious.to_sql_inline(), "'''; DROP TABLE users; --'");
    }

    #[test]
    fn test_sql_value_inline_temporal_and_json() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).map(SqlValue::Date);
        assert_eq!(
            date.map(|d| d.to_sql_inline()).as_deref(),
            Some("'2024-03-09'")
        );
        let json = SqlValue::Json(serde_json::json!({"tag": "it's"}));
        assert_eq!(json.to_sql_inline(), r#"'{"tag":"it''s"}'"#);
    }

    #[test]
    fn test_to_sql_value_conversions() {
        assert_eq!(true.to_sql_value(), SqlValue::Bool(true));
        assert_eq!(42_i32.to_sql_value(), SqlValue::Int(42));
        assert_eq!(2.5_f64.to_sql_value(), SqlValue::Float(2.5));
        assert_eq!("hello".to_sql_value(), SqlValue::Text(String::from("hello")));
        assert_eq!(None::<i32>.to_sql_value(), SqlValue::Null);
        assert_eq!(Some(42_i32).to_sql_value(), SqlValue::Int(42));
    }

    #[test]
    fn test_from_sql_value_lenient_forms() {
        assert!(bool::from_sql_value(&SqlValue::Int(1)).unwrap());
        assert!(!bool::from_sql_value(&SqlValue::Int(0)).unwrap());
        assert!(bool::from_sql_value(&SqlValue::Int(7)).is_err());

        let d = NaiveDate::from_sql_value(&SqlValue::Text(String::from("2024-03-09"))).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

        let ts = NaiveDateTime::from_sql_value(&SqlValue::Text(String::from(
            "2024-03-09 10:11:12",
        )))
        .unwrap();
        assert_eq!(ts.format("%H:%M").to_string(), "10:11");

        let v = serde_json::Value::from_sql_value(&SqlValue::Text(String::from("[1,2]"))).unwrap();
        assert_eq!(v, serde_json::json!([1, 2]));

        assert_eq!(Option::<i64>::from_sql_value(&SqlValue::Null).unwrap(), None);
        assert_eq!(f64::from_sql_value(&SqlValue::Int(3)).unwrap(), 3.0);
    }

    #[test]
    fn test_from_sql_value_mismatch() {
        let err = i64::from_sql_value(&SqlValue::Text(String::from("x"))).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(String::from_sql_value(&SqlValue::Null).is_err());
    }
}
