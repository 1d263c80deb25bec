//! PostgreSQL dialect.

use super::{standard_type_name, Dialect, Feature, PlaceholderStyle};
use crate::types::ColumnType;

/// PostgreSQL: double-quoted identifiers, `$n` placeholders, every
/// optional feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }

    fn type_name(&self, ty: ColumnType) -> Option<String> {
        Some(match ty {
            ColumnType::Real => String::from("DOUBLE PRECISION"),
            other => standard_type_name(other),
        })
    }

    fn supports(&self, _feature: Feature) -> bool {
        true
    }

    fn autoincrement_type(&self, ty: ColumnType) -> Option<String> {
        match ty {
            ColumnType::SmallInt => Some(String::from("SMALLSERIAL")),
            ColumnType::BigInt => Some(String::from("BIGSERIAL")),
            _ => Some(String::from("SERIAL")),
        }
    }
}
