//! Generic SQL dialect.

use super::{standard_type_name, Dialect, Feature};
use crate::types::ColumnType;

/// A generic SQL dialect using ANSI SQL standards.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect;

impl GenericDialect {
    /// Creates a new generic dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for GenericDialect {
    fn name(&self) -> &str {
        "generic"
    }

    fn type_name(&self, ty: ColumnType) -> Option<String> {
        match ty {
            ColumnType::TimestampTz => Some(String::from("TIMESTAMP WITH TIME ZONE")),
            ColumnType::Jsonb => None,
            other => Some(standard_type_name(other)),
        }
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::FullOuterJoin
                | Feature::RightJoin
                | Feature::AlterColumn
                | Feature::AlterConstraints
                | Feature::DropColumn
        )
    }

    fn autoincrement_keyword(&self) -> Option<&str> {
        Some("GENERATED BY DEFAULT AS IDENTITY")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_dialect() {
        let dialect = GenericDialect::new();
        assert_eq!(dialect.name(), "generic");
        assert_eq!(dialect.identifier_quotes(), ('"', '"'));
        assert_eq!(dialect.placeholder(1), "?");
        assert!(!dialect.supports(Feature::Returning));
        assert!(!dialect.supports(Feature::OnConflict));
        assert!(dialect.supports(Feature::FullOuterJoin));
    }
}
