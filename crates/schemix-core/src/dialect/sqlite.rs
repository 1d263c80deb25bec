//! SQLite dialect.

use super::{standard_type_name, Dialect, Feature};
use crate::types::ColumnType;

/// SQLite: double-quoted identifiers, `?` placeholders.
///
/// Declared types are kept verbatim in the table definition so that
/// introspection can recover them; SQLite itself only applies affinity.
/// `RIGHT` and `FULL OUTER JOIN` need SQLite 3.39, `RETURNING` and
/// `DROP COLUMN` need 3.35.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn type_name(&self, ty: ColumnType) -> Option<String> {
        Some(standard_type_name(ty))
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::FullOuterJoin
                | Feature::RightJoin
                | Feature::Returning
                | Feature::OnConflict
                | Feature::DropColumn
        )
    }

    fn autoincrement_type(&self, _ty: ColumnType) -> Option<String> {
        // AUTOINCREMENT is only accepted on INTEGER PRIMARY KEY
        Some(String::from("INTEGER"))
    }

    fn autoincrement_keyword(&self) -> Option<&str> {
        Some("AUTOINCREMENT")
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn offset_without_limit(&self) -> Option<&str> {
        Some("-1")
    }
}
