//! MySQL dialect.

use super::{Dialect, Feature};
use crate::error::Result;
use crate::schema::Column;
use crate::types::ColumnType;

/// MySQL: backtick identifiers, `?` placeholders.
///
/// No FULL OUTER JOIN, RETURNING, ON CONFLICT or ILIKE; no JSONB or
/// zoned timestamps. `||` is logical OR in MySQL, so concatenation is
/// rendered as `CONCAT()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Dialect for MySqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn identifier_quotes(&self) -> (char, char) {
        ('`', '`')
    }

    fn type_name(&self, ty: ColumnType) -> Option<String> {
        let name = match ty {
            ColumnType::SmallInt => String::from("SMALLINT"),
            ColumnType::Integer => String::from("INT"),
            ColumnType::BigInt => String::from("BIGINT"),
            ColumnType::Real => String::from("DOUBLE"),
            ColumnType::Numeric { precision, scale } => match (precision, scale) {
                (Some(p), Some(s)) => format!("DECIMAL({p}, {s})"),
                (Some(p), None) => format!("DECIMAL({p})"),
                _ => String::from("DECIMAL"),
            },
            ColumnType::Char(n) => format!("CHAR({n})"),
            ColumnType::Varchar(n) => format!("VARCHAR({n})"),
            ColumnType::Text => String::from("TEXT"),
            ColumnType::Boolean => String::from("BOOLEAN"),
            ColumnType::Date => String::from("DATE"),
            ColumnType::Time => String::from("TIME"),
            ColumnType::Timestamp => String::from("DATETIME"),
            ColumnType::Json => String::from("JSON"),
            ColumnType::TimestampTz | ColumnType::Jsonb => return None,
        };
        Some(name)
    }

    fn supports(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::RightJoin | Feature::AlterColumn | Feature::AlterConstraints | Feature::DropColumn
        )
    }

    fn autoincrement_keyword(&self) -> Option<&str> {
        Some("AUTO_INCREMENT")
    }

    fn concat_as_function(&self) -> bool {
        true
    }

    fn offset_without_limit(&self) -> Option<&str> {
        Some("18446744073709551615")
    }

    fn alter_nullability(&self, table: &str, column: &Column, nullable: bool) -> Result<String> {
        let mut column = column.clone();
        column.nullable = nullable;
        Ok(format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(&column, false)?
        ))
    }

    fn add_column(&self, table: &str, column: &Column) -> Result<String> {
        // Inline REFERENCES is parsed and ignored by InnoDB
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, false)?
        );
        if let Some(ref fk) = column.references {
            sql.push_str(", ADD ");
            sql.push_str(&self.foreign_key_constraint(table, &column.name, fk));
        }
        Ok(sql)
    }

    fn drop_foreign_key(&self, table: &str, column: &str) -> Result<String> {
        Ok(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(&self.foreign_key_name(table, column))
        ))
    }
}
