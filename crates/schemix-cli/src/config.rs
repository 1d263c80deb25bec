//! Loading the declared schema, dialect descriptors and allow-lists.

use std::fs;
use std::path::Path;

use clap::{Args, ValueEnum};
use serde::de::DeserializeOwned;
use tracing::debug;

use schemix_core::dialect::{
    CustomDialect, Dialect, GenericDialect, MySqlDialect, PostgresDialect, SqliteDialect,
};
use schemix_core::{AllowList, Schema};

use crate::error::CliError;

/// Built-in dialects selectable with `--dialect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectKind {
    Sqlite,
    Postgres,
    Mysql,
    Generic,
}

impl DialectKind {
    pub fn dialect(self) -> Box<dyn Dialect> {
        match self {
            Self::Sqlite => Box::new(SqliteDialect::new()),
            Self::Postgres => Box::new(PostgresDialect::new()),
            Self::Mysql => Box::new(MySqlDialect::new()),
            Self::Generic => Box::new(GenericDialect::new()),
        }
    }
}

/// Destructive changes the user has confirmed on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct AllowArgs {
    /// Allow dropping TABLE (repeatable).
    #[arg(long = "allow-drop-table", value_name = "TABLE")]
    pub drop_tables: Vec<String>,

    /// Allow dropping TABLE.COLUMN (repeatable).
    #[arg(long = "allow-drop-column", value_name = "TABLE.COLUMN")]
    pub drop_columns: Vec<String>,

    /// Allow every destructive change.
    #[arg(long)]
    pub allow_all: bool,
}

impl AllowArgs {
    pub fn allow_list(&self) -> Result<AllowList, CliError> {
        let mut allow = AllowList::new();
        if self.allow_all {
            allow = allow.allow_all();
        }
        for table in &self.drop_tables {
            allow = allow.allow_drop_table(table.as_str());
        }
        for entry in &self.drop_columns {
            let (table, column) = entry
                .split_once('.')
                .filter(|(t, c)| !t.is_empty() && !c.is_empty())
                .ok_or_else(|| CliError::InvalidColumn(entry.clone()))?;
            allow = allow.allow_drop_column(table, column);
        }
        Ok(allow)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    if !path.exists() {
        return Err(CliError::NotFound(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a schema file: a JSON array of tables.
pub fn load_schema(path: &Path) -> Result<Schema, CliError> {
    let schema: Schema = read_json(path)?;
    debug!(path = %path.display(), tables = schema.len(), "Loaded schema");
    Ok(schema)
}

/// Reads a [`CustomDialect`] descriptor.
pub fn load_dialect(path: &Path) -> Result<CustomDialect, CliError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemix_core::dialect::schema_ddl;
    use schemix_core::DdlOperation;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BLOG: &str = r#"[
        {
            "name": "users",
            "columns": [
                {"name": "id", "type": "integer", "primary_key": true, "autoincrement": true},
                {"name": "email", "type": {"varchar": 255}, "nullable": false, "unique": true}
            ]
        },
        {
            "name": "posts",
            "columns": [
                {"name": "id", "type": "integer", "primary_key": true},
                {
                    "name": "author_id",
                    "type": "integer",
                    "nullable": false,
                    "references": {"table": "users", "column": "id", "on_delete": "cascade"}
                }
            ]
        }
    ]"#;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_schema() {
        let file = write_temp(BLOG);
        let schema = load_schema(file.path()).unwrap();
        assert_eq!(schema.len(), 2);
        let posts = schema.table("posts").unwrap();
        let reference = posts.column("author_id").unwrap().references.as_ref().unwrap();
        assert_eq!(reference.table, "users");

        let ddl = schema_ddl(&schema, DialectKind::Sqlite.dialect().as_ref()).unwrap();
        assert_eq!(ddl.len(), 2);
        assert!(ddl[0].starts_with(r#"CREATE TABLE "users""#));
    }

    #[test]
    fn test_load_schema_rejects_dangling_reference() {
        let file = write_temp(
            r#"[{"name": "posts", "columns": [
                {"name": "author_id", "type": "integer", "references": {"table": "users", "column": "id"}}
            ]}]"#,
        );
        assert!(matches!(
            load_schema(file.path()),
            Err(CliError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        assert!(matches!(load_schema(&path), Err(CliError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_load_dialect() {
        let file = write_temp(
            r#"{"name": "warehouse", "quotes": ["[", "]"], "features": ["drop_column"]}"#,
        );
        let dialect = load_dialect(file.path()).unwrap();
        assert_eq!(dialect.name, "warehouse");
        assert_eq!(dialect.quote_identifier("users"), "[users]");
    }

    #[test]
    fn test_allow_list() {
        let args = AllowArgs {
            drop_tables: vec![String::from("legacy")],
            drop_columns: vec![String::from("users.age")],
            allow_all: false,
        };
        let allow = args.allow_list().unwrap();
        assert!(allow.permits(&DdlOperation::DropTable(String::from("legacy"))));
        assert!(allow.permits(&DdlOperation::DropColumn {
            table: String::from("users"),
            column: String::from("age"),
        }));
        assert!(!allow.permits(&DdlOperation::DropTable(String::from("users"))));
    }

    #[test]
    fn test_allow_list_rejects_bare_column() {
        let args = AllowArgs {
            drop_columns: vec![String::from("age")],
            ..AllowArgs::default()
        };
        assert!(matches!(args.allow_list(), Err(CliError::InvalidColumn(c)) if c == "age"));
    }
}
