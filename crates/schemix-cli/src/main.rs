//! schemix CLI
//!
//! Renders DDL for a declared schema and pushes it to a live database.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use schemix_core::dialect::schema_ddl;
use schemix_core::Introspect;
use schemix_sqlite::{plan, push, PushReport, SqliteDriver};

mod config;
mod error;

use config::{load_dialect, load_schema, AllowArgs, DialectKind};

/// Declarative schema sync for SQL databases.
#[derive(Parser)]
#[command(name = "schemix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Schema file: a JSON array of table definitions.
    #[arg(short, long, env = "SCHEMIX_SCHEMA", default_value = "schema.json")]
    schema: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print CREATE TABLE statements for the schema file.
    Sql {
        /// Target dialect.
        #[arg(long, value_enum, default_value_t = DialectKind::Sqlite)]
        dialect: DialectKind,

        /// JSON dialect descriptor, used instead of --dialect.
        #[arg(long)]
        dialect_file: Option<PathBuf>,
    },

    /// Show the statements a push would execute.
    Plan {
        #[command(flatten)]
        allow: AllowArgs,
    },

    /// Bring the database in line with the schema file.
    Push {
        #[command(flatten)]
        allow: AllowArgs,
    },

    /// Print the live schema as JSON.
    Introspect,
}

fn print_statements(report: &PushReport) {
    for warning in &report.warnings {
        warn!("{warning}");
    }
    for sql in &report.statements {
        println!("{sql};");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sql {
            dialect,
            dialect_file,
        } => {
            let schema = load_schema(&cli.schema)?;
            let statements = match dialect_file {
                Some(path) => schema_ddl(&schema, &load_dialect(&path)?)?,
                None => schema_ddl(&schema, dialect.dialect().as_ref())?,
            };
            for sql in statements {
                println!("{sql};\n");
            }
        }

        Commands::Plan { allow } => {
            let schema = load_schema(&cli.schema)?;
            let driver = SqliteDriver::connect(&cli.database).await?;
            let report = plan(&driver, &schema, &allow.allow_list()?).await?;
            if report.is_empty() {
                info!("No changes detected.");
            } else {
                print_statements(&report);
            }
        }

        Commands::Push { allow } => {
            let schema = load_schema(&cli.schema)?;
            let driver = SqliteDriver::connect(&cli.database).await?;
            let report = push(&driver, &schema, &allow.allow_list()?).await?;
            for warning in &report.warnings {
                warn!("{warning}");
            }
        }

        Commands::Introspect => {
            let driver = SqliteDriver::connect(&cli.database).await?;
            let schema = driver.introspect().await?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}
