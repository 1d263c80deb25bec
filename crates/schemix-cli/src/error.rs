//! Error types for the command-line tool.

use std::path::PathBuf;

/// Errors raised while reading the tool's inputs.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The schema or dialect file does not exist.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// A JSON input could not be parsed or failed validation.
    #[error("Failed to parse '{path}': {source}")]
    Parse {
        /// Path to the offending file.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// An `--allow-drop-column` value without a table part.
    #[error("Invalid column '{0}', expected TABLE.COLUMN")]
    InvalidColumn(String),

    /// IO error while reading an input file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
