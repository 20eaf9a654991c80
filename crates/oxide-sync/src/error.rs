//! Error types for schema synchronization.

use std::path::PathBuf;

use oxide_ddl::SchemaError;

/// Errors that can occur while synchronizing a database.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The declared schema is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Database error while reading or changing the schema.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The database file could not be copied.
    #[error("Unable to back up database to '{path}': {source}")]
    Backup {
        /// Backup file being written.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The backup copy is not the same size as the database.
    #[error("Backup '{path}' is incomplete")]
    BackupIncomplete {
        /// Backup file that was written.
        path: PathBuf,
    },

    /// The backup timestamp format is not a valid chrono format.
    #[error("Invalid backup date format: {0}")]
    DateFormat(String),

    /// A previous rebuild stopped after moving the table aside.
    #[error(
        "Table '{table}' was left mid-rebuild; its rows are in '{aside}'. \
         Run again with --recover to restore it"
    )]
    InterruptedRebuild {
        /// Table being rebuilt.
        table: String,
        /// Name of the table holding the original rows.
        aside: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
