//! Error types for parsing and checking declared schemas.

/// Errors raised while turning a declared schema into records.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A fragment could not be fully consumed by the grammar.
    #[error("Unable to parse this part of the definition of table '{table}': \"{rest}\" (in \"{fragment}\")")]
    Parse {
        /// Table the fragment belongs to.
        table: String,
        /// The full fragment.
        fragment: String,
        /// The unconsumed suffix.
        rest: String,
    },

    /// The declared schema is inconsistent with itself.
    #[error("Invalid definition of table '{table}': {message}")]
    Definition {
        /// Table being defined.
        table: String,
        /// What is wrong.
        message: String,
    },

    /// Tables reference each other in a cycle.
    #[error("Circular foreign key dependency among tables: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// A schema file could not be read as JSON.
    #[error("Invalid schema description: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn definition(table: &str, message: impl Into<String>) -> Self {
        Self::Definition {
            table: table.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
