//! Database-specific error types and conversions.

use lapdist_core::error::LapdistError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String },
}

impl DbError {
    /// Classify a failed statement, surfacing unique-index and
    /// duplicate-record failures as [`DbError::Conflict`].
    pub(crate) fn from_statement(err: surrealdb::Error, entity: &str) -> Self {
        let message = err.to_string();
        if is_unique_violation(&message) {
            DbError::Conflict {
                entity: entity.into(),
            }
        } else {
            DbError::Migration(message)
        }
    }
}

pub(crate) fn is_unique_violation(message: &str) -> bool {
    message.contains("already contains") || message.contains("already exists")
}

impl From<DbError> for LapdistError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LapdistError::NotFound { entity, id },
            DbError::Conflict { entity } => LapdistError::AlreadyExists { entity },
            other => LapdistError::Database(other.to_string()),
        }
    }
}
