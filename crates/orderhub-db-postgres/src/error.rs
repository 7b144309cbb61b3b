//! Error types for the PostgreSQL backend.

use orderhub_storage::StorageError;

/// Errors specific to the PostgreSQL backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(#[from] sqlx_core::error::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Database(e) => match e {
                sqlx_core::error::Error::PoolTimedOut | sqlx_core::error::Error::Io(_) => {
                    StorageError::connection(e.to_string())
                }
                other => StorageError::internal(other.to_string()),
            },
            PostgresError::Migration(e) => StorageError::internal(format!("migration error: {e}")),
            PostgresError::Config { message } => {
                StorageError::internal(format!("configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = PostgresError::config("missing url");
        assert!(err.to_string().contains("configuration error"));

        let err = PostgresError::Migration("checksum".to_string());
        assert!(err.to_string().contains("migration error"));
    }

    #[test]
    fn conversion_to_storage_error() {
        let err: StorageError = PostgresError::config("bad").into();
        assert!(matches!(err, StorageError::Internal { .. }));
    }
}
