//! Storage-specific error type wrapping sqlx errors.

use leadflow_domain::error::LeadflowError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize a value into a JSON column.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for LeadflowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Shorthand for `map_err` on sqlx results.
pub(crate) fn db(err: sqlx::Error) -> LeadflowError {
    StorageError::from(err).into()
}

/// Shorthand for `map_err` on serde results.
pub(crate) fn json(err: serde_json::Error) -> LeadflowError {
    StorageError::from(err).into()
}
