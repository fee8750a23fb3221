//! Store errors.

use thiserror::Error;
use uuid::Uuid;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No job row for this id.
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),

    /// A stored column could not be decoded.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}
