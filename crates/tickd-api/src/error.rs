//! Service errors: the structured failure results handed to callers.

use thiserror::Error;
use uuid::Uuid;

use tickd_scheduler::ScheduleError;
use tickd_store::StoreError;

/// Service error types.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No job with this id exists in the registry.
    #[error("job not found: {0}")]
    NotFound(Uuid),

    /// The request was rejected by validation.
    #[error("{0}")]
    Invalid(String),

    /// The live scheduler rejected a resynchronization.
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// The backing store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::JobNotFound(id) => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

impl ServiceError {
    /// Build a validation failure.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
