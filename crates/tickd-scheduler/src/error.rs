//! Scheduler errors.

use thiserror::Error;
use uuid::Uuid;

use tickd_core::TriggerSpecError;
use tickd_store::StoreError;

/// Scheduler error types.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The job id is already live in the trigger table.
    #[error("job already scheduled: {0}")]
    DuplicateJob(Uuid),

    /// The job id is not in the trigger table.
    #[error("job not scheduled: {0}")]
    NotRegistered(Uuid),

    /// The trigger spec failed validation or evaluation.
    #[error(transparent)]
    InvalidTrigger(#[from] TriggerSpecError),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
