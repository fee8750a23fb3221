//! Execution log records.
//!
//! One record is appended per firing attempt and never updated. Job fields
//! are denormalized copies taken at fire time, so historical logs remain
//! accurate even if the definition is later edited or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::JobDefinition;

/// Outcome of a firing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// The callable completed normally.
    Success,
    /// The callable failed, could not be resolved, or the fire was skipped.
    Failure,
}

impl LogStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failure" => Some(Self::Failure),
            _ => None,
        }
    }
}

/// An immutable record of one firing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobExecutionLog {
    /// Unique log id.
    pub id: Uuid,
    /// Job id at fire time.
    pub job_id: Uuid,
    /// Denormalized job name.
    pub job_name: String,
    /// Denormalized job group.
    pub job_group: String,
    /// Denormalized executor group.
    pub executor: String,
    /// Denormalized invocation target.
    pub invoke_target: String,
    /// Denormalized positional arguments.
    pub args: String,
    /// Denormalized keyword arguments.
    pub kwargs: String,
    /// Human-readable summary of the trigger that caused this run.
    pub trigger_descriptor: String,
    /// Outcome.
    pub status: LogStatus,
    /// Free-text message.
    pub message: String,
    /// Captured exception detail for failures.
    pub exception: Option<String>,
    /// Execution duration in milliseconds.
    pub duration_ms: i64,
    /// When the fire was dispatched.
    pub fired_at: DateTime<Utc>,
    /// When the attempt finished.
    pub finished_at: DateTime<Utc>,
}

impl JobExecutionLog {
    /// Record a successful run.
    pub fn success(
        def: &JobDefinition,
        trigger_descriptor: impl Into<String>,
        message: impl Into<String>,
        fired_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self::record(
            def,
            trigger_descriptor,
            LogStatus::Success,
            message,
            None,
            fired_at,
            finished_at,
        )
    }

    /// Record a failed or skipped run.
    pub fn failure(
        def: &JobDefinition,
        trigger_descriptor: impl Into<String>,
        message: impl Into<String>,
        exception: Option<String>,
        fired_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self::record(
            def,
            trigger_descriptor,
            LogStatus::Failure,
            message,
            exception,
            fired_at,
            finished_at,
        )
    }

    fn record(
        def: &JobDefinition,
        trigger_descriptor: impl Into<String>,
        status: LogStatus,
        message: impl Into<String>,
        exception: Option<String>,
        fired_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: def.id,
            job_name: def.name.clone(),
            job_group: def.group.clone(),
            executor: def.executor.clone(),
            invoke_target: def.invoke_target.clone(),
            args: def.args.clone(),
            kwargs: def.kwargs.clone(),
            trigger_descriptor: trigger_descriptor.into(),
            status,
            message: message.into(),
            exception,
            duration_ms: (finished_at - fired_at).num_milliseconds(),
            fired_at,
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerSpec;
    use chrono::Duration;

    #[test]
    fn success_log_snapshots_definition() {
        let def = JobDefinition::new("sync", "default", "sync:pull", TriggerSpec::interval_secs(5))
            .with_args("a,b")
            .with_kwargs(r#"{"depth":1}"#);
        let fired = Utc::now();
        let finished = fired + Duration::milliseconds(42);

        let log = JobExecutionLog::success(&def, def.trigger.describe(), "ok", fired, finished);

        assert_eq!(log.job_id, def.id);
        assert_eq!(log.job_name, "sync");
        assert_eq!(log.invoke_target, "sync:pull");
        assert_eq!(log.args, "a,b");
        assert_eq!(log.status, LogStatus::Success);
        assert_eq!(log.duration_ms, 42);
        assert!(log.exception.is_none());
    }

    #[test]
    fn failure_log_captures_exception() {
        let def = JobDefinition::new("sync", "default", "sync:pull", TriggerSpec::interval_secs(5));
        let now = Utc::now();
        let log = JobExecutionLog::failure(
            &def,
            "manual",
            "execution failed",
            Some("boom".to_string()),
            now,
            now,
        );
        assert_eq!(log.status, LogStatus::Failure);
        assert_eq!(log.exception.as_deref(), Some("boom"));
        assert_eq!(log.trigger_descriptor, "manual");
    }
}
