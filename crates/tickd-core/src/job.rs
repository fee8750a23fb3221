//! Job definition and its policies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::trigger::TriggerSpec;

/// Behavior when the scheduler was not running at a scheduled fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MisfirePolicy {
    /// Execute now, exactly once, for the most recent missed occurrence.
    FireImmediately,
    /// Collapse any number of missed occurrences into a single catch-up run.
    FireOnce,
    /// Skip the missed occurrences entirely.
    Discard,
}

impl MisfirePolicy {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FireImmediately => "fire_immediately",
            Self::FireOnce => "fire_once",
            Self::Discard => "discard",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fire_immediately" => Some(Self::FireImmediately),
            "fire_once" => Some(Self::FireOnce),
            "discard" => Some(Self::Discard),
            _ => None,
        }
    }
}

/// Whether overlapping executions of the same job id are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Overlapping executions may run concurrently.
    Allow,
    /// A fire is skipped while a prior execution is still in flight.
    Forbid,
}

impl ConcurrencyPolicy {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Forbid => "forbid",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "forbid" => Some(Self::Forbid),
            _ => None,
        }
    }
}

/// Whether the job's trigger is currently registered in the live scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Exactly one live trigger exists for this job id.
    Normal,
    /// No live trigger; the definition stays in the store.
    Paused,
}

impl JobStatus {
    /// Stable string form used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Paused => "paused",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// A persisted job definition: the durable source of truth for what should
/// run and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Unique, system-generated job id.
    pub id: Uuid,
    /// Human-readable job name. Together with `group` it forms the natural
    /// lookup key; it need not be globally unique.
    pub name: String,
    /// Job group name.
    pub group: String,
    /// Executor group this job runs under; routes the job to the matching
    /// worker pool.
    pub executor: String,
    /// Invocation target, `"module:function"`. Resolved lazily at fire time,
    /// never at registration time.
    pub invoke_target: String,
    /// Comma-separated positional arguments, deserialized before invocation.
    pub args: String,
    /// JSON-object keyword arguments, deserialized before invocation.
    pub kwargs: String,
    /// Trigger specification.
    pub trigger: TriggerSpec,
    /// Misfire policy.
    pub misfire_policy: MisfirePolicy,
    /// Concurrency policy.
    pub concurrency: ConcurrencyPolicy,
    /// Scheduling status.
    pub status: JobStatus,
    /// Next computed fire time, persisted so a restart can detect misfires.
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Creator.
    pub create_by: String,
    /// Creation time.
    pub create_time: DateTime<Utc>,
    /// Last modifier.
    pub update_by: String,
    /// Last modification time.
    pub update_time: DateTime<Utc>,
    /// Free-text remark.
    pub remark: String,
}

impl JobDefinition {
    /// Create a new job definition with default policies: default executor,
    /// fire-once misfire handling, forbidden concurrency, normal status.
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        invoke_target: impl Into<String>,
        trigger: TriggerSpec,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            group: group.into(),
            executor: "default".to_string(),
            invoke_target: invoke_target.into(),
            args: String::new(),
            kwargs: String::new(),
            trigger,
            misfire_policy: MisfirePolicy::FireOnce,
            concurrency: ConcurrencyPolicy::Forbid,
            status: JobStatus::Normal,
            next_fire_time: None,
            create_by: String::new(),
            create_time: now,
            update_by: String::new(),
            update_time: now,
            remark: String::new(),
        }
    }

    /// Set the executor group.
    pub fn with_executor(mut self, executor: impl Into<String>) -> Self {
        self.executor = executor.into();
        self
    }

    /// Set positional arguments (comma-separated).
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// Set keyword arguments (JSON object).
    pub fn with_kwargs(mut self, kwargs: impl Into<String>) -> Self {
        self.kwargs = kwargs.into();
        self
    }

    /// Set the misfire policy.
    pub fn with_misfire_policy(mut self, policy: MisfirePolicy) -> Self {
        self.misfire_policy = policy;
        self
    }

    /// Set the concurrency policy.
    pub fn with_concurrency(mut self, policy: ConcurrencyPolicy) -> Self {
        self.concurrency = policy;
        self
    }

    /// Set the scheduling status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the creator audit field.
    pub fn with_create_by(mut self, create_by: impl Into<String>) -> Self {
        self.create_by = create_by.into();
        self
    }

    /// Set the free-text remark.
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    /// Whether two definitions describe the same work: equal natural key and
    /// invocation. Used for uniqueness probes, ignoring id, status and audit
    /// fields.
    pub fn same_work_as(&self, other: &JobDefinition) -> bool {
        self.name == other.name
            && self.group == other.group
            && self.executor == other.executor
            && self.invoke_target == other.invoke_target
            && self.args == other.args
            && self.kwargs == other.kwargs
            && self.trigger == other.trigger
    }
}

/// Partial update of a job definition.
///
/// `None` fields are left untouched; the store applies the update
/// read-modify-write inside a single transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    pub name: Option<String>,
    pub group: Option<String>,
    pub executor: Option<String>,
    pub invoke_target: Option<String>,
    pub args: Option<String>,
    pub kwargs: Option<String>,
    pub trigger: Option<TriggerSpec>,
    pub misfire_policy: Option<MisfirePolicy>,
    pub concurrency: Option<ConcurrencyPolicy>,
    pub status: Option<JobStatus>,
    pub remark: Option<String>,
    pub update_by: Option<String>,
}

impl JobUpdate {
    /// Apply this update to a definition, refreshing `update_time`.
    pub fn apply(self, def: &mut JobDefinition) {
        if let Some(name) = self.name {
            def.name = name;
        }
        if let Some(group) = self.group {
            def.group = group;
        }
        if let Some(executor) = self.executor {
            def.executor = executor;
        }
        if let Some(invoke_target) = self.invoke_target {
            def.invoke_target = invoke_target;
        }
        if let Some(args) = self.args {
            def.args = args;
        }
        if let Some(kwargs) = self.kwargs {
            def.kwargs = kwargs;
        }
        if let Some(trigger) = self.trigger {
            def.trigger = trigger;
        }
        if let Some(misfire_policy) = self.misfire_policy {
            def.misfire_policy = misfire_policy;
        }
        if let Some(concurrency) = self.concurrency {
            def.concurrency = concurrency;
        }
        if let Some(status) = self.status {
            def.status = status;
        }
        if let Some(remark) = self.remark {
            def.remark = remark;
        }
        if let Some(update_by) = self.update_by {
            def.update_by = update_by;
        }
        def.update_time = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_defaults() {
        let job = JobDefinition::new(
            "nightly-report",
            "reports",
            "reports:generate",
            TriggerSpec::cron("0 0 3 * * *"),
        );
        assert_eq!(job.executor, "default");
        assert_eq!(job.status, JobStatus::Normal);
        assert_eq!(job.concurrency, ConcurrencyPolicy::Forbid);
        assert_eq!(job.misfire_policy, MisfirePolicy::FireOnce);
        assert!(job.next_fire_time.is_none());
    }

    #[test]
    fn policy_string_roundtrip() {
        for policy in [
            MisfirePolicy::FireImmediately,
            MisfirePolicy::FireOnce,
            MisfirePolicy::Discard,
        ] {
            assert_eq!(MisfirePolicy::parse(policy.as_str()), Some(policy));
        }
        for policy in [ConcurrencyPolicy::Allow, ConcurrencyPolicy::Forbid] {
            assert_eq!(ConcurrencyPolicy::parse(policy.as_str()), Some(policy));
        }
        for status in [JobStatus::Normal, JobStatus::Paused] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MisfirePolicy::parse("bogus"), None);
    }

    #[test]
    fn update_applies_only_set_fields() {
        let mut job = JobDefinition::new(
            "sync",
            "default",
            "sync:pull",
            TriggerSpec::interval_secs(60),
        );
        let before = job.update_time;

        let update = JobUpdate {
            remark: Some("hourly sync".to_string()),
            status: Some(JobStatus::Paused),
            ..Default::default()
        };
        update.apply(&mut job);

        assert_eq!(job.remark, "hourly sync");
        assert_eq!(job.status, JobStatus::Paused);
        assert_eq!(job.name, "sync");
        assert!(job.update_time >= before);
    }

    #[test]
    fn same_work_ignores_identity_and_audit() {
        let a = JobDefinition::new("a", "g", "m:f", TriggerSpec::interval_secs(5));
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        b.remark = "different".to_string();
        b.status = JobStatus::Paused;
        assert!(a.same_work_as(&b));

        b.args = "1,2".to_string();
        assert!(!a.same_work_as(&b));
    }
}
