//! Job registry service: the CRUD surface a web layer would sit on.
//!
//! Every mutation follows the same shape: validate first, write to the
//! durable store, then resynchronize the live trigger set. Callers regain
//! control only after both the write and the resync are done.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use tickd_core::{Invocation, JobDefinition, JobStatus, JobUpdate, TargetRegistry};
use tickd_scheduler::Scheduler;
use tickd_store::{JobFilter, JobStore, Page, PageRequest};

use crate::error::ServiceError;

/// URL schemes banned from invocation targets. A job target is a registry
/// key, never a network location.
const FORBIDDEN_SCHEMES: &[&str] = &["rmi://", "ldap://", "ldaps://", "http://", "https://"];

/// Job registry service.
pub struct JobService {
    store: Arc<dyn JobStore>,
    scheduler: Arc<Scheduler>,
    registry: Arc<TargetRegistry>,
}

impl JobService {
    /// Create the service over its store, scheduler and target registry.
    pub fn new(
        store: Arc<dyn JobStore>,
        scheduler: Arc<Scheduler>,
        registry: Arc<TargetRegistry>,
    ) -> Self {
        Self {
            store,
            scheduler,
            registry,
        }
    }

    /// List job definitions matching a filter, paged.
    pub async fn list_jobs(
        &self,
        filter: &JobFilter,
        page: PageRequest,
    ) -> Result<Page<JobDefinition>, ServiceError> {
        Ok(self.store.list(filter, page).await?)
    }

    /// Get one job definition.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown id.
    pub async fn get_job(&self, id: Uuid) -> Result<JobDefinition, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    /// Add a new job. The definition is validated, persisted, and (when its
    /// status is NORMAL) registered in the live scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Invalid`] for a bad trigger, a malformed or
    /// unregistered invocation target, bad kwargs, or a duplicate
    /// definition.
    pub async fn add_job(&self, def: JobDefinition) -> Result<Uuid, ServiceError> {
        self.validate(&def).await?;
        self.store.add(&def).await?;
        if def.status == JobStatus::Normal {
            self.scheduler.register(&def).await?;
        }
        info!(job = %def.name, id = %def.id, "job added");
        Ok(def.id)
    }

    /// Edit an existing job. The merged definition is validated before any
    /// write; on success the live trigger is replaced (or dropped when the
    /// edit pauses the job).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown id, or
    /// [`ServiceError::Invalid`] as for [`add_job`](Self::add_job).
    pub async fn edit_job(
        &self,
        id: Uuid,
        update: JobUpdate,
    ) -> Result<JobDefinition, ServiceError> {
        let mut candidate = self.get_job(id).await?;
        update.clone().apply(&mut candidate);
        self.validate(&candidate).await?;

        let updated = self.store.update(id, update).await?;
        self.scheduler.reschedule(&updated).await?;
        info!(job = %updated.name, id = %id, "job edited");
        Ok(updated)
    }

    /// Delete jobs. In-flight executions are allowed to finish; their logs
    /// are recorded against the fire-time snapshot.
    pub async fn delete_jobs(&self, ids: &[Uuid]) -> Result<(), ServiceError> {
        for id in ids {
            self.store.delete(*id).await?;
            self.scheduler.unregister(*id).await;
        }
        info!(count = ids.len(), "jobs deleted");
        Ok(())
    }

    /// Flip a job between NORMAL and PAUSED, resynchronizing the live
    /// trigger set. Setting the current status is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown id.
    pub async fn change_status(
        &self,
        id: Uuid,
        status: JobStatus,
    ) -> Result<(), ServiceError> {
        let def = self.get_job(id).await?;
        if def.status == status {
            return Ok(());
        }

        let updated = self
            .store
            .update(
                id,
                JobUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;

        match status {
            JobStatus::Normal => {
                if self.scheduler.is_scheduled(id).await {
                    self.scheduler.resume(id).await?;
                } else {
                    self.scheduler.register(&updated).await?;
                }
            }
            JobStatus::Paused => {
                if self.scheduler.is_scheduled(id).await {
                    self.scheduler.pause(id).await?;
                }
            }
        }
        info!(job = %updated.name, status = status.as_str(), "job status changed");
        Ok(())
    }

    /// Execute a job immediately from its stored snapshot, regardless of
    /// paused status. The run is subject to the execution guard and the
    /// executor pool; the schedule is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for an unknown id.
    pub async fn run_once(&self, id: Uuid) -> Result<(), ServiceError> {
        let def = self.get_job(id).await?;
        info!(job = %def.name, id = %id, "manual run requested");
        self.scheduler.run_once(&def).await;
        Ok(())
    }

    async fn validate(&self, def: &JobDefinition) -> Result<(), ServiceError> {
        def.trigger
            .validate()
            .map_err(|e| ServiceError::invalid(e.to_string()))?;

        let target = def.invoke_target.to_lowercase();
        for scheme in FORBIDDEN_SCHEMES {
            if target.contains(scheme) {
                return Err(ServiceError::invalid(format!(
                    "invocation target must not contain '{scheme}'"
                )));
            }
        }
        if !self.registry.contains(&def.invoke_target) {
            return Err(ServiceError::invalid(format!(
                "invocation target not registered: '{}'",
                def.invoke_target
            )));
        }

        Invocation::parse(&def.args, &def.kwargs)
            .map_err(|e| ServiceError::invalid(e.to_string()))?;

        if let Some(existing) = self.store.find_matching(def).await? {
            if existing.id != def.id {
                return Err(ServiceError::invalid(format!(
                    "a job with the same definition already exists: '{}'",
                    existing.name
                )));
            }
        }
        Ok(())
    }
}
