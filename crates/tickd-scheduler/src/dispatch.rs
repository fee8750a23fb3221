//! Fire dispatch: the pipeline between "this job is due" and "one log row".
//!
//! Every firing attempt ends in exactly one execution log record: success,
//! failure, a concurrency skip, or a pool-capacity discard. Resolution and
//! execution errors are converted to FAILURE records here and never
//! propagate into the dispatch loops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use tickd_core::{
    ExecutionError, Invocation, JobDefinition, JobExecutionLog, MisfirePolicy, TargetRegistry,
};

use crate::guard::{Admission, ExecutionGuard};
use crate::log_writer::LogWriter;
use crate::pool::ExecutorPools;

pub(crate) struct Dispatcher {
    registry: Arc<TargetRegistry>,
    guard: ExecutionGuard,
    pools: ExecutorPools,
    log_writer: LogWriter,
    misfire_grace: Duration,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<TargetRegistry>,
        pools: ExecutorPools,
        log_writer: LogWriter,
        misfire_grace: Duration,
    ) -> Self {
        Self {
            registry,
            guard: ExecutionGuard::new(),
            pools,
            log_writer,
            misfire_grace,
        }
    }

    /// Run one firing attempt to completion and record its log row.
    pub(crate) async fn execute_fire(&self, def: &JobDefinition, descriptor: &str) {
        let fired_at = Utc::now();
        let pool = self.pools.get(&def.executor);

        // DISCARD-policy fires that cannot start within the misfire grace
        // are dropped rather than queued.
        let acquired = if def.misfire_policy == MisfirePolicy::Discard {
            match tokio::time::timeout(self.misfire_grace, pool.acquire_owned()).await {
                Ok(result) => result.ok(),
                Err(_) => {
                    warn!(job = %def.name, executor = %def.executor, "fire discarded, pool busy");
                    self.record_failure(
                        def,
                        descriptor,
                        "discarded: executor pool busy beyond misfire grace",
                        None,
                        fired_at,
                    )
                    .await;
                    return;
                }
            }
        } else {
            pool.acquire_owned().await.ok()
        };
        let Some(_pool_permit) = acquired else {
            // Semaphore closed, only possible during teardown.
            return;
        };

        let _run_permit = match self.guard.admit(def.id, def.concurrency) {
            Admission::Run(permit) => permit,
            Admission::Skip => {
                debug!(job = %def.name, "fire skipped, previous run still in progress");
                self.record_failure(
                    def,
                    descriptor,
                    "skipped: previous run still in progress",
                    None,
                    fired_at,
                )
                .await;
                return;
            }
        };

        let result = self.invoke(def).await;
        let finished_at = Utc::now();
        let log = match result {
            Ok(message) => {
                debug!(job = %def.name, target = %def.invoke_target, "fire completed");
                JobExecutionLog::success(def, descriptor, message, fired_at, finished_at)
            }
            Err(e) => {
                warn!(job = %def.name, target = %def.invoke_target, error = %e, "fire failed");
                JobExecutionLog::failure(
                    def,
                    descriptor,
                    "execution failed",
                    Some(e.to_string()),
                    fired_at,
                    finished_at,
                )
            }
        };
        self.log_writer.write(&log).await;
    }

    async fn invoke(&self, def: &JobDefinition) -> Result<String, ExecutionError> {
        let handler = self
            .registry
            .resolve(&def.invoke_target)
            .map_err(|e| ExecutionError::new(e.to_string()))?;
        let invocation = Invocation::parse(&def.args, &def.kwargs)?;
        handler.invoke(invocation).await
    }

    async fn record_failure(
        &self,
        def: &JobDefinition,
        descriptor: &str,
        message: &str,
        exception: Option<String>,
        fired_at: chrono::DateTime<Utc>,
    ) {
        let log =
            JobExecutionLog::failure(def, descriptor, message, exception, fired_at, Utc::now());
        self.log_writer.write(&log).await;
    }
}
