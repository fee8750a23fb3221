//! Execution guard: per-job concurrency admission.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use tickd_core::ConcurrencyPolicy;

/// Tracks in-flight execution counts per job id and admits or skips fires
/// according to the job's concurrency policy.
#[derive(Clone, Default)]
pub struct ExecutionGuard {
    running: Arc<DashMap<Uuid, u32>>,
}

/// Outcome of an admission check.
pub enum Admission {
    /// The fire may run; the permit releases the slot on drop.
    Run(RunPermit),
    /// A previous run is still in progress and the policy forbids overlap.
    Skip,
}

impl ExecutionGuard {
    /// Create a new guard with no in-flight runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or skip a fire for `job_id` under `policy`.
    pub fn admit(&self, job_id: Uuid, policy: ConcurrencyPolicy) -> Admission {
        let mut count = self.running.entry(job_id).or_insert(0);
        if policy == ConcurrencyPolicy::Forbid && *count > 0 {
            return Admission::Skip;
        }
        *count += 1;
        drop(count);
        Admission::Run(RunPermit {
            running: Arc::clone(&self.running),
            job_id,
        })
    }

    /// Number of in-flight runs for a job.
    pub fn running_count(&self, job_id: Uuid) -> u32 {
        self.running.get(&job_id).map(|c| *c).unwrap_or(0)
    }
}

/// RAII token for one admitted run.
pub struct RunPermit {
    running: Arc<DashMap<Uuid, u32>>,
    job_id: Uuid,
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        if let Some(mut count) = self.running.get_mut(&self.job_id) {
            *count = count.saturating_sub(1);
        }
        self.running.remove_if(&self.job_id, |_, count| *count == 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbid_skips_while_running() {
        let guard = ExecutionGuard::new();
        let id = Uuid::new_v4();

        let first = guard.admit(id, ConcurrencyPolicy::Forbid);
        assert!(matches!(first, Admission::Run(_)));
        assert!(matches!(
            guard.admit(id, ConcurrencyPolicy::Forbid),
            Admission::Skip
        ));

        drop(first);
        assert!(matches!(
            guard.admit(id, ConcurrencyPolicy::Forbid),
            Admission::Run(_)
        ));
    }

    #[test]
    fn allow_admits_overlapping_runs() {
        let guard = ExecutionGuard::new();
        let id = Uuid::new_v4();

        let a = guard.admit(id, ConcurrencyPolicy::Allow);
        let b = guard.admit(id, ConcurrencyPolicy::Allow);
        assert!(matches!(a, Admission::Run(_)));
        assert!(matches!(b, Admission::Run(_)));
        assert_eq!(guard.running_count(id), 2);

        drop(a);
        assert_eq!(guard.running_count(id), 1);
        drop(b);
        assert_eq!(guard.running_count(id), 0);
    }

    #[test]
    fn jobs_are_guarded_independently() {
        let guard = ExecutionGuard::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let _running = guard.admit(a, ConcurrencyPolicy::Forbid);
        assert!(matches!(
            guard.admit(b, ConcurrencyPolicy::Forbid),
            Admission::Run(_)
        ));
    }
}
