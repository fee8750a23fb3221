//! The trigger scheduler.
//!
//! Live scheduling state is a single trigger table guarded by one
//! `tokio::sync::Mutex`. Dispatch loops are created lazily, one per executor
//! group; each loop scans its group's due entries, spawns their fires, and
//! sleeps until the group's earliest upcoming fire, interruptible by a
//! per-group `Notify` whenever the table changes.
//!
//! Per job id the table is a small state machine: unregistered → scheduled →
//! (paused ⇄ scheduled) → unregistered. Paused entries stay in the table
//! with their definition; they are simply excluded from the due scan.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tickd_core::{JobDefinition, JobStatus, TargetRegistry, TriggerSpec, TriggerSpecError};
use tickd_store::{JobStore, LogStore};

use crate::config::SchedulerConfig;
use crate::dispatch::Dispatcher;
use crate::error::ScheduleError;
use crate::log_writer::LogWriter;
use crate::pool::ExecutorPools;
use crate::reconcile::{collect_missed, reconcile};

/// Cap on occurrence hops when rolling a next-fire time forward past `now`.
const MAX_ADVANCE: usize = 10_000;

/// Idle sleep for a group loop with nothing scheduled; a `Notify` wakes it
/// earlier on any table change.
const IDLE_SLEEP: StdDuration = StdDuration::from_secs(60);

struct TriggerEntry {
    def: JobDefinition,
    next_fire: Option<DateTime<Utc>>,
    paused: bool,
}

#[derive(Default)]
struct TriggerTable {
    entries: HashMap<Uuid, TriggerEntry>,
    /// Wakeup handles per executor group; presence means the loop is running.
    groups: HashMap<String, Arc<Notify>>,
}

#[derive(Default)]
struct DueScan {
    fires: Vec<JobDefinition>,
    persists: Vec<(Uuid, Option<DateTime<Utc>>)>,
    next_wakeup: Option<DateTime<Utc>>,
}

/// In-memory trigger scheduler over a durable job store.
pub struct Scheduler {
    table: Mutex<TriggerTable>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn JobStore>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler. Dispatch loops start lazily as jobs register.
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn JobStore>,
        logs: Arc<dyn LogStore>,
        registry: Arc<TargetRegistry>,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            ExecutorPools::new(config.clone()),
            LogWriter::new(logs),
            config.misfire_grace(),
        ));
        Arc::new(Self {
            table: Mutex::new(TriggerTable::default()),
            dispatcher,
            store,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Register a job in the trigger table.
    ///
    /// When the definition carries a persisted `next_fire_time` in the past
    /// (the process was down across a scheduled fire), the job's misfire
    /// policy decides the catch-up fires; the table entry then continues
    /// from the next future occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::DuplicateJob`] if the id is already live,
    /// or [`ScheduleError::InvalidTrigger`] for an invalid trigger spec.
    pub async fn register(self: &Arc<Self>, def: &JobDefinition) -> Result<(), ScheduleError> {
        def.trigger.validate()?;
        let now = Utc::now();
        let grace = self.grace();

        let mut catch_up = 0usize;
        let next = match def.next_fire_time {
            Some(persisted) if persisted <= now => {
                if now - persisted > grace {
                    let missed = collect_missed(&def.trigger, persisted, now)?;
                    catch_up = reconcile(&missed, now, def.misfire_policy).len();
                } else {
                    // Within grace: a late fire, not a misfire.
                    catch_up = 1;
                }
                advance_after(&def.trigger, persisted, now)?
            }
            Some(persisted) => Some(persisted),
            None => def.trigger.next_fire_time(now)?,
        };

        let paused = def.status == JobStatus::Paused;
        let notify = {
            let mut table = self.table.lock().await;
            if table.entries.contains_key(&def.id) {
                return Err(ScheduleError::DuplicateJob(def.id));
            }
            table.entries.insert(
                def.id,
                TriggerEntry {
                    def: def.clone(),
                    next_fire: next,
                    paused,
                },
            );
            self.ensure_group(&mut table, &def.executor)
        };

        self.persist_next(def.id, next).await;
        debug!(job = %def.name, next = ?next, catch_up, "job registered");

        if !paused {
            for _ in 0..catch_up {
                let dispatcher = Arc::clone(&self.dispatcher);
                let fire_def = def.clone();
                let descriptor = def.trigger.describe();
                tokio::spawn(async move { dispatcher.execute_fire(&fire_def, &descriptor).await });
            }
        }
        notify.notify_one();
        Ok(())
    }

    /// Replace a job's live trigger with its (possibly edited) definition.
    ///
    /// The old entry, if any, is dropped and the next fire is recomputed
    /// from now; missing entries are simply registered.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidTrigger`] for an invalid trigger spec.
    pub async fn reschedule(self: &Arc<Self>, def: &JobDefinition) -> Result<(), ScheduleError> {
        def.trigger.validate()?;
        let now = Utc::now();
        let next = def.trigger.next_fire_time(now)?;
        let paused = def.status == JobStatus::Paused;

        let notify = {
            let mut table = self.table.lock().await;
            table.entries.remove(&def.id);
            table.entries.insert(
                def.id,
                TriggerEntry {
                    def: def.clone(),
                    next_fire: next,
                    paused,
                },
            );
            self.ensure_group(&mut table, &def.executor)
        };

        self.persist_next(def.id, next).await;
        debug!(job = %def.name, next = ?next, "job rescheduled");
        notify.notify_one();
        Ok(())
    }

    /// Pause a live job. The entry stays in the table; fires stop.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NotRegistered`] if the id is not live.
    pub async fn pause(&self, id: Uuid) -> Result<(), ScheduleError> {
        let notify = {
            let mut table = self.table.lock().await;
            let entry = table
                .entries
                .get_mut(&id)
                .ok_or(ScheduleError::NotRegistered(id))?;
            entry.paused = true;
            debug!(job = %entry.def.name, "job paused");
            let executor = entry.def.executor.clone();
            table.groups.get(&executor).cloned()
        };
        if let Some(notify) = notify {
            notify.notify_one();
        }
        Ok(())
    }

    /// Resume a paused job. Occurrences that came due during the pause are
    /// never replayed one-for-one; the job's misfire policy decides the
    /// catch-up fires, and the schedule continues from the next future
    /// occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::NotRegistered`] if the id is not live.
    pub async fn resume(&self, id: Uuid) -> Result<(), ScheduleError> {
        let now = Utc::now();
        let grace = self.grace();
        let (def, next, catch_up, notify) = {
            let mut table = self.table.lock().await;
            let entry = table
                .entries
                .get_mut(&id)
                .ok_or(ScheduleError::NotRegistered(id))?;

            let mut catch_up = 0usize;
            let next = match entry.next_fire {
                Some(frozen) if frozen <= now => {
                    if now - frozen > grace {
                        let missed = collect_missed(&entry.def.trigger, frozen, now)?;
                        catch_up = reconcile(&missed, now, entry.def.misfire_policy).len();
                    } else {
                        catch_up = 1;
                    }
                    advance_after(&entry.def.trigger, frozen, now)?
                }
                Some(frozen) => Some(frozen),
                None => entry.def.trigger.next_fire_time(now)?,
            };
            entry.paused = false;
            entry.next_fire = next;
            debug!(job = %entry.def.name, next = ?next, catch_up, "job resumed");
            let executor = entry.def.executor.clone();
            (
                entry.def.clone(),
                next,
                catch_up,
                table.groups.get(&executor).cloned(),
            )
        };
        self.persist_next(id, next).await;
        for _ in 0..catch_up {
            let dispatcher = Arc::clone(&self.dispatcher);
            let fire_def = def.clone();
            let descriptor = def.trigger.describe();
            tokio::spawn(async move { dispatcher.execute_fire(&fire_def, &descriptor).await });
        }
        if let Some(notify) = notify {
            notify.notify_one();
        }
        Ok(())
    }

    /// Remove a job from the trigger table. Absent ids are a no-op.
    pub async fn unregister(&self, id: Uuid) {
        let notify = {
            let mut table = self.table.lock().await;
            match table.entries.remove(&id) {
                Some(entry) => {
                    debug!(job = %entry.def.name, "job unregistered");
                    table.groups.get(&entry.def.executor).cloned()
                }
                None => None,
            }
        };
        if let Some(notify) = notify {
            notify.notify_one();
        }
    }

    /// Execute a definition immediately, bypassing the trigger table and the
    /// misfire policy. The run is still subject to the execution guard and
    /// the executor pool; paused status and the next fire time are untouched.
    pub async fn run_once(&self, def: &JobDefinition) {
        self.dispatcher.execute_fire(def, "manual").await;
    }

    /// Register every enabled definition from the store, skipping (with a
    /// diagnostic) definitions that fail validation.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Store`] if the store itself fails.
    pub async fn load_from_store(self: &Arc<Self>) -> Result<usize, ScheduleError> {
        let defs = self.store.load_enabled().await?;
        let mut loaded = 0usize;
        for def in defs {
            match self.register(&def).await {
                Ok(()) => loaded += 1,
                Err(e) => {
                    warn!(job = %def.name, error = %e, "skipping job at startup");
                }
            }
        }
        info!(loaded, "enabled jobs loaded from store");
        Ok(loaded)
    }

    /// Whether a job id is live (scheduled or paused).
    pub async fn is_scheduled(&self, id: Uuid) -> bool {
        self.table.lock().await.entries.contains_key(&id)
    }

    /// Whether a job id is live and paused.
    pub async fn is_paused(&self, id: Uuid) -> bool {
        self.table
            .lock()
            .await
            .entries
            .get(&id)
            .is_some_and(|e| e.paused)
    }

    /// The job's next computed fire time, if live and still firing.
    pub async fn next_fire_time(&self, id: Uuid) -> Option<DateTime<Utc>> {
        self.table
            .lock()
            .await
            .entries
            .get(&id)
            .and_then(|e| e.next_fire)
    }

    /// Number of live entries.
    pub async fn job_count(&self) -> usize {
        self.table.lock().await.entries.len()
    }

    /// Stop the dispatch loops. In-flight executions run to completion.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let table = self.table.lock().await;
        for notify in table.groups.values() {
            notify.notify_one();
        }
        info!("scheduler shut down");
    }

    fn grace(&self) -> Duration {
        Duration::milliseconds(self.config.misfire_grace_ms as i64)
    }

    fn ensure_group(self: &Arc<Self>, table: &mut TriggerTable, executor: &str) -> Arc<Notify> {
        if let Some(notify) = table.groups.get(executor) {
            return Arc::clone(notify);
        }
        let notify = Arc::new(Notify::new());
        table
            .groups
            .insert(executor.to_string(), Arc::clone(&notify));

        let scheduler = Arc::clone(self);
        let group = executor.to_string();
        let wakeup = Arc::clone(&notify);
        tokio::spawn(async move { scheduler.run_group_loop(group, wakeup).await });
        notify
    }

    async fn run_group_loop(self: Arc<Self>, executor: String, notify: Arc<Notify>) {
        debug!(executor, "dispatch loop started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            let now = Utc::now();
            let scan = {
                let mut table = self.table.lock().await;
                self.scan_due(&mut table, &executor, now)
            };
            for (id, next) in scan.persists {
                self.persist_next(id, next).await;
            }
            for def in scan.fires {
                let dispatcher = Arc::clone(&self.dispatcher);
                let descriptor = def.trigger.describe();
                tokio::spawn(async move { dispatcher.execute_fire(&def, &descriptor).await });
            }

            let sleep_for = match scan.next_wakeup {
                Some(at) => (at - Utc::now()).to_std().unwrap_or(StdDuration::ZERO),
                None => IDLE_SLEEP,
            };
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = notify.notified() => {}
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
        debug!(executor, "dispatch loop stopped");
    }

    /// Collect this group's due fires, advance their next-fire times, and
    /// compute the earliest upcoming fire.
    fn scan_due(&self, table: &mut TriggerTable, executor: &str, now: DateTime<Utc>) -> DueScan {
        let grace = self.grace();
        let mut scan = DueScan::default();

        for entry in table
            .entries
            .values_mut()
            .filter(|e| e.def.executor == executor && !e.paused)
        {
            let Some(due) = entry.next_fire else {
                continue;
            };
            if due > now {
                scan.next_wakeup = Some(scan.next_wakeup.map_or(due, |w| w.min(due)));
                continue;
            }

            if now - due > grace {
                // The loop fell behind past the grace: treat the backlog as
                // missed occurrences and apply the misfire policy.
                match collect_missed(&entry.def.trigger, due, now) {
                    Ok(missed) => {
                        for _ in reconcile(&missed, now, entry.def.misfire_policy) {
                            scan.fires.push(entry.def.clone());
                        }
                    }
                    Err(e) => {
                        warn!(job = %entry.def.name, error = %e, "trigger evaluation failed");
                    }
                }
            } else {
                scan.fires.push(entry.def.clone());
            }

            match advance_after(&entry.def.trigger, due, now) {
                Ok(next) => {
                    entry.next_fire = next;
                    scan.persists.push((entry.def.id, next));
                    if let Some(next) = next {
                        scan.next_wakeup = Some(scan.next_wakeup.map_or(next, |w| w.min(next)));
                    }
                }
                Err(e) => {
                    warn!(job = %entry.def.name, error = %e, "trigger evaluation failed, job disabled");
                    entry.next_fire = None;
                    scan.persists.push((entry.def.id, None));
                }
            }
        }
        scan
    }

    async fn persist_next(&self, id: Uuid, next: Option<DateTime<Utc>>) {
        if let Err(e) = self.store.save_next_fire_time(id, next).await {
            warn!(job_id = %id, error = %e, "failed to persist next fire time");
        }
    }
}

/// Roll a next-fire time forward from `from` to the first occurrence
/// strictly after `now`.
fn advance_after(
    spec: &TriggerSpec,
    from: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, TriggerSpecError> {
    let mut next = spec.next_fire_time(from)?;
    let mut hops = 0usize;
    while let Some(t) = next {
        if t > now {
            return Ok(Some(t));
        }
        hops += 1;
        if hops > MAX_ADVANCE {
            return spec.next_fire_time(now);
        }
        next = spec.next_fire_time(t)?;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
    use tickd_core::{ConcurrencyPolicy, MisfirePolicy, TargetHandler};
    use tickd_store::{LogFilter, MemoryJobStore, MemoryLogStore, PageRequest};

    struct Rig {
        scheduler: Arc<Scheduler>,
        jobs: Arc<MemoryJobStore>,
        logs: Arc<MemoryLogStore>,
        ticks: Arc<AtomicU32>,
        concurrent_max: Arc<AtomicI32>,
    }

    fn rig_with_config(config: SchedulerConfig) -> Rig {
        let ticks = Arc::new(AtomicU32::new(0));
        let concurrent = Arc::new(AtomicI32::new(0));
        let concurrent_max = Arc::new(AtomicI32::new(0));

        let registry = TargetRegistry::new();
        {
            let ticks = Arc::clone(&ticks);
            registry
                .register(
                    "demo:tick",
                    TargetHandler::from_async(move |_| {
                        let ticks = Arc::clone(&ticks);
                        async move {
                            ticks.fetch_add(1, Ordering::SeqCst);
                            Ok("tick".to_string())
                        }
                    }),
                )
                .unwrap();
        }
        {
            let ticks = Arc::clone(&ticks);
            let concurrent = Arc::clone(&concurrent);
            let concurrent_max = Arc::clone(&concurrent_max);
            registry
                .register(
                    "demo:slow",
                    TargetHandler::from_async(move |_| {
                        let ticks = Arc::clone(&ticks);
                        let concurrent = Arc::clone(&concurrent);
                        let concurrent_max = Arc::clone(&concurrent_max);
                        async move {
                            let live = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                            concurrent_max.fetch_max(live, Ordering::SeqCst);
                            tokio::time::sleep(StdDuration::from_millis(200)).await;
                            concurrent.fetch_sub(1, Ordering::SeqCst);
                            ticks.fetch_add(1, Ordering::SeqCst);
                            Ok("slow tick".to_string())
                        }
                    }),
                )
                .unwrap();
        }

        let jobs = Arc::new(MemoryJobStore::new());
        let logs = Arc::new(MemoryLogStore::new());
        let scheduler = Scheduler::new(
            config,
            jobs.clone() as Arc<dyn JobStore>,
            logs.clone() as Arc<dyn LogStore>,
            Arc::new(registry),
        );
        Rig {
            scheduler,
            jobs,
            logs,
            ticks,
            concurrent_max,
        }
    }

    fn rig() -> Rig {
        rig_with_config(SchedulerConfig::default())
    }

    fn tick_job(every_ms: u64) -> JobDefinition {
        JobDefinition::new("ticker", "default", "demo:tick", TriggerSpec::interval_ms(every_ms))
    }

    #[tokio::test]
    async fn interval_job_fires_repeatedly() {
        let rig = rig();
        let def = tick_job(50);
        rig.jobs.add(&def).await.unwrap();
        rig.scheduler.register(&def).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(300)).await;
        rig.scheduler.shutdown().await;

        let fired = rig.ticks.load(Ordering::SeqCst);
        assert!(fired >= 2, "expected repeated fires, got {fired}");

        // Every fire produced exactly one log row.
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let page = rig
            .logs
            .list(&LogFilter::default(), PageRequest::new(1, 100))
            .await
            .unwrap();
        assert!(page.total >= fired as u64);
    }

    #[tokio::test]
    async fn duplicate_register_is_rejected() {
        let rig = rig();
        let def = tick_job(60_000);
        rig.scheduler.register(&def).await.unwrap();

        let err = rig.scheduler.register(&def).await.unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicateJob(id) if id == def.id));
        rig.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_trigger_is_rejected_at_registration() {
        let rig = rig();
        let def = JobDefinition::new("bad", "default", "demo:tick", TriggerSpec::cron("nope"));
        assert!(matches!(
            rig.scheduler.register(&def).await,
            Err(ScheduleError::InvalidTrigger(_))
        ));
        assert!(!rig.scheduler.is_scheduled(def.id).await);
    }

    #[tokio::test]
    async fn pause_stops_fires_and_resume_restarts() {
        let rig = rig();
        let def = tick_job(50);
        rig.jobs.add(&def).await.unwrap();
        rig.scheduler.register(&def).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(150)).await;
        rig.scheduler.pause(def.id).await.unwrap();
        assert!(rig.scheduler.is_paused(def.id).await);

        // Drain in-flight fires, then verify the count stays put.
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        let while_paused = rig.ticks.load(Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert_eq!(rig.ticks.load(Ordering::SeqCst), while_paused);

        rig.scheduler.resume(def.id).await.unwrap();
        assert!(!rig.scheduler.is_paused(def.id).await);
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert!(rig.ticks.load(Ordering::SeqCst) > while_paused);

        rig.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn pause_unknown_job_errors() {
        let rig = rig();
        let id = Uuid::new_v4();
        assert!(matches!(
            rig.scheduler.pause(id).await,
            Err(ScheduleError::NotRegistered(_))
        ));
        assert!(matches!(
            rig.scheduler.resume(id).await,
            Err(ScheduleError::NotRegistered(_))
        ));
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let rig = rig();
        let def = tick_job(60_000);
        rig.scheduler.register(&def).await.unwrap();
        assert!(rig.scheduler.is_scheduled(def.id).await);

        rig.scheduler.unregister(def.id).await;
        assert!(!rig.scheduler.is_scheduled(def.id).await);
        rig.scheduler.unregister(def.id).await;
        rig.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn run_once_executes_paused_job_without_touching_schedule() {
        let rig = rig();
        let def = tick_job(60_000).with_status(JobStatus::Paused);
        rig.scheduler.register(&def).await.unwrap();
        assert!(rig.scheduler.is_paused(def.id).await);

        rig.scheduler.run_once(&def).await;

        assert_eq!(rig.ticks.load(Ordering::SeqCst), 1);
        assert!(rig.scheduler.is_paused(def.id).await);

        let page = rig
            .logs
            .list(&LogFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.rows[0].trigger_descriptor, "manual");
        rig.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn forbid_never_overlaps_and_logs_skips() {
        let rig = rig();
        let def = JobDefinition::new(
            "no-overlap",
            "default",
            "demo:slow",
            TriggerSpec::interval_ms(50),
        )
        .with_concurrency(ConcurrencyPolicy::Forbid);
        rig.scheduler.register(&def).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(500)).await;
        rig.scheduler.shutdown().await;
        tokio::time::sleep(StdDuration::from_millis(250)).await;

        assert_eq!(rig.concurrent_max.load(Ordering::SeqCst), 1);

        let page = rig
            .logs
            .list(&LogFilter::default(), PageRequest::new(1, 100))
            .await
            .unwrap();
        assert!(
            page.rows
                .iter()
                .any(|r| r.message.starts_with("skipped")),
            "expected at least one skip log"
        );
    }

    #[tokio::test]
    async fn allow_permits_overlapping_runs() {
        let rig = rig();
        let def = JobDefinition::new(
            "overlap",
            "default",
            "demo:slow",
            TriggerSpec::interval_ms(50),
        )
        .with_concurrency(ConcurrencyPolicy::Allow);
        rig.scheduler.register(&def).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(500)).await;
        rig.scheduler.shutdown().await;
        tokio::time::sleep(StdDuration::from_millis(250)).await;

        assert!(rig.concurrent_max.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn startup_misfire_policies() {
        for (policy, expected_fires) in [
            (MisfirePolicy::Discard, 0u32),
            (MisfirePolicy::FireOnce, 1),
            (MisfirePolicy::FireImmediately, 1),
        ] {
            let rig = rig();
            let mut def = tick_job(10_000).with_misfire_policy(policy);
            // The process was "down" across several occurrences.
            def.next_fire_time = Some(Utc::now() - Duration::seconds(60));
            rig.jobs.add(&def).await.unwrap();

            rig.scheduler.register(&def).await.unwrap();
            tokio::time::sleep(StdDuration::from_millis(100)).await;

            assert_eq!(
                rig.ticks.load(Ordering::SeqCst),
                expected_fires,
                "policy {policy:?}"
            );

            // The table continues from a future occurrence either way.
            let next = rig.scheduler.next_fire_time(def.id).await.unwrap();
            assert!(next > Utc::now());
            rig.scheduler.shutdown().await;
        }
    }

    #[tokio::test]
    async fn resume_applies_misfire_policy_to_paused_window() {
        for (policy, expected_fires) in [(MisfirePolicy::Discard, 0u32), (MisfirePolicy::FireOnce, 1)]
        {
            let mut config = SchedulerConfig::default();
            config.misfire_grace_ms = 100;
            let rig = rig_with_config(config);

            let def = tick_job(200).with_misfire_policy(policy);
            rig.scheduler.register(&def).await.unwrap();
            rig.scheduler.pause(def.id).await.unwrap();

            // Several occurrences come due while paused.
            tokio::time::sleep(StdDuration::from_millis(600)).await;
            rig.scheduler.resume(def.id).await.unwrap();
            tokio::time::sleep(StdDuration::from_millis(100)).await;

            assert_eq!(
                rig.ticks.load(Ordering::SeqCst),
                expected_fires,
                "policy {policy:?}"
            );
            rig.scheduler.shutdown().await;
        }
    }

    #[tokio::test]
    async fn load_from_store_registers_enabled_jobs_only() {
        let rig = rig();
        let enabled = tick_job(60_000);
        let paused = JobDefinition::new(
            "parked",
            "default",
            "demo:tick",
            TriggerSpec::interval_secs(60),
        )
        .with_status(JobStatus::Paused);
        rig.jobs.add(&enabled).await.unwrap();
        rig.jobs.add(&paused).await.unwrap();

        let loaded = rig.scheduler.load_from_store().await.unwrap();
        assert_eq!(loaded, 1);
        assert!(rig.scheduler.is_scheduled(enabled.id).await);
        assert!(!rig.scheduler.is_scheduled(paused.id).await);
        rig.scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_firing() {
        let rig = rig();
        let def = tick_job(50);
        rig.scheduler.register(&def).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(150)).await;
        rig.scheduler.shutdown().await;
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        let after_shutdown = rig.ticks.load(Ordering::SeqCst);
        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert_eq!(rig.ticks.load(Ordering::SeqCst), after_shutdown);
    }

    #[tokio::test]
    async fn reschedule_replaces_trigger() {
        let rig = rig();
        let def = tick_job(60_000);
        rig.jobs.add(&def).await.unwrap();
        rig.scheduler.register(&def).await.unwrap();
        let slow_next = rig.scheduler.next_fire_time(def.id).await.unwrap();

        let mut edited = def.clone();
        edited.trigger = TriggerSpec::interval_ms(50);
        rig.scheduler.reschedule(&edited).await.unwrap();
        let fast_next = rig.scheduler.next_fire_time(def.id).await.unwrap();
        assert!(fast_next < slow_next);

        tokio::time::sleep(StdDuration::from_millis(200)).await;
        assert!(rig.ticks.load(Ordering::SeqCst) >= 1);
        rig.scheduler.shutdown().await;
    }

    #[test]
    fn advance_rolls_past_now() {
        let spec = TriggerSpec::interval_secs(10);
        let now = Utc::now();
        let from = now - Duration::seconds(95);

        let next = advance_after(&spec, from, now).unwrap().unwrap();
        assert!(next > now);
        assert!(next <= now + Duration::seconds(10));
    }
}
