//! C7 — Scheduler: persistent job queue with cron and one-shot triggers,
//! bounded parallel execution, and per-job-id serialization.

pub mod store;
pub mod trigger;

use async_trait::async_trait;
use cerebric_audit::AuditLog;
use cerebric_core::audit::AuditRecord;
use cerebric_core::error::CoreError;
use cerebric_core::types::{Job, JobState, Trigger};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use trigger::next_fire_after;

/// Executes one job's underlying task. Implemented externally by the
/// Decision Loop (C8); the scheduler only knows how to fire it and record
/// the resulting state, not what the task does.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: Job) -> Result<(), CoreError>;
}

/// Queries whether the guardrail engine's safe-mode is active. While true,
/// the scheduler continues to fire triggers but every firing is recorded as
/// `skipped` (P3 safe-mode dominance) rather than dispatched to a worker.
pub trait SafeModeQuery: Send + Sync {
    fn is_active(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync> SafeModeQuery for F {
    fn is_active(&self) -> bool {
        self()
    }
}

struct PassiveSafeMode;
impl SafeModeQuery for PassiveSafeMode {
    fn is_active(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub safe_mode_active: bool,
}

pub struct Scheduler {
    jobs: Mutex<BTreeMap<String, Job>>,
    last_fired: Mutex<HashMap<String, DateTime<Utc>>>,
    running: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    store: store::JobStore,
    audit: Arc<AuditLog>,
    executor: Arc<dyn JobExecutor>,
    safe_mode: Arc<dyn SafeModeQuery>,
    permits: Arc<Semaphore>,
    stop_flag: AtomicBool,
}

impl Scheduler {
    pub fn new(
        data_dir: impl Into<std::path::PathBuf>,
        audit: Arc<AuditLog>,
        executor: Arc<dyn JobExecutor>,
        worker_pool_size: usize,
    ) -> anyhow::Result<Arc<Self>> {
        Self::new_with_safe_mode(data_dir, audit, executor, worker_pool_size, Arc::new(PassiveSafeMode))
    }

    pub fn new_with_safe_mode(
        data_dir: impl Into<std::path::PathBuf>,
        audit: Arc<AuditLog>,
        executor: Arc<dyn JobExecutor>,
        worker_pool_size: usize,
        safe_mode: Arc<dyn SafeModeQuery>,
    ) -> anyhow::Result<Arc<Self>> {
        let store = store::JobStore::new(data_dir)?;
        let jobs = store.load_all(&audit);
        let last_fired = jobs
            .values()
            .map(|job| (job.id.clone(), job.created_at))
            .collect();
        Ok(Arc::new(Self {
            jobs: Mutex::new(jobs),
            last_fired: Mutex::new(last_fired),
            running: Mutex::new(HashMap::new()),
            store,
            audit,
            executor,
            safe_mode,
            permits: Arc::new(Semaphore::new(worker_pool_size.max(1))),
            stop_flag: AtomicBool::new(false),
        }))
    }

    pub async fn add_job(&self, job: Job) -> Result<(), CoreError> {
        self.store
            .save(&job)
            .map_err(|e| CoreError::CapabilityUnavailable(format!("failed to persist job: {e}")))?;
        self.audit.write(
            AuditRecord::new("scheduler", "add_job", true)
                .with_request_id(job.id.clone())
                .with_summary(format!("job scheduled: {}", job.task)),
        );
        self.last_fired
            .lock()
            .await
            .insert(job.id.clone(), job.created_at);
        self.jobs.lock().await.insert(job.id.clone(), job);
        Ok(())
    }

    pub async fn schedule_cron(&self, id: impl Into<String>, task: impl Into<String>, cron_expr: impl Into<String>) -> Result<(), CoreError> {
        self.add_job(Job::new(id, task, Trigger::Cron(cron_expr.into()))).await
    }

    pub async fn schedule_one_time(&self, id: impl Into<String>, task: impl Into<String>, at: DateTime<Utc>) -> Result<(), CoreError> {
        self.add_job(Job::new(id, task, Trigger::At(at))).await
    }

    pub async fn get_job(&self, id: &str) -> Option<Job> {
        self.jobs.lock().await.get(id).cloned()
    }

    /// Sorted by `(priority, created_at)`, matching the declarative ordering
    /// used for CLI listing.
    pub async fn list_jobs(&self, state: Option<JobState>) -> Vec<Job> {
        let jobs = self.jobs.lock().await;
        let mut list: Vec<Job> = jobs
            .values()
            .filter(|j| state.is_none_or(|s| j.state == s))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        list
    }

    /// Deletes pending triggers and marks non-terminal jobs cancelled.
    /// Never interrupts an in-flight invocation. No-op (returns `false`) on
    /// an already-terminal job.
    pub async fn cancel_job(&self, id: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        if job.state.is_terminal() {
            return false;
        }
        let _ = job.transition(JobState::Cancelled);
        let _ = self.store.save(job);
        self.audit.write(
            AuditRecord::new("scheduler", "cancel_job", true)
                .with_request_id(id.to_string())
                .with_summary("job cancelled"),
        );
        true
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }

    /// Runs the producer loop: wakes on `poll_interval`, evaluates every
    /// pending job's trigger, and dispatches due jobs.
    pub async fn run(self: &Arc<Self>, poll_interval: std::time::Duration) {
        while !self.stop_flag.load(Ordering::SeqCst) {
            self.tick().await;
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Evaluates every pending job once; dispatches the ones whose trigger
    /// has fired since it was last evaluated.
    /// Counts of jobs by state plus whether safe-mode is currently active.
    pub async fn status(&self) -> SchedulerStatus {
        let jobs = self.jobs.lock().await;
        let mut status = SchedulerStatus {
            safe_mode_active: self.safe_mode.is_active(),
            ..Default::default()
        };
        for job in jobs.values() {
            match job.state {
                JobState::Pending => status.pending += 1,
                JobState::Running => status.running += 1,
                JobState::Completed => status.completed += 1,
                JobState::Failed => status.failed += 1,
                JobState::Cancelled => status.cancelled += 1,
                JobState::Skipped => status.skipped += 1,
                JobState::Rejected => status.rejected += 1,
            }
        }
        status
    }

    pub async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        let due_ids = self.due_job_ids(now).await;
        for id in due_ids {
            self.fire(id, now).await;
        }
    }

    async fn due_job_ids(&self, now: DateTime<Utc>) -> Vec<String> {
        let jobs = self.jobs.lock().await;
        let last_fired = self.last_fired.lock().await;
        jobs.values()
            .filter(|job| job.state == JobState::Pending)
            .filter_map(|job| {
                let after = *last_fired.get(&job.id).unwrap_or(&job.created_at);
                match next_fire_after(&job.trigger, after) {
                    Ok(Some(next)) if next <= now => Some(job.id.clone()),
                    _ => None,
                }
            })
            .collect()
    }

    async fn fire(self: &Arc<Self>, id: String, now: DateTime<Utc>) {
        self.last_fired.lock().await.insert(id.clone(), now);

        if self.safe_mode.is_active() {
            let mut jobs = self.jobs.lock().await;
            if let Some(job) = jobs.get_mut(&id) {
                let _ = job.transition(JobState::Skipped);
                let _ = self.store.save(job);
            }
            drop(jobs);
            self.audit.write(
                AuditRecord::new("scheduler", "skipped_safe_mode", true)
                    .with_request_id(id.clone())
                    .with_summary("job skipped: safe-mode active"),
            );
            return;
        }

        let job_lock = {
            let mut running = self.running.lock().await;
            running.entry(id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };

        if job_lock.try_lock().is_err() {
            // max_instances=1: a prior firing for this id is still running.
            self.audit.write(
                AuditRecord::new("scheduler", "misfire", true)
                    .with_request_id(id.clone())
                    .with_summary("job already running, firing coalesced"),
            );
            return;
        }

        let Some(permit) = self.permits.clone().try_acquire_owned().ok() else {
            self.audit.write(
                AuditRecord::new("scheduler", "backpressure", true)
                    .with_request_id(id.clone())
                    .with_summary("worker pool full, firing queued for next tick"),
            );
            return;
        };

        let Some(mut job) = self.get_job(&id).await else {
            return;
        };
        let _ = job.transition(JobState::Running);
        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(id.clone(), job.clone());
        }
        let _ = self.store.save(&job);
        self.audit.write(
            AuditRecord::new("scheduler", "dispatch", true)
                .with_request_id(id.clone())
                .with_summary("job dispatched to worker"),
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let _job_guard = job_lock.lock().await;
            let result = scheduler.executor.execute(job.clone()).await;

            // The executor (Decision Loop) may already have transitioned and
            // persisted the job to a terminal-for-this-firing state of its
            // own choosing (e.g. `rejected` on guardrail/policy denial,
            // `skipped` on a pre-flight safe-mode check) before returning.
            // Only apply the generic Completed/Failed mapping if it left the
            // job in `running` — i.e. it deferred outcome bookkeeping to us.
            let mut jobs = scheduler.jobs.lock().await;
            let final_state = if let Some(stored) = jobs.get_mut(&job.id) {
                if stored.state == JobState::Running {
                    let new_state = if result.is_ok() { JobState::Completed } else { JobState::Failed };
                    if let Err(error) = &result {
                        stored.last_error = Some(error.to_string());
                    }
                    let _ = stored.transition(new_state);
                    let _ = scheduler.store.save(stored);
                    new_state
                } else {
                    stored.state
                }
            } else {
                if result.is_ok() { JobState::Completed } else { JobState::Failed }
            };
            drop(jobs);
            scheduler.audit.write(
                AuditRecord::new("scheduler", "job_outcome", result.is_ok())
                    .with_request_id(job.id.clone())
                    .with_summary(format!("job finished: {final_state}")),
            );
        });
    }
}
