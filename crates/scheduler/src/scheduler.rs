//! Trigger loop, single-flight execution, and hot reload.
//!
//! Jobs live behind per-job mutexes inside a shared list. The tick
//! loop only flips `is_running` under the lock and fires the job
//! outside it; reload swaps the list under the write lock but reuses
//! the existing per-job cell for matched names, so an in-flight run
//! clears its own gate even across a reload.

use agency_core::SubmitRequest;
use chrono::{DateTime, Local};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{JobSpec, SchedulerConfig};
use crate::jobs::{JobSnapshot, JobState, LastStatus};
use crate::submit::{AgentSubmitResult, QueueSubmitResult, Submitter};

/// Errors from the manual trigger endpoint.
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("unknown job: {0}")]
    NotFound(String),
    #[error("job already running: {0}")]
    Running(String),
}

/// Mutable top-level routing config (reloadable).
#[derive(Debug, Clone)]
struct Routing {
    port: u16,
    director_url: Option<String>,
    agent_url: String,
}

struct SchedulerInner {
    submitter: Arc<dyn Submitter>,
    routing: RwLock<Routing>,
    jobs: RwLock<Vec<Arc<Mutex<JobState>>>>,
}

/// Handle to the scheduler core.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, submitter: Arc<dyn Submitter>) -> Self {
        let now = Local::now();
        let jobs = config
            .jobs
            .into_iter()
            .map(|spec| Arc::new(Mutex::new(JobState::new(spec, &now))))
            .collect();
        Self {
            inner: Arc::new(SchedulerInner {
                submitter,
                routing: RwLock::new(Routing {
                    port: config.port,
                    director_url: config.director_url,
                    agent_url: config.agent_url,
                }),
                jobs: RwLock::new(jobs),
            }),
        }
    }

    /// The port the scheduler was configured with at startup.
    pub fn port(&self) -> u16 {
        self.inner.routing.read().port
    }

    /// Run the 1-second trigger loop until cancelled.
    pub fn spawn_tick_loop(&self, token: CancellationToken) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        scheduler.tick(Local::now());
                    }
                }
            }
        });
    }

    /// One pass over the job list: fire everything due. The lock is
    /// held only to flip the single-flight gate; the job itself runs
    /// in its own task.
    pub fn tick(&self, now: DateTime<Local>) {
        let jobs: Vec<_> = self.inner.jobs.read().clone();
        for cell in jobs {
            let fire = {
                let mut job = cell.lock();
                if job.is_running {
                    false
                } else {
                    match job.next_run {
                        Some(next) if now >= next => {
                            job.is_running = true;
                            job.last_run = Some(now);
                            true
                        }
                        _ => false,
                    }
                }
            };
            if fire {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    run_job(inner, cell).await;
                });
            }
        }
    }

    /// Run one job immediately, honoring single-flight.
    pub async fn trigger(&self, name: &str) -> Result<JobSnapshot, TriggerError> {
        let cell = self
            .find(name)
            .ok_or_else(|| TriggerError::NotFound(name.to_string()))?;
        {
            let mut job = cell.lock();
            if job.is_running {
                return Err(TriggerError::Running(name.to_string()));
            }
            job.is_running = true;
            job.last_run = Some(Local::now());
        }
        run_job(self.inner.clone(), cell.clone()).await;
        let snapshot = cell.lock().snapshot();
        Ok(snapshot)
    }

    fn find(&self, name: &str) -> Option<Arc<Mutex<JobState>>> {
        self.inner
            .jobs
            .read()
            .iter()
            .find(|cell| cell.lock().spec.name == name)
            .cloned()
    }

    /// Job snapshots in config order.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.inner
            .jobs
            .read()
            .iter()
            .map(|cell| cell.lock().snapshot())
            .collect()
    }

    /// Swap in a validated config, preserving runtime state by job
    /// name. Port changes are logged but need a restart.
    pub fn apply_config(&self, config: SchedulerConfig) {
        let now = Local::now();
        {
            let mut routing = self.inner.routing.write();
            if routing.port != config.port {
                tracing::warn!(
                    old = routing.port,
                    new = config.port,
                    "port change in config requires restart, ignoring"
                );
            }
            routing.director_url = config.director_url.clone();
            routing.agent_url = config.agent_url.clone();
        }

        let mut jobs = self.inner.jobs.write();
        let mut next: Vec<Arc<Mutex<JobState>>> = Vec::with_capacity(config.jobs.len());
        for spec in config.jobs {
            if let Some(existing) = jobs
                .iter()
                .find(|cell| cell.lock().spec.name == spec.name)
            {
                // Same cell: the in-flight run (if any) still owns the
                // gate and clears it on this very object.
                let mut job = existing.lock();
                job.spec = spec;
                if !job.is_running {
                    job.next_run = job.spec.cron.next_after(&now);
                }
                drop(job);
                next.push(existing.clone());
            } else {
                tracing::info!(job = %spec.name, "job added by reload");
                next.push(Arc::new(Mutex::new(JobState::new(spec, &now))));
            }
        }
        for dropped in jobs
            .iter()
            .filter(|cell| !next.iter().any(|n| Arc::ptr_eq(n, cell)))
        {
            tracing::info!(job = %dropped.lock().spec.name, "job dropped by reload");
        }
        *jobs = next;
    }
}

/// Execute one firing: queue first, agent fallback, bookkeeping after.
async fn run_job(inner: Arc<SchedulerInner>, cell: Arc<Mutex<JobState>>) {
    let spec: JobSpec = cell.lock().spec.clone();
    let routing = inner.routing.read().clone();

    let req = SubmitRequest {
        prompt: spec.prompt.clone(),
        tier: Some(spec.tier.to_string()),
        timeout_seconds: Some(spec.timeout.as_secs()),
        session_id: None,
        env: Default::default(),
        agent_kind: Some(spec.agent_kind.to_string()),
        model: spec.model.clone(),
        source: Some("scheduler".to_string()),
        source_job: Some(spec.name.clone()),
        callback_url: None,
    };

    let mut outcome: Option<(LastStatus, Option<String>, Option<String>)> = None;

    if let Some(director_url) = routing.director_url.as_deref() {
        match inner.submitter.submit_to_queue(director_url, &req).await {
            QueueSubmitResult::Queued(queue_id) => {
                tracing::info!(job = %spec.name, queue_id, "job queued via director");
                outcome = Some((LastStatus::Queued, Some(queue_id), None));
            }
            QueueSubmitResult::QueueFull => {
                tracing::warn!(job = %spec.name, "queue full, skipping run");
                outcome = Some((LastStatus::SkippedQueueFull, None, None));
            }
            QueueSubmitResult::Error(message) => {
                tracing::warn!(job = %spec.name, message, "director unreachable, falling back to agent");
            }
        }
    }

    let (status, queue_id, task_id) = match outcome {
        Some(done) => done,
        None => {
            let agent_url = spec.agent_url.as_deref().unwrap_or(&routing.agent_url);
            match inner.submitter.submit_to_agent(agent_url, &req).await {
                AgentSubmitResult::Submitted(task_id) => {
                    tracing::info!(job = %spec.name, task_id, agent_url, "job submitted to agent");
                    (LastStatus::Submitted, None, Some(task_id))
                }
                AgentSubmitResult::Busy => {
                    tracing::info!(job = %spec.name, agent_url, "agent busy, skipping run");
                    (LastStatus::SkippedBusy, None, None)
                }
                AgentSubmitResult::Error(message) => {
                    tracing::warn!(job = %spec.name, message, "submission failed");
                    (LastStatus::SkippedError, None, None)
                }
            }
        }
    };

    let mut job = cell.lock();
    job.last_status = Some(status);
    job.last_queue_id = queue_id;
    job.last_task_id = task_id;
    job.is_running = false;
    // Recomputed only now that the run is over; occurrences that passed
    // while running are skipped.
    job.next_run = job.spec.cron.next_after(&Local::now());
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
