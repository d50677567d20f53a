//! Per-job runtime state.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config::JobSpec;

/// Outcome of the most recent firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastStatus {
    /// Landed in the director's queue.
    Queued,
    /// Fell back to a direct agent submission.
    Submitted,
    SkippedQueueFull,
    SkippedBusy,
    SkippedError,
}

agency_core::simple_display! {
    LastStatus {
        Queued => "queued",
        Submitted => "submitted",
        SkippedQueueFull => "skipped_queue_full",
        SkippedBusy => "skipped_busy",
        SkippedError => "skipped_error",
    }
}

/// One job: its validated spec plus runtime bookkeeping.
///
/// `is_running` is the single-flight gate: the tick loop sets it before
/// invoking the job and only the finishing run clears it, so a slow job
/// can never overlap itself and a missed occurrence is skipped.
#[derive(Debug)]
pub struct JobState {
    pub spec: JobSpec,
    pub next_run: Option<DateTime<Local>>,
    pub last_run: Option<DateTime<Local>>,
    pub last_status: Option<LastStatus>,
    pub last_task_id: Option<String>,
    pub last_queue_id: Option<String>,
    pub is_running: bool,
}

impl JobState {
    pub fn new(spec: JobSpec, now: &DateTime<Local>) -> Self {
        let next_run = spec.cron.next_after(now);
        Self {
            spec,
            next_run,
            last_run: None,
            last_status: None,
            last_task_id: None,
            last_queue_id: None,
            is_running: false,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            name: self.spec.name.clone(),
            schedule: self.spec.cron.source().to_string(),
            next_run: self.next_run.map(|t| t.to_rfc3339()),
            last_run: self.last_run.map(|t| t.to_rfc3339()),
            last_status: self.last_status,
            last_task_id: self.last_task_id.clone(),
            last_queue_id: self.last_queue_id.clone(),
            is_running: self.is_running,
        }
    }
}

/// Serializable view for `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub name: String,
    pub schedule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_status: Option<LastStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_queue_id: Option<String>,
    pub is_running: bool,
}
