//! Persisted work queue with admission control.
//!
//! One JSON file per queued task, written through a temp file and
//! rename; the file disappears when the task leaves the queue. On
//! startup every surviving file is reloaded, and anything found in
//! `dispatching` or `working` is an orphan for the dispatcher to
//! re-register.

use agency_core::{QueueId, QueueState, QueuedTask, SessionId, TaskId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue full (capacity {capacity})")]
    Full { capacity: usize },
    #[error("unknown queue task: {0}")]
    NotFound(String),
    #[error("invalid queue transition {from} -> {to}")]
    InvalidTransition { from: QueueState, to: QueueState },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// How many terminal tasks stay queryable after leaving the queue.
const RECENT_TERMINAL_CAP: usize = 64;

/// FIFO-within-priority backlog of tasks awaiting dispatch.
pub struct WorkQueue {
    dir: PathBuf,
    capacity: usize,
    inner: Mutex<HashMap<QueueId, QueuedTask>>,
    /// Terminal tasks, kept briefly so status queries right after a
    /// completion still resolve. Never persisted.
    recent: Mutex<VecDeque<QueuedTask>>,
}

impl WorkQueue {
    /// Open the queue directory, reloading any persisted tasks.
    pub fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, QueueError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let mut tasks = HashMap::new();
        for dirent in std::fs::read_dir(&dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read(&path)
                .map_err(QueueError::from)
                .and_then(|b| serde_json::from_slice::<QueuedTask>(&b).map_err(QueueError::from))
            {
                Ok(task) => {
                    tasks.insert(task.id.clone(), task);
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable queue file");
                }
            }
        }
        if !tasks.is_empty() {
            tracing::info!(count = tasks.len(), "reloaded persisted queue");
        }

        Ok(Self {
            dir,
            capacity,
            inner: Mutex::new(tasks),
            recent: Mutex::new(VecDeque::new()),
        })
    }

    fn path_for(&self, id: &QueueId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn persist(&self, task: &QueuedTask) -> Result<(), QueueError> {
        write_json_atomic(&self.path_for(&task.id), task)
    }

    /// Admit a task, rejecting when the backlog is at capacity.
    pub fn enqueue(&self, task: QueuedTask) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock();
            let active = inner.values().filter(|t| !t.state.is_terminal()).count();
            if active >= self.capacity {
                return Err(QueueError::Full {
                    capacity: self.capacity,
                });
            }
            inner.insert(task.id.clone(), task.clone());
        }
        self.persist(&task)?;
        tracing::info!(queue_id = %task.id, tier = %task.tier, source = %task.source, "task enqueued");
        Ok(())
    }

    /// Next dispatchable task: highest tier priority first, then FIFO
    /// by enqueue time.
    pub fn next_pending(&self) -> Option<QueuedTask> {
        let inner = self.inner.lock();
        inner
            .values()
            .filter(|t| t.state == QueueState::Pending)
            .min_by(|a, b| {
                b.tier
                    .priority()
                    .cmp(&a.tier.priority())
                    .then(a.enqueued_at.cmp(&b.enqueued_at))
                    .then(a.id.as_str().cmp(b.id.as_str()))
            })
            .cloned()
    }

    /// pending → dispatching, recording the chosen agent.
    pub fn mark_dispatching(
        &self,
        id: &QueueId,
        agent_url: &str,
    ) -> Result<QueuedTask, QueueError> {
        let task = {
            let mut inner = self.inner.lock();
            let task = inner
                .get_mut(id.as_str())
                .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
            transition(task, QueueState::Dispatching)?;
            task.agent_url = Some(agent_url.to_string());
            task.dispatched_at = Some(chrono::Utc::now());
            task.clone()
        };
        self.persist(&task)?;
        Ok(task)
    }

    /// dispatching → working after the agent's 201, recording the agent
    /// task id and the session id the agent actually used.
    pub fn mark_working(
        &self,
        id: &QueueId,
        task_id: &TaskId,
        session_id: Option<SessionId>,
    ) -> Result<QueuedTask, QueueError> {
        let task = {
            let mut inner = self.inner.lock();
            let task = inner
                .get_mut(id.as_str())
                .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
            transition(task, QueueState::Working)?;
            task.task_id = Some(task_id.clone());
            if session_id.is_some() {
                task.session_id = session_id;
            }
            task.clone()
        };
        self.persist(&task)?;
        Ok(task)
    }

    /// dispatching → pending on retryable dispatch failure.
    pub fn requeue(&self, id: &QueueId) -> Result<(), QueueError> {
        let task = {
            let mut inner = self.inner.lock();
            let task = inner
                .get_mut(id.as_str())
                .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
            transition(task, QueueState::Pending)?;
            task.agent_url = None;
            task.task_id = None;
            task.dispatched_at = None;
            task.clone()
        };
        self.persist(&task)?;
        tracing::debug!(queue_id = %id, "task requeued");
        Ok(())
    }

    /// Remove a task on terminal transition; its file goes with it.
    /// Returns the task as it looked just before removal.
    pub fn remove(
        &self,
        id: &QueueId,
        final_state: QueueState,
    ) -> Result<QueuedTask, QueueError> {
        let task = {
            let mut inner = self.inner.lock();
            let task = inner
                .get_mut(id.as_str())
                .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
            transition(task, final_state)?;
            let snapshot = task.clone();
            inner.remove(id.as_str());
            snapshot
        };
        match std::fs::remove_file(self.path_for(id)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        {
            let mut recent = self.recent.lock();
            if recent.len() == RECENT_TERMINAL_CAP {
                recent.pop_front();
            }
            recent.push_back(task.clone());
        }
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Option<QueuedTask> {
        if let Some(task) = self.inner.lock().get(id).cloned() {
            return Some(task);
        }
        self.recent
            .lock()
            .iter()
            .rev()
            .find(|t| t.id == *id)
            .cloned()
    }

    /// Tasks in `dispatching` or `working` (orphan candidates at startup).
    pub fn dispatched(&self) -> Vec<QueuedTask> {
        self.inner
            .lock()
            .values()
            .filter(|t| {
                matches!(t.state, QueueState::Dispatching | QueueState::Working)
            })
            .cloned()
            .collect()
    }

    /// Full snapshot, pending first in dispatch order.
    pub fn snapshot(&self) -> Vec<QueuedTask> {
        let mut tasks: Vec<_> = self.inner.lock().values().cloned().collect();
        tasks.sort_by(|a, b| {
            b.tier
                .priority()
                .cmp(&a.tier.priority())
                .then(a.enqueued_at.cmp(&b.enqueued_at))
        });
        tasks
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn transition(task: &mut QueuedTask, next: QueueState) -> Result<(), QueueError> {
    if !task.state.can_transition_to(next) {
        return Err(QueueError::InvalidTransition {
            from: task.state,
            to: next,
        });
    }
    task.state = next;
    Ok(())
}

fn write_json_atomic(path: &Path, task: &QueuedTask) -> Result<(), QueueError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(task)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
