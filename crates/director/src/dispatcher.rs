//! Dispatcher: pending tasks → idle agents, completion via callbacks.
//!
//! A pass runs whenever something may have changed (enqueue, callback,
//! discovery probe). Completion tracking is a pure waiter map keyed by
//! queue id; there are no timers. Restart recovery re-registers a
//! waiter per orphaned task so late callbacks still land.

use agency_core::{
    AgentPhase, CallbackPayload, QueueId, QueueState, QueuedTask, SubmitRequest, TaskState,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::agent_client::{AgentClient, SubmitResult};
use crate::discovery::Discovery;
use crate::queue::{QueueError, WorkQueue};
use crate::sessions::SessionStore;

/// Errors surfaced by dispatcher entry points.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown queue task: {0}")]
    NotFound(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

struct Waiter {
    agent_url: String,
    dispatched_at: Instant,
}

pub struct Dispatcher {
    queue: Arc<WorkQueue>,
    sessions: Arc<SessionStore>,
    discovery: Arc<Discovery>,
    client: Arc<dyn AgentClient>,
    /// Base URL of the internal surface; callbacks land there.
    internal_base_url: String,
    waiters: Mutex<HashMap<QueueId, Waiter>>,
    /// Serializes passes; concurrent triggers collapse into one run.
    pass_gate: tokio::sync::Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<WorkQueue>,
        sessions: Arc<SessionStore>,
        discovery: Arc<Discovery>,
        client: Arc<dyn AgentClient>,
        internal_base_url: String,
    ) -> Self {
        Self {
            queue,
            sessions,
            discovery,
            client,
            internal_base_url,
            waiters: Mutex::new(HashMap::new()),
            pass_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Re-register completion waiters for tasks that were in flight
    /// when the director last stopped. They stay visible as `working`;
    /// the eventual callback completes them.
    pub fn recover(&self) {
        let orphans = self.queue.dispatched();
        if orphans.is_empty() {
            return;
        }
        let mut waiters = self.waiters.lock();
        for task in orphans {
            let agent_url = task.agent_url.clone().unwrap_or_default();
            tracing::info!(
                queue_id = %task.id,
                agent_url,
                state = %task.state,
                "re-registered waiter for orphaned task"
            );
            waiters.insert(
                task.id.clone(),
                Waiter {
                    agent_url,
                    dispatched_at: Instant::now(),
                },
            );
        }
    }

    /// One dispatch pass: repeatedly pair the top pending task with an
    /// idle agent until either side runs out.
    pub async fn run_pass(&self) {
        let _gate = self.pass_gate.lock().await;
        loop {
            let Some(task) = self.queue.next_pending() else {
                break;
            };
            let Some(agent_url) = self.pick_agent(&task) else {
                break;
            };
            self.dispatch_one(task, &agent_url).await;
        }
    }

    /// Idle agent of the right kind; session continuations prefer the
    /// agent that last ran the session.
    fn pick_agent(&self, task: &QueuedTask) -> Option<String> {
        let idle: Vec<_> = self
            .discovery
            .live_agents()
            .into_iter()
            .filter(|a| a.state == AgentPhase::Idle && a.kind == task.agent_kind)
            .collect();
        if idle.is_empty() {
            return None;
        }
        if let Some(session_id) = task.session_id.as_ref() {
            if let Some(preferred) = self.sessions.last_agent_for(session_id.as_str()) {
                if idle.iter().any(|a| a.url == preferred) {
                    return Some(preferred);
                }
            }
        }
        idle.first().map(|a| a.url.clone())
    }

    async fn dispatch_one(&self, task: QueuedTask, agent_url: &str) {
        let queue_id = task.id.clone();
        let task = match self.queue.mark_dispatching(&queue_id, agent_url) {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(queue_id = %queue_id, error = %err, "could not mark dispatching");
                return;
            }
        };

        let req = SubmitRequest {
            prompt: task.prompt.clone(),
            tier: Some(task.tier.to_string()),
            timeout_seconds: Some(task.timeout_seconds),
            session_id: task.session_id.as_ref().map(|s| s.as_str().to_string()),
            env: task.env.clone(),
            agent_kind: Some(task.agent_kind.to_string()),
            model: task.model.clone(),
            source: Some(task.source.to_string()),
            source_job: task.source_job.clone(),
            callback_url: Some(format!(
                "{}/api/callback/{}",
                self.internal_base_url, queue_id
            )),
        };

        match self.client.submit(agent_url, &req).await {
            SubmitResult::Accepted(accepted) => {
                match self
                    .queue
                    .mark_working(&queue_id, &accepted.task_id, Some(accepted.session_id.clone()))
                {
                    Ok(_) => {}
                    Err(err) => {
                        // The task may have been cancelled mid-dispatch;
                        // tell the agent to stop.
                        tracing::warn!(queue_id = %queue_id, error = %err, "accepted task no longer dispatchable");
                        self.client
                            .cancel(agent_url, accepted.task_id.as_str())
                            .await;
                        return;
                    }
                }
                self.waiters.lock().insert(
                    queue_id.clone(),
                    Waiter {
                        agent_url: agent_url.to_string(),
                        dispatched_at: Instant::now(),
                    },
                );
                self.sessions.add_task(
                    &accepted.session_id,
                    agent_url,
                    &accepted.task_id,
                    TaskState::Working,
                    &task.prompt,
                    task.source,
                );
                self.discovery.note_state(agent_url, AgentPhase::Working);
                tracing::info!(
                    queue_id = %queue_id,
                    task_id = %accepted.task_id,
                    agent_url,
                    "task dispatched"
                );
            }
            SubmitResult::Busy { current_task } => {
                tracing::debug!(
                    queue_id = %queue_id,
                    agent_url,
                    current_task = current_task.as_ref().map(|t| t.as_str()).unwrap_or(""),
                    "agent busy, requeueing"
                );
                self.discovery.note_state(agent_url, AgentPhase::Working);
                if let Err(err) = self.queue.requeue(&queue_id) {
                    tracing::warn!(queue_id = %queue_id, error = %err, "requeue failed");
                }
            }
            SubmitResult::Unreachable(message) => {
                tracing::warn!(queue_id = %queue_id, agent_url, message, "agent unreachable, requeueing");
                self.discovery.mark_stale(agent_url);
                if let Err(err) = self.queue.requeue(&queue_id) {
                    tracing::warn!(queue_id = %queue_id, error = %err, "requeue failed");
                }
            }
            SubmitResult::Rejected { status, message } => {
                // The agent understood and said no; retrying the same
                // payload cannot succeed.
                tracing::warn!(queue_id = %queue_id, status, message, "agent rejected task");
                if let Some(session_id) = task.session_id.as_ref() {
                    if let Some(task_id) = task.task_id.as_ref() {
                        self.sessions.update_task_state(
                            session_id.as_str(),
                            task_id.as_str(),
                            TaskState::Failed,
                        );
                    }
                }
                if let Err(err) = self.queue.remove(&queue_id, QueueState::Failed) {
                    tracing::warn!(queue_id = %queue_id, error = %err, "remove failed");
                }
            }
        }
    }

    /// Handle a completion callback. Idempotent: an unknown queue id is
    /// a late or duplicate delivery and succeeds as a no-op.
    pub async fn handle_callback(&self, queue_id: &str, payload: &CallbackPayload) {
        let waiter = self.waiters.lock().remove(queue_id);
        let Some(waiter) = waiter else {
            tracing::info!(queue_id, task_id = %payload.task_id, "callback without waiter (late or duplicate)");
            return;
        };

        let Some(task) = self.queue.get(queue_id) else {
            tracing::warn!(queue_id, "waiter existed but queue entry is gone");
            return;
        };

        if let Some(session_id) = task.session_id.as_ref() {
            self.sessions.update_task_state(
                session_id.as_str(),
                payload.task_id.as_str(),
                payload.state,
            );
        }

        let final_state = match payload.state {
            TaskState::Completed => QueueState::Completed,
            TaskState::Cancelled => QueueState::Cancelled,
            _ => QueueState::Failed,
        };
        if let Err(err) = self.queue.remove(&task.id, final_state) {
            tracing::warn!(queue_id, error = %err, "failed to remove completed task");
        }

        self.discovery.note_state(&waiter.agent_url, AgentPhase::Idle);
        tracing::info!(
            queue_id,
            task_id = %payload.task_id,
            state = %payload.state,
            latency_s = waiter.dispatched_at.elapsed().as_secs_f64(),
            "task completed"
        );
    }

    /// Cancel a queued task wherever it currently is.
    pub async fn cancel(&self, queue_id: &str) -> Result<(), DispatchError> {
        let removed_waiter = self.waiters.lock().remove(queue_id);

        let Some(task) = self.queue.get(queue_id) else {
            return Err(DispatchError::NotFound(queue_id.to_string()));
        };
        if task.state.is_terminal() {
            tracing::debug!(queue_id, state = %task.state, "cancel of terminal task is a no-op");
            return Ok(());
        }

        // Best-effort notify the agent; the queue entry is cancelled
        // regardless of reachability.
        if let (Some(agent_url), Some(task_id)) = (task.agent_url.as_ref(), task.task_id.as_ref())
        {
            let acked = self.client.cancel(agent_url, task_id.as_str()).await;
            tracing::debug!(queue_id, agent_url, acked, "agent cancel notified");
        }

        if let Some(session_id) = task.session_id.as_ref() {
            if let Some(task_id) = task.task_id.as_ref() {
                self.sessions.update_task_state(
                    session_id.as_str(),
                    task_id.as_str(),
                    TaskState::Cancelled,
                );
            }
        }

        self.queue.remove(&task.id, QueueState::Cancelled)?;
        let _ = removed_waiter;
        tracing::info!(queue_id, "queued task cancelled");
        Ok(())
    }

    /// Number of registered completion waiters (observability).
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
