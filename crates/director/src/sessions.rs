//! Authoritative session → task-list map.
//!
//! In-memory only; rebuilt after a restart from the persisted queue
//! plus reconciliation against each agent's history. Task-state
//! updates honor the task state machine; anything else is logged and
//! dropped rather than corrupting the record.

use agency_core::{
    preview, Session, SessionId, SessionTask, TaskId, TaskSource, TaskState, PREVIEW_LEN,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;

/// Shape of one agent history row, as served by `GET /history`.
/// Only the fields reconciliation needs.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentHistoryRow {
    pub task_id: TaskId,
    pub session_id: String,
    pub state: TaskState,
    #[serde(default)]
    pub prompt_preview: String,
}

#[derive(Default)]
pub struct SessionStore {
    inner: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task under a session. Idempotent on (session, task).
    pub fn add_task(
        &self,
        session_id: &SessionId,
        agent_url: &str,
        task_id: &TaskId,
        state: TaskState,
        prompt: &str,
        source: TaskSource,
    ) {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let session = inner
            .entry(session_id.as_str().to_string())
            .or_insert_with(|| Session {
                id: session_id.clone(),
                tasks: Vec::new(),
                created_at: now,
                updated_at: now,
            });
        if session.tasks.iter().any(|t| t.task_id == *task_id) {
            return;
        }
        session.tasks.push(SessionTask {
            task_id: task_id.clone(),
            agent_url: agent_url.to_string(),
            state,
            prompt_preview: preview(prompt, PREVIEW_LEN),
            source,
        });
        session.updated_at = now;
        tracing::debug!(session_id = %session_id, task_id = %task_id, "session task recorded");
    }

    /// Apply a state change, honoring the task state machine. Unknown
    /// sessions/tasks and invalid transitions are logged and ignored.
    pub fn update_task_state(&self, session_id: &str, task_id: &str, state: TaskState) {
        let mut inner = self.inner.write();
        let Some(session) = inner.get_mut(session_id) else {
            tracing::debug!(session_id, task_id, "state update for unknown session");
            return;
        };
        let Some(task) = session.tasks.iter_mut().find(|t| t.task_id == *task_id) else {
            tracing::debug!(session_id, task_id, "state update for unknown task");
            return;
        };
        if task.state == state {
            return;
        }
        if !task.state.can_transition_to(state) {
            tracing::debug!(
                session_id,
                task_id,
                from = %task.state,
                to = %state,
                "ignoring invalid task transition"
            );
            return;
        }
        task.state = state;
        session.updated_at = Utc::now();
    }

    /// Snapshot of every session, most recently updated first.
    pub fn list(&self) -> Vec<Session> {
        let mut sessions: Vec<_> = self.inner.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.inner.read().get(session_id).cloned()
    }

    /// The agent that last ran a task for this session, if any.
    pub fn last_agent_for(&self, session_id: &str) -> Option<String> {
        self.inner
            .read()
            .get(session_id)
            .and_then(|s| s.tasks.last().map(|t| t.agent_url.clone()))
    }

    /// Merge one agent's history so the director-held list is a
    /// superset of what the agent executed. Recovers tasks dispatched
    /// before a director restart.
    pub fn reconcile(&self, agent_url: &str, rows: &[AgentHistoryRow]) {
        for row in rows {
            let Ok(session_id) = SessionId::parse(row.session_id.as_str()) else {
                tracing::debug!(
                    agent_url,
                    session_id = %row.session_id,
                    "skipping history row with unsafe session id"
                );
                continue;
            };
            let known = {
                let inner = self.inner.read();
                inner
                    .get(session_id.as_str())
                    .is_some_and(|s| s.tasks.iter().any(|t| t.task_id == row.task_id))
            };
            if known {
                self.update_task_state(session_id.as_str(), row.task_id.as_str(), row.state);
            } else {
                self.add_task(
                    &session_id,
                    agent_url,
                    &row.task_id,
                    row.state,
                    &row.prompt_preview,
                    TaskSource::Web,
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
