//! Queue-side task model and its state machine.

use crate::id::{QueueId, TaskId};
use crate::session::SessionId;
use crate::task::{AgentKind, TaskSource, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Queue-side task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Pending,
    Dispatching,
    Working,
    Completed,
    Failed,
    Cancelled,
}

impl QueueState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueState::Completed | QueueState::Failed | QueueState::Cancelled
        )
    }

    /// Allowed edges: `pending → dispatching → working → {completed|failed}`,
    /// `dispatching → pending` for retryable dispatch failure, and
    /// cancellation from any non-terminal state.
    pub fn can_transition_to(self, next: QueueState) -> bool {
        match (self, next) {
            (QueueState::Pending, QueueState::Dispatching) => true,
            (QueueState::Dispatching, QueueState::Working) => true,
            (QueueState::Dispatching, QueueState::Pending) => true,
            (QueueState::Working, QueueState::Completed) => true,
            (QueueState::Working, QueueState::Failed) => true,
            (from, QueueState::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

crate::simple_display! {
    QueueState {
        Pending => "pending",
        Dispatching => "dispatching",
        Working => "working",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// A task awaiting (or undergoing) dispatch to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTask {
    pub id: QueueId,
    pub prompt: String,
    pub tier: Tier,
    pub timeout_seconds: u64,
    /// Continuation handle; `None` means the agent mints a fresh session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    pub agent_kind: AgentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub source: TaskSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_job: Option<String>,
    pub state: QueueState,
    /// Set when the task is handed to an agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_url: Option<String>,
    /// Set once the agent has accepted (201).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
#[path = "queued_tests.rs"]
mod tests;
