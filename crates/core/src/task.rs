//! Agent-side task model and its state machine.

use crate::id::TaskId;
use crate::session::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Capability class a task requests. The agent maps a tier to a model.
///
/// Ordering is strict priority: heavy beats standard beats fast. Ties
/// are broken FIFO by enqueue time in the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    #[default]
    Standard,
    Heavy,
}

impl Tier {
    /// Dispatch priority; higher dispatches first.
    pub fn priority(self) -> u8 {
        match self {
            Tier::Heavy => 2,
            Tier::Standard => 1,
            Tier::Fast => 0,
        }
    }
}

crate::simple_display! {
    Tier {
        Fast => "fast",
        Standard => "standard",
        Heavy => "heavy",
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Tier::Fast),
            "standard" => Ok(Tier::Standard),
            "heavy" => Ok(Tier::Heavy),
            other => Err(format!("invalid tier: {other:?}")),
        }
    }
}

/// Which wrapped CLI an agent fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    #[default]
    Claude,
    Codex,
}

crate::simple_display! {
    AgentKind {
        Claude => "claude",
        Codex => "codex",
    }
}

impl FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "claude" => Ok(AgentKind::Claude),
            "codex" => Ok(AgentKind::Codex),
            other => Err(format!("invalid agent_kind: {other:?}")),
        }
    }
}

/// Where a task was submitted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    #[default]
    Web,
    Scheduler,
    Cli,
}

crate::simple_display! {
    TaskSource {
        Web => "web",
        Scheduler => "scheduler",
        Cli => "cli",
    }
}

impl FromStr for TaskSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(TaskSource::Web),
            "scheduler" => Ok(TaskSource::Scheduler),
            "cli" => Ok(TaskSource::Cli),
            other => Err(format!("invalid source: {other:?}")),
        }
    }
}

/// Agent-side task lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Working,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    /// Allowed edges: `queued → working → {completed|failed|cancelled}`.
    /// Terminal states accept no further transitions.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Queued, TaskState::Working)
                | (TaskState::Working, TaskState::Completed)
                | (TaskState::Working, TaskState::Failed)
                | (TaskState::Working, TaskState::Cancelled)
        )
    }
}

crate::simple_display! {
    TaskState {
        Queued => "queued",
        Working => "working",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Error taxonomy shared across every HTTP surface and task record.
///
/// The serialized names are the wire contract; see the `error` field of
/// [`crate::wire::ApiError`] and `error.type` in history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    AgentBusy,
    AlreadyCompleted,
    QueueFull,
    NotFound,
    Timeout,
    Cancelled,
    MaxTurns,
    ClaudeError,
    CodexError,
    SessionError,
    PipeError,
    StartError,
    PromptError,
}

crate::simple_display! {
    ErrorKind {
        ValidationError => "validation_error",
        AgentBusy => "agent_busy",
        AlreadyCompleted => "already_completed",
        QueueFull => "queue_full",
        NotFound => "not_found",
        Timeout => "timeout",
        Cancelled => "cancelled",
        MaxTurns => "max_turns",
        ClaudeError => "claude_error",
        CodexError => "codex_error",
        SessionError => "session_error",
        PipeError => "pipe_error",
        StartError => "start_error",
        PromptError => "prompt_error",
    }
}

/// Terminal error attached to a failed or cancelled task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Token consumption reported by the wrapped CLI's final result event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Maximum automatic re-executions after an `error_max_turns` result.
pub const MAX_TURNS_RESUMES: u32 = 2;

/// A single unit of work executed by an agent.
///
/// One task is non-terminal per agent at any time; terminal tasks are
/// immutable apart from history persistence.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub session_id: SessionId,
    pub prompt: String,
    pub tier: Tier,
    pub model: String,
    pub timeout_seconds: u64,
    pub resume_session: bool,
    pub work_dir: PathBuf,
    pub state: TaskState,
    pub source: TaskSource,
    #[serde(skip)]
    pub env: HashMap<String, String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// How many times this task auto-resumed after `error_max_turns`.
    pub max_turns_resumes: u32,
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
