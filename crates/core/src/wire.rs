//! HTTP wire DTOs shared by director, agents, and the scheduler.
//!
//! Submission payloads arrive with enum-valued fields as plain strings
//! so validation can answer with a proper `validation_error` body
//! instead of an opaque deserialization failure.

use crate::id::{QueueId, TaskId};
use crate::session::SessionId;
use crate::task::{AgentKind, ErrorKind, TaskError, TaskSource, TaskState, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Task submission body, accepted by both `POST /api/task` (director)
/// and `POST /task` (agent). Only the agent honors `callback_url`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubmitRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_job: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// A [`SubmitRequest`] that passed validation.
#[derive(Debug, Clone)]
pub struct ValidSubmit {
    pub prompt: String,
    pub tier: Tier,
    pub timeout: Duration,
    pub session_id: Option<SessionId>,
    pub env: HashMap<String, String>,
    pub agent_kind: AgentKind,
    pub model: Option<String>,
    pub source: TaskSource,
    pub source_job: Option<String>,
    pub callback_url: Option<String>,
}

/// Rejected submission; maps to a 400 `validation_error` body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl SubmitRequest {
    /// Validate field-by-field, applying `default_timeout` when the
    /// caller did not specify one.
    pub fn validate(&self, default_timeout: Duration) -> Result<ValidSubmit, ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError("prompt is required".to_string()));
        }

        let tier = match self.tier.as_deref() {
            None | Some("") => Tier::default(),
            Some(s) => Tier::from_str(s).map_err(ValidationError)?,
        };

        let agent_kind = match self.agent_kind.as_deref() {
            None | Some("") => AgentKind::default(),
            Some(s) => AgentKind::from_str(s).map_err(ValidationError)?,
        };

        let source = match self.source.as_deref() {
            None | Some("") => TaskSource::default(),
            Some(s) => TaskSource::from_str(s).map_err(ValidationError)?,
        };

        let session_id = match self.session_id.as_deref() {
            None | Some("") => None,
            Some(s) => Some(
                SessionId::parse(s).map_err(|e| ValidationError(e.to_string()))?,
            ),
        };

        let timeout = match self.timeout_seconds {
            None => default_timeout,
            Some(0) => {
                return Err(ValidationError(
                    "timeout_seconds must be positive".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
        };

        Ok(ValidSubmit {
            prompt: self.prompt.clone(),
            tier,
            timeout,
            session_id,
            env: self.env.clone(),
            agent_kind,
            model: self.model.clone(),
            source,
            source_job: self.source_job.clone(),
            callback_url: self.callback_url.clone(),
        })
    }
}

/// 201 body from the director's enqueue routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueAccepted {
    pub queue_id: QueueId,
}

/// 201 body from the agent's `POST /task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub status: TaskState,
}

/// Completion callback body: agent → director.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
    pub completed_at: DateTime<Utc>,
}

/// Error body for every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<TaskId>,
}

impl ApiError {
    pub fn new(error: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            current_task: None,
        }
    }

    pub fn with_current_task(mut self, task_id: TaskId) -> Self {
        self.current_task = Some(task_id);
        self
    }
}

/// Agent instance state reported by `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    Idle,
    Working,
    Cancelling,
}

crate::simple_display! {
    AgentPhase {
        Idle => "idle",
        Working => "working",
        Cancelling => "cancelling",
    }
}

/// Compact view of the in-flight task in status responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPreview {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub prompt_preview: String,
    pub started_at: DateTime<Utc>,
}

/// Static agent configuration echoed in status responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfigInfo {
    pub port: u16,
    pub model: String,
}

/// `GET /status` body of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentPhase,
    pub kind: AgentKind,
    pub version: String,
    pub uptime_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<TaskPreview>,
    pub config: AgentConfigInfo,
}

/// `POST /shutdown` body (agent and director).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownRequest {
    #[serde(default)]
    pub force: bool,
    #[serde(default = "default_shutdown_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ShutdownRequest {
    fn default() -> Self {
        Self {
            force: false,
            timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_shutdown_timeout() -> u64 {
    30
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
