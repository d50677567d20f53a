//! HTTP client seam toward agents.
//!
//! The dispatcher talks to agents only through this trait, so tests
//! can script agent behavior without sockets.

use agency_core::{ApiError, SubmitRequest, TaskAccepted, TaskId};
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of one submission attempt against an agent.
#[derive(Debug, Clone)]
pub enum SubmitResult {
    /// 201: the agent accepted and is working.
    Accepted(TaskAccepted),
    /// 409: the agent is already busy.
    Busy { current_task: Option<TaskId> },
    /// Any other HTTP answer; not retryable against this payload.
    Rejected { status: u16, message: String },
    /// Transport failure; the agent may be gone.
    Unreachable(String),
}

#[async_trait]
pub trait AgentClient: Send + Sync + 'static {
    async fn submit(&self, agent_url: &str, req: &SubmitRequest) -> SubmitResult;

    /// Best-effort cancel; returns whether the agent acknowledged.
    async fn cancel(&self, agent_url: &str, task_id: &str) -> bool;
}

/// Production client over reqwest.
pub struct HttpAgentClient {
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpAgentClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn submit(&self, agent_url: &str, req: &SubmitRequest) -> SubmitResult {
        let url = format!("{}/task", agent_url.trim_end_matches('/'));
        let resp = match self.client.post(&url).json(req).send().await {
            Ok(resp) => resp,
            Err(err) => return SubmitResult::Unreachable(err.to_string()),
        };
        let status = resp.status();
        if status.as_u16() == 201 {
            return match resp.json::<TaskAccepted>().await {
                Ok(accepted) => SubmitResult::Accepted(accepted),
                Err(err) => SubmitResult::Unreachable(format!("bad 201 body: {err}")),
            };
        }
        if status.as_u16() == 409 {
            let current_task = resp
                .json::<ApiError>()
                .await
                .ok()
                .and_then(|e| e.current_task);
            return SubmitResult::Busy { current_task };
        }
        let message = resp
            .json::<ApiError>()
            .await
            .map(|e| e.message)
            .unwrap_or_else(|e| e.to_string());
        SubmitResult::Rejected {
            status: status.as_u16(),
            message,
        }
    }

    async fn cancel(&self, agent_url: &str, task_id: &str) -> bool {
        let url = format!(
            "{}/task/{}/cancel",
            agent_url.trim_end_matches('/'),
            task_id
        );
        match self.client.post(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::debug!(agent_url, task_id, error = %err, "cancel notify failed");
                false
            }
        }
    }
}
