//! Submission clients: director queue first, direct agent fallback.

use agency_core::{QueueAccepted, SubmitRequest, TaskAccepted};
use async_trait::async_trait;
use std::time::Duration;

/// Result of the preferred path (`POST <director>/api/queue/task`).
#[derive(Debug, Clone)]
pub enum QueueSubmitResult {
    /// 201 with the queue id.
    Queued(String),
    /// 503: admission control said no.
    QueueFull,
    /// Anything else, including transport failure → try the fallback.
    Error(String),
}

/// Result of the fallback path (`POST <agent>/task`).
#[derive(Debug, Clone)]
pub enum AgentSubmitResult {
    /// 201 with the agent task id.
    Submitted(String),
    /// 409: the agent is busy.
    Busy,
    Error(String),
}

#[async_trait]
pub trait Submitter: Send + Sync + 'static {
    async fn submit_to_queue(&self, director_url: &str, req: &SubmitRequest)
        -> QueueSubmitResult;
    async fn submit_to_agent(&self, agent_url: &str, req: &SubmitRequest) -> AgentSubmitResult;
}

/// Production submitter over reqwest.
pub struct HttpSubmitter {
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpSubmitter {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit_to_queue(
        &self,
        director_url: &str,
        req: &SubmitRequest,
    ) -> QueueSubmitResult {
        let url = format!("{}/api/queue/task", director_url.trim_end_matches('/'));
        let resp = match self.client.post(&url).json(req).send().await {
            Ok(resp) => resp,
            Err(err) => return QueueSubmitResult::Error(err.to_string()),
        };
        match resp.status().as_u16() {
            201 => match resp.json::<QueueAccepted>().await {
                Ok(accepted) => QueueSubmitResult::Queued(accepted.queue_id.to_string()),
                Err(err) => QueueSubmitResult::Error(format!("bad 201 body: {err}")),
            },
            503 => QueueSubmitResult::QueueFull,
            status => QueueSubmitResult::Error(format!("unexpected status {status}")),
        }
    }

    async fn submit_to_agent(&self, agent_url: &str, req: &SubmitRequest) -> AgentSubmitResult {
        let url = format!("{}/task", agent_url.trim_end_matches('/'));
        let resp = match self.client.post(&url).json(req).send().await {
            Ok(resp) => resp,
            Err(err) => return AgentSubmitResult::Error(err.to_string()),
        };
        match resp.status().as_u16() {
            201 => match resp.json::<TaskAccepted>().await {
                Ok(accepted) => AgentSubmitResult::Submitted(accepted.task_id.to_string()),
                Err(err) => AgentSubmitResult::Error(format!("bad 201 body: {err}")),
            },
            409 => AgentSubmitResult::Busy,
            status => AgentSubmitResult::Error(format!("unexpected status {status}")),
        }
    }
}
