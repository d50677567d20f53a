//! Scripted submitter for scheduler tests.

use agency_core::SubmitRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

use crate::submit::{AgentSubmitResult, QueueSubmitResult, Submitter};

/// Record of one submission the fake received.
#[derive(Debug, Clone)]
pub enum SubmitCall {
    Queue { director_url: String, req: SubmitRequest },
    Agent { agent_url: String, req: SubmitRequest },
}

/// Submitter replaying scripted results, optionally slowly.
#[derive(Default)]
pub struct FakeSubmitter {
    queue_results: Mutex<VecDeque<QueueSubmitResult>>,
    agent_results: Mutex<VecDeque<AgentSubmitResult>>,
    pub calls: Mutex<Vec<SubmitCall>>,
    /// Artificial latency per call, for overlap tests.
    pub delay: Mutex<Duration>,
}

impl FakeSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_queue_result(&self, result: QueueSubmitResult) {
        self.queue_results.lock().push_back(result);
    }

    pub fn push_agent_result(&self, result: AgentSubmitResult) {
        self.agent_results.lock().push_back(result);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn queue_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SubmitCall::Queue { .. }))
            .count()
    }

    pub fn agent_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, SubmitCall::Agent { .. }))
            .count()
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    async fn submit_to_queue(
        &self,
        director_url: &str,
        req: &SubmitRequest,
    ) -> QueueSubmitResult {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(SubmitCall::Queue {
            director_url: director_url.to_string(),
            req: req.clone(),
        });
        self.queue_results
            .lock()
            .pop_front()
            .unwrap_or(QueueSubmitResult::Error("no scripted result".to_string()))
    }

    async fn submit_to_agent(&self, agent_url: &str, req: &SubmitRequest) -> AgentSubmitResult {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(SubmitCall::Agent {
            agent_url: agent_url.to_string(),
            req: req.clone(),
        });
        self.agent_results
            .lock()
            .pop_front()
            .unwrap_or(AgentSubmitResult::Error("no scripted result".to_string()))
    }
}
