//! Scripted agent client for dispatcher tests.

use agency_core::{SessionId, SubmitRequest, TaskAccepted, TaskId, TaskState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::agent_client::{AgentClient, SubmitResult};

/// Record of one call the fake received.
#[derive(Debug, Clone)]
pub enum AgentCall {
    Submit { agent_url: String, req: SubmitRequest },
    Cancel { agent_url: String, task_id: String },
}

/// Agent client that replays scripted results and records every call.
#[derive(Default)]
pub struct FakeAgentClient {
    results: Mutex<VecDeque<SubmitResult>>,
    pub calls: Mutex<Vec<AgentCall>>,
}

impl FakeAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result for the next submit call.
    pub fn push_result(&self, result: SubmitResult) {
        self.results.lock().push_back(result);
    }

    /// Convenience: a 201 with fresh ids.
    #[allow(clippy::unwrap_used)]
    pub fn accepted(task_id: &str, session_id: &str) -> SubmitResult {
        SubmitResult::Accepted(TaskAccepted {
            task_id: TaskId::from_string(task_id),
            session_id: SessionId::parse(session_id).unwrap(),
            status: TaskState::Working,
        })
    }

    pub fn submit_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, AgentCall::Submit { .. }))
            .count()
    }

    pub fn cancel_calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                AgentCall::Cancel {
                    agent_url,
                    task_id,
                } => Some((agent_url.clone(), task_id.clone())),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn submit(&self, agent_url: &str, req: &SubmitRequest) -> SubmitResult {
        self.calls.lock().push(AgentCall::Submit {
            agent_url: agent_url.to_string(),
            req: req.clone(),
        });
        self.results
            .lock()
            .pop_front()
            .unwrap_or(SubmitResult::Unreachable("no scripted result".to_string()))
    }

    async fn cancel(&self, agent_url: &str, task_id: &str) -> bool {
        self.calls.lock().push(AgentCall::Cancel {
            agent_url: agent_url.to_string(),
            task_id: task_id.to_string(),
        });
        true
    }
}
