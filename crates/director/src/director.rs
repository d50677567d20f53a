//! Wiring and lifecycle of one director process.

use agency_core::{QueueId, QueueState, QueuedTask, ValidSubmit};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::agent_client::{AgentClient, HttpAgentClient};
use crate::config::DirectorConfig;
use crate::discovery::Discovery;
use crate::dispatcher::Dispatcher;
use crate::queue::{QueueError, WorkQueue};
use crate::sessions::{AgentHistoryRow, SessionStore};

/// The assembled director: queue, sessions, discovery, dispatcher.
pub struct Director {
    pub config: DirectorConfig,
    pub queue: Arc<WorkQueue>,
    pub sessions: Arc<SessionStore>,
    pub discovery: Arc<Discovery>,
    pub dispatcher: Arc<Dispatcher>,
    /// Nudges the dispatch loop; enqueue, callbacks, and discovery all
    /// poke this.
    pub pass_notify: Arc<Notify>,
    pub shutdown: CancellationToken,
    http: reqwest::Client,
}

impl Director {
    pub fn new(config: DirectorConfig) -> Result<Self, QueueError> {
        Self::with_client(config, Arc::new(HttpAgentClient::default()))
    }

    /// Construction with an injected agent client (tests).
    pub fn with_client(
        config: DirectorConfig,
        client: Arc<dyn AgentClient>,
    ) -> Result<Self, QueueError> {
        let queue = Arc::new(WorkQueue::open(config.queue_dir(), config.queue_capacity)?);
        let sessions = Arc::new(SessionStore::new());
        let discovery = Arc::new(Discovery::new(config.discovery.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            queue.clone(),
            sessions.clone(),
            discovery.clone(),
            client,
            config.internal_base_url(),
        ));
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Ok(Self {
            config,
            queue,
            sessions,
            discovery,
            dispatcher,
            pass_notify: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            http,
        })
    }

    /// Recover orphans and start the background loops.
    pub fn start(&self) {
        self.dispatcher.recover();
        self.discovery
            .spawn_loop(self.shutdown.clone(), self.pass_notify.clone());

        let dispatcher = self.dispatcher.clone();
        let notify = self.pass_notify.clone();
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                }
                dispatcher.run_pass().await;
            }
        });
    }

    /// Admit a validated submission into the queue.
    pub fn enqueue(&self, valid: ValidSubmit) -> Result<QueueId, QueueError> {
        let task = QueuedTask {
            id: QueueId::generate(),
            prompt: valid.prompt,
            tier: valid.tier,
            timeout_seconds: valid.timeout.as_secs(),
            session_id: valid.session_id,
            env: valid.env,
            agent_kind: valid.agent_kind,
            model: valid.model,
            source: valid.source,
            source_job: valid.source_job,
            state: QueueState::Pending,
            agent_url: None,
            task_id: None,
            enqueued_at: chrono::Utc::now(),
            dispatched_at: None,
        };
        let id = task.id.clone();
        self.queue.enqueue(task)?;
        self.pass_notify.notify_one();
        Ok(id)
    }

    /// Cross-reference every live agent's history into the session
    /// store (dashboard refresh, restart recovery).
    pub async fn reconcile_sessions(&self) {
        #[derive(serde::Deserialize)]
        struct HistoryPage {
            entries: Vec<AgentHistoryRow>,
        }

        for agent in self.discovery.live_agents() {
            let url = format!("{}/history?limit=100", agent.url);
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<HistoryPage>().await {
                        Ok(page) => self.sessions.reconcile(&agent.url, &page.entries),
                        Err(err) => {
                            tracing::debug!(url = %agent.url, error = %err, "undecodable history page")
                        }
                    }
                }
                Ok(resp) => {
                    tracing::debug!(url = %agent.url, status = %resp.status(), "history fetch failed")
                }
                Err(err) => {
                    tracing::debug!(url = %agent.url, error = %err, "history fetch failed")
                }
            }
        }
    }

    /// Proxy a task-detail query to an agent, falling through from its
    /// live map to its history.
    pub async fn proxy_task(&self, task_id: &str, agent_url: &str) -> Option<serde_json::Value> {
        let base = agent_url.trim_end_matches('/');
        for path in [format!("{base}/task/{task_id}"), format!("{base}/history/{task_id}")] {
            match self.http.get(&path).send().await {
                Ok(resp) if resp.status().is_success() => {
                    if let Ok(body) = resp.json::<serde_json::Value>().await {
                        return Some(body);
                    }
                }
                _ => {}
            }
        }
        None
    }
}
