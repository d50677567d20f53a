//! Loopback agent discovery.
//!
//! Probes `GET /status` across a configured port range on an interval.
//! Targets that answer are recorded with their reported phase; targets
//! unseen past the grace period are stale and never dispatched to.

use agency_core::{AgentKind, AgentPhase, AgentStatus, TaskPreview};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::DiscoveryConfig;

/// One discovered agent.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentStatus {
    pub url: String,
    pub kind: AgentKind,
    pub state: AgentPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task: Option<TaskPreview>,
    pub last_seen: DateTime<Utc>,
}

/// Live view of reachable agents.
pub struct Discovery {
    config: DiscoveryConfig,
    client: reqwest::Client,
    agents: RwLock<HashMap<String, ComponentStatus>>,
}

impl Discovery {
    pub fn new(config: DiscoveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Probe the whole range once.
    pub async fn probe_once(&self) {
        for port in self.config.port_range.clone() {
            let url = format!("http://127.0.0.1:{port}");
            match self.client.get(format!("{url}/status")).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<AgentStatus>().await {
                        Ok(status) => {
                            let mut agents = self.agents.write();
                            let seen_first = !agents.contains_key(&url);
                            agents.insert(
                                url.clone(),
                                ComponentStatus {
                                    url: url.clone(),
                                    kind: status.kind,
                                    state: status.state,
                                    current_task: status.current_task,
                                    last_seen: Utc::now(),
                                },
                            );
                            if seen_first {
                                tracing::info!(url, kind = %status.kind, "agent discovered");
                            }
                        }
                        Err(err) => {
                            tracing::debug!(url, error = %err, "undecodable status body");
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Run the probe loop until cancelled.
    pub fn spawn_loop(
        self: &Arc<Self>,
        token: CancellationToken,
        pass_notify: Arc<tokio::sync::Notify>,
    ) {
        let discovery = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(discovery.config.interval) => {
                        discovery.probe_once().await;
                        // Agent state may have changed; nudge the dispatcher.
                        pass_notify.notify_one();
                    }
                }
            }
        });
    }

    /// Every known agent, including stale ones (for dashboards).
    pub fn agents(&self) -> Vec<ComponentStatus> {
        let mut all: Vec<_> = self.agents.read().values().cloned().collect();
        all.sort_by(|a, b| a.url.cmp(&b.url));
        all
    }

    /// Agents seen within the grace period.
    pub fn live_agents(&self) -> Vec<ComponentStatus> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.grace).unwrap_or_default();
        self.agents()
            .into_iter()
            .filter(|a| a.last_seen >= cutoff)
            .collect()
    }

    /// Record a locally-observed state change (e.g. a task was just
    /// dispatched) without waiting for the next probe.
    pub fn note_state(&self, url: &str, state: AgentPhase) {
        if let Some(agent) = self.agents.write().get_mut(url) {
            agent.state = state;
        }
    }

    /// Push an agent out of the live set until the next probe answers.
    pub fn mark_stale(&self, url: &str) {
        if let Some(agent) = self.agents.write().get_mut(url) {
            agent.last_seen = DateTime::<Utc>::MIN_UTC;
            tracing::debug!(url, "agent marked stale");
        }
    }

    /// Test/startup hook: seed a known agent without probing.
    pub fn insert(&self, status: ComponentStatus) {
        self.agents.write().insert(status.url.clone(), status);
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
