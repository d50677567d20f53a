//! Director configuration.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

/// Default admission-control capacity of the work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How agents are discovered: loopback port probing.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Inclusive port range probed on 127.0.0.1.
    pub port_range: RangeInclusive<u16>,
    /// Probe interval.
    pub interval: Duration,
    /// An agent unseen for longer than this is stale.
    pub grace: Duration,
    /// Per-probe request timeout.
    pub probe_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port_range: 8700..=8720,
            interval: Duration::from_secs(2),
            grace: Duration::from_secs(10),
            probe_timeout: Duration::from_millis(800),
        }
    }
}

/// Static configuration of one director process.
#[derive(Debug, Clone)]
pub struct DirectorConfig {
    /// External (authenticated) listen port.
    pub external_port: u16,
    /// Internal loopback-only listen port.
    pub internal_port: u16,
    /// Token required on external `/api/*` routes.
    pub token: String,
    /// Work queue admission limit.
    pub queue_capacity: usize,
    /// Directory holding the persisted queue.
    pub state_dir: PathBuf,
    /// Default per-task timeout applied to submissions without one.
    pub default_timeout: Duration,
    pub discovery: DiscoveryConfig,
}

impl DirectorConfig {
    pub fn new(external_port: u16, internal_port: u16, state_dir: PathBuf) -> Self {
        Self {
            external_port,
            internal_port,
            token: String::new(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            state_dir,
            default_timeout: Duration::from_secs(15 * 60),
            discovery: DiscoveryConfig::default(),
        }
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.state_dir.join("queue")
    }

    /// Base URL of the internal surface, used in callback URLs.
    pub fn internal_base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.internal_port)
    }
}
