//! Scheduler configuration file (TOML).
//!
//! Startup validation failures abort the process; reload validation
//! failures abort only the reload and the prior config stays in force.

use agency_core::{AgentKind, Tier};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::cron::{CronError, CronExpr};

/// Default scheduler HTTP port.
pub const DEFAULT_PORT: u16 = 9100;
/// Default per-job timeout when a job does not set one.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no jobs defined")]
    NoJobs,
    #[error("agent_url is required")]
    MissingAgentUrl,
    #[error("duplicate job name: {0}")]
    DuplicateJob(String),
    #[error("job {name:?}: prompt is required")]
    EmptyPrompt { name: String },
    #[error("job {name:?}: invalid schedule: {source}")]
    BadSchedule { name: String, source: CronError },
    #[error("job {name:?}: {message}")]
    BadField { name: String, message: String },
}

/// Raw file shape.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub director_url: Option<String>,
    pub agent_url: Option<String>,
    #[serde(default)]
    pub agent_kind: Option<String>,
    #[serde(default)]
    pub jobs: Vec<RawJob>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJob {
    pub name: String,
    pub schedule: String,
    pub prompt: String,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub agent_url: Option<String>,
    #[serde(default)]
    pub agent_kind: Option<String>,
}

/// One validated job definition.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub cron: CronExpr,
    pub prompt: String,
    pub tier: Tier,
    pub model: Option<String>,
    pub timeout: Duration,
    /// Per-job overrides; fall back to the top-level values.
    pub agent_url: Option<String>,
    pub agent_kind: AgentKind,
}

/// Validated scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub port: u16,
    pub director_url: Option<String>,
    pub agent_url: String,
    pub jobs: Vec<JobSpec>,
}

impl SchedulerConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let raw: RawConfig = toml::from_str(&text)?;
        Self::validate(raw)
    }

    pub fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let agent_url = raw
            .agent_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingAgentUrl)?
            .trim_end_matches('/')
            .to_string();

        if raw.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }

        let default_kind = match raw.agent_kind.as_deref() {
            None | Some("") => AgentKind::default(),
            Some(s) => AgentKind::from_str(s).map_err(|message| ConfigError::BadField {
                name: "<top-level>".to_string(),
                message,
            })?,
        };

        let mut names = HashSet::new();
        let mut jobs = Vec::with_capacity(raw.jobs.len());
        for job in &raw.jobs {
            if !names.insert(job.name.clone()) {
                return Err(ConfigError::DuplicateJob(job.name.clone()));
            }
            if job.prompt.trim().is_empty() {
                return Err(ConfigError::EmptyPrompt {
                    name: job.name.clone(),
                });
            }
            let cron = CronExpr::parse(&job.schedule).map_err(|source| {
                ConfigError::BadSchedule {
                    name: job.name.clone(),
                    source,
                }
            })?;
            let tier = match job.tier.as_deref() {
                None | Some("") => Tier::default(),
                Some(s) => Tier::from_str(s).map_err(|message| ConfigError::BadField {
                    name: job.name.clone(),
                    message,
                })?,
            };
            let agent_kind = match job.agent_kind.as_deref() {
                None | Some("") => default_kind,
                Some(s) => AgentKind::from_str(s).map_err(|message| ConfigError::BadField {
                    name: job.name.clone(),
                    message,
                })?,
            };

            jobs.push(JobSpec {
                name: job.name.clone(),
                cron,
                prompt: job.prompt.clone(),
                tier,
                model: job.model.clone(),
                timeout: job
                    .timeout_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_JOB_TIMEOUT),
                agent_url: job
                    .agent_url
                    .as_deref()
                    .filter(|u| !u.is_empty())
                    .map(|u| u.trim_end_matches('/').to_string()),
                agent_kind,
            });
        }

        Ok(Self {
            port: raw.port,
            director_url: raw
                .director_url
                .filter(|u| !u.is_empty())
                .map(|u| u.trim_end_matches('/').to_string()),
            agent_url,
            jobs,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
