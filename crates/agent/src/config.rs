//! Agent instance configuration.

use agency_core::{AgentKind, Tier};
use std::path::PathBuf;
use std::time::Duration;

/// Default per-task deadline when the submission does not set one.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Tier → model mapping. The submission may still pin an explicit model.
#[derive(Debug, Clone)]
pub struct TierModels {
    pub fast: String,
    pub standard: String,
    pub heavy: String,
}

impl TierModels {
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Standard => &self.standard,
            Tier::Heavy => &self.heavy,
        }
    }
}

impl Default for TierModels {
    fn default() -> Self {
        Self {
            fast: "haiku".to_string(),
            standard: "sonnet".to_string(),
            heavy: "opus".to_string(),
        }
    }
}

/// Static configuration of one agent process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub port: u16,
    pub kind: AgentKind,
    pub models: TierModels,
    /// Root under which `sessions/`, `history/`, and `prompts/` live.
    pub state_dir: PathBuf,
    /// Deployment mode; selects the agency prompt file
    /// (`<kind>-<mode>.md`, falling back to `<kind>-prod.md`).
    pub mode: String,
    pub default_timeout: Duration,
}

impl AgentConfig {
    pub fn new(port: u16, kind: AgentKind, state_dir: PathBuf) -> Self {
        Self {
            port,
            kind,
            models: TierModels::default(),
            state_dir,
            mode: "prod".to_string(),
            default_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.state_dir.join("sessions")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.state_dir.join("history")
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.state_dir.join("prompts")
    }
}
