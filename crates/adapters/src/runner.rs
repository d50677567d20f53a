//! The pluggable runner seam.
//!
//! A runner owns everything CLI-specific: binary resolution, argument
//! assembly, final-result parsing, and the policy knobs (error kind,
//! max-turns resume limit) the executor consults. The executor itself
//! never looks at a provider flag.

use agency_core::{AgentKind, ErrorKind, RunMetrics, TokenUsage};
use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::{StreamLine, SUBTYPE_MAX_TURNS};

/// Errors from runner operations.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("binary not found: {0}")]
    BinNotFound(String),
}

/// Inputs to [`Runner::build_command`].
#[derive(Debug, Clone)]
pub struct CommandSpec<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    /// Resume this CLI session instead of starting fresh.
    pub resume_session_id: Option<&'a str>,
}

/// Parsed view of the run's trailing `result` event.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub session_id: Option<String>,
    pub subtype: Option<String>,
    pub usage: Option<TokenUsage>,
    pub metrics: Option<RunMetrics>,
    pub final_text: Option<String>,
    pub is_error: bool,
}

impl RunOutcome {
    /// The CLI stopped because it hit its turn limit.
    pub fn is_max_turns(&self) -> bool {
        self.subtype.as_deref() == Some(SUBTYPE_MAX_TURNS)
    }
}

/// A wrapped-CLI flavor.
pub trait Runner: Send + Sync + 'static {
    fn kind(&self) -> AgentKind;

    /// Locate the CLI binary (env override first, then `$PATH`).
    fn resolve_bin(&self) -> Result<PathBuf, RunnerError>;

    /// Argument vector, excluding the binary itself. The prompt always
    /// follows a `--` sentinel so leading-dash content is never
    /// re-parsed as flags.
    fn build_command(&self, spec: &CommandSpec<'_>) -> Vec<String>;

    /// Parse the buffered stream for the trailing `result` event.
    fn parse_output(&self, raw: &str) -> RunOutcome {
        parse_result_stream(raw)
    }

    /// Error kind for CLI-level failures of this flavor.
    fn error_kind(&self) -> ErrorKind;

    /// How many automatic resumes after `error_max_turns`.
    fn max_turns_limit(&self) -> u32;

    /// Whether this CLI can resume a session at all.
    fn supports_auto_resume(&self) -> bool;
}

/// Construct the runner for an agent kind.
pub fn runner_for(kind: AgentKind) -> Box<dyn Runner> {
    match kind {
        AgentKind::Claude => Box::new(crate::ClaudeRunner::new()),
        AgentKind::Codex => Box::new(crate::CodexRunner::new()),
    }
}

/// Scan the buffered stream for `result` lines; the last one wins.
pub(crate) fn parse_result_stream(raw: &str) -> RunOutcome {
    let mut outcome = RunOutcome::default();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<StreamLine>(trimmed) else {
            continue;
        };
        if let StreamLine::Result {
            subtype,
            session_id,
            duration_ms,
            num_turns,
            total_cost_usd,
            usage,
            result,
            is_error,
        } = parsed
        {
            outcome = RunOutcome {
                session_id,
                subtype,
                usage: usage.map(|u| TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                }),
                metrics: Some(RunMetrics {
                    duration_ms: duration_ms.unwrap_or(0),
                    num_turns: num_turns.unwrap_or(0),
                    total_cost_usd: total_cost_usd.unwrap_or(0.0),
                    input_tokens: usage.map(|u| u.input_tokens).unwrap_or(0),
                    output_tokens: usage.map(|u| u.output_tokens).unwrap_or(0),
                }),
                final_text: result,
                is_error,
            };
        }
    }
    outcome
}

/// Resolve a binary: explicit env override, else first `$PATH` hit.
pub(crate) fn resolve_bin_named(env_override: &str, name: &str) -> Result<PathBuf, RunnerError> {
    if let Ok(path) = std::env::var(env_override) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    let paths = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&paths) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(RunnerError::BinNotFound(name.to_string()))
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
