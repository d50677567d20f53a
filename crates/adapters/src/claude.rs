//! Runner for the claude CLI.

use agency_core::{AgentKind, ErrorKind, MAX_TURNS_RESUMES};
use std::path::PathBuf;

use crate::runner::{resolve_bin_named, CommandSpec, Runner, RunnerError};

/// Env var overriding the claude binary path.
pub const CLAUDE_BIN_ENV: &str = "AGENCY_CLAUDE_BIN";

#[derive(Debug, Clone, Default)]
pub struct ClaudeRunner;

impl ClaudeRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for ClaudeRunner {
    fn kind(&self) -> AgentKind {
        AgentKind::Claude
    }

    fn resolve_bin(&self) -> Result<PathBuf, RunnerError> {
        resolve_bin_named(CLAUDE_BIN_ENV, "claude")
    }

    fn build_command(&self, spec: &CommandSpec<'_>) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
        ];
        if !spec.model.is_empty() {
            args.push("--model".to_string());
            args.push(spec.model.to_string());
        }
        if let Some(session_id) = spec.resume_session_id {
            args.push("--resume".to_string());
            args.push(session_id.to_string());
        }
        args.push("--".to_string());
        args.push(spec.prompt.to_string());
        args
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::ClaudeError
    }

    fn max_turns_limit(&self) -> u32 {
        MAX_TURNS_RESUMES
    }

    fn supports_auto_resume(&self) -> bool {
        true
    }
}
