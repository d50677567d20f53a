//! Runner for the codex CLI.
//!
//! Codex honors the same stream contract on stdout but has no session
//! resume, so the auto-resume policy is off and a max-turns stop is a
//! plain failure.

use agency_core::{AgentKind, ErrorKind};
use std::path::PathBuf;

use crate::runner::{resolve_bin_named, CommandSpec, Runner, RunnerError};

/// Env var overriding the codex binary path.
pub const CODEX_BIN_ENV: &str = "AGENCY_CODEX_BIN";

#[derive(Debug, Clone, Default)]
pub struct CodexRunner;

impl CodexRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Runner for CodexRunner {
    fn kind(&self) -> AgentKind {
        AgentKind::Codex
    }

    fn resolve_bin(&self) -> Result<PathBuf, RunnerError> {
        resolve_bin_named(CODEX_BIN_ENV, "codex")
    }

    fn build_command(&self, spec: &CommandSpec<'_>) -> Vec<String> {
        let mut args = vec!["exec".to_string(), "--json".to_string()];
        if !spec.model.is_empty() {
            args.push("--model".to_string());
            args.push(spec.model.to_string());
        }
        args.push("--".to_string());
        args.push(spec.prompt.to_string());
        args
    }

    fn error_kind(&self) -> ErrorKind {
        ErrorKind::CodexError
    }

    fn max_turns_limit(&self) -> u32 {
        0
    }

    fn supports_auto_resume(&self) -> bool {
        false
    }
}
