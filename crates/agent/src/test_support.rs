//! Scripted stand-in for a wrapped CLI.
//!
//! Runs `/bin/sh -c <script>` with the prompt as `$1` and the resume
//! session id as `$2`, so tests can emit exactly the stream protocol
//! they need without a real CLI on the machine.

use agency_core::{AgentKind, ErrorKind};
use std::path::PathBuf;

use crate::executor::Executor;
use crate::AgentConfig;
use agency_adapters::{CommandSpec, Runner, RunnerError};

/// Runner that executes a fixed shell script instead of a CLI binary.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    pub script: String,
    pub kind: AgentKind,
    pub max_turns_limit: u32,
    pub supports_auto_resume: bool,
}

impl ScriptRunner {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            kind: AgentKind::Claude,
            max_turns_limit: 2,
            supports_auto_resume: true,
        }
    }

    /// Script that emits a successful run with the given final text.
    pub fn success(final_text: &str) -> Self {
        Self::new(format!(
            r#"printf '{{"type":"system","subtype":"init","session_id":"ses-cli","model":"m","tools":[]}}\n'
printf '{{"type":"assistant","message":{{"content":[{{"type":"text","text":"%s"}}]}}}}\n' "{final_text}"
printf '{{"type":"result","subtype":"success","session_id":"ses-cli","duration_ms":5,"num_turns":1,"usage":{{"input_tokens":3,"output_tokens":2}},"result":"%s"}}\n' "{final_text}"
"#
        ))
    }

    /// Script that sleeps, for cancellation and timeout tests.
    pub fn sleeper(seconds: u32) -> Self {
        Self::new(format!("sleep {seconds}\n"))
    }
}

impl Runner for ScriptRunner {
    fn kind(&self) -> AgentKind {
        self.kind
    }

    fn resolve_bin(&self) -> Result<PathBuf, RunnerError> {
        Ok(PathBuf::from("/bin/sh"))
    }

    fn build_command(&self, spec: &CommandSpec<'_>) -> Vec<String> {
        vec![
            "-c".to_string(),
            self.script.clone(),
            "sh".to_string(),
            spec.prompt.to_string(),
            spec.resume_session_id.unwrap_or("").to_string(),
        ]
    }

    fn error_kind(&self) -> ErrorKind {
        match self.kind {
            AgentKind::Claude => ErrorKind::ClaudeError,
            AgentKind::Codex => ErrorKind::CodexError,
        }
    }

    fn max_turns_limit(&self) -> u32 {
        self.max_turns_limit
    }

    fn supports_auto_resume(&self) -> bool {
        self.supports_auto_resume
    }
}

/// Executor over a [`ScriptRunner`] with state under `state_dir`.
#[allow(clippy::unwrap_used)]
pub fn script_executor(state_dir: impl Into<PathBuf>, runner: ScriptRunner) -> Executor {
    let config = AgentConfig::new(0, runner.kind, state_dir.into());
    Executor::new(config, Box::new(runner)).unwrap()
}
