//! Single-task subprocess supervisor.
//!
//! One instance-level lock guards `{phase, current, tasks}`; a second
//! submission while a task is in flight answers 409. The subprocess
//! runs in its own process group so cancellation reaches grandchildren
//! the wrapped CLI spawned. All long work happens without the lock;
//! every field touch reacquires it.

use agency_core::{
    preview, AgentPhase, AgentStatus, CallbackPayload, SessionId, Task, TaskError, TaskId,
    TaskPreview, TaskState, TokenUsage, ValidSubmit, PREVIEW_LEN,
};
use agency_core::{AgentConfigInfo, ErrorKind};
use agency_adapters::{CommandSpec, Runner, StreamParser, MAX_LINE_LEN};
use chrono::Utc;
use futures_util::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;

use crate::agency_prompt::{compose_prompt, load_agency_prompt};
use crate::callback::deliver_callback;
use crate::config::AgentConfig;
use crate::history::{HistoryEntry, HistoryStore};
use crate::outline::extract_steps;
use crate::workdir::{adopt_workdir, prepare_workdir};

/// Cap on buffered stderr, kept for error messages.
const STDERR_TAIL: usize = 64 * 1024;
/// Grace period between SIGTERM and SIGKILL when reaping.
const REAP_GRACE: Duration = Duration::from_secs(5);

/// Errors surfaced by executor entry points.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("agent busy with {current_task}")]
    Busy { current_task: TaskId },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already completed: {0}")]
    AlreadyCompleted(String),
    #[error("session error: {0}")]
    Session(String),
}

struct ExecState {
    phase: AgentPhase,
    current: Option<TaskId>,
    current_pid: Option<u32>,
    cancel: Option<CancellationToken>,
    tasks: HashMap<TaskId, Task>,
}

struct ExecutorInner {
    config: AgentConfig,
    runner: Box<dyn Runner>,
    history: HistoryStore,
    state: RwLock<ExecState>,
    started_at: Instant,
}

/// Handle to the agent's one-task-at-a-time execution core.
#[derive(Clone)]
pub struct Executor {
    inner: Arc<ExecutorInner>,
}

impl Executor {
    pub fn new(config: AgentConfig, runner: Box<dyn Runner>) -> Result<Self, ExecError> {
        let history = HistoryStore::new(config.history_dir())
            .map_err(|e| ExecError::Session(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(ExecutorInner {
                config,
                runner,
                history,
                state: RwLock::new(ExecState {
                    phase: AgentPhase::Idle,
                    current: None,
                    current_pid: None,
                    cancel: None,
                    tasks: HashMap::new(),
                }),
                started_at: Instant::now(),
            }),
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.inner.history
    }

    /// Accept a validated submission, or answer busy.
    pub fn accept(&self, submit: ValidSubmit) -> Result<Task, ExecError> {
        let session_id = submit
            .session_id
            .clone()
            .unwrap_or_else(SessionId::generate);
        let resume = submit.session_id.is_some();
        let model = submit
            .model
            .clone()
            .unwrap_or_else(|| self.inner.config.models.model_for(submit.tier).to_string());

        let (task, token) = {
            let mut state = self.inner.state.write();
            if state.phase != AgentPhase::Idle {
                let current_task = state
                    .current
                    .clone()
                    .unwrap_or_else(|| TaskId::from_string(""));
                return Err(ExecError::Busy { current_task });
            }

            let task = Task {
                id: TaskId::generate(),
                session_id: session_id.clone(),
                prompt: submit.prompt.clone(),
                tier: submit.tier,
                model,
                timeout_seconds: submit.timeout.as_secs(),
                resume_session: resume,
                work_dir: crate::workdir::session_workdir(
                    &self.inner.config.sessions_dir(),
                    &session_id,
                ),
                state: TaskState::Working,
                source: submit.source,
                env: submit.env.clone(),
                started_at: Utc::now(),
                completed_at: None,
                exit_code: None,
                output: None,
                error: None,
                token_usage: None,
                duration_seconds: None,
                callback_url: submit.callback_url.clone(),
                max_turns_resumes: 0,
            };

            // Keep the in-memory map bounded; history holds the rest.
            if state.tasks.len() >= 64 {
                let oldest_terminal = state
                    .tasks
                    .values()
                    .filter(|t| t.state.is_terminal())
                    .min_by_key(|t| t.completed_at)
                    .map(|t| t.id.clone());
                if let Some(id) = oldest_terminal {
                    state.tasks.remove(id.as_str());
                }
            }

            let token = CancellationToken::new();
            state.phase = AgentPhase::Working;
            state.current = Some(task.id.clone());
            state.cancel = Some(token.clone());
            state.tasks.insert(task.id.clone(), task.clone());
            (task, token)
        };

        tracing::info!(
            task_id = %task.id,
            session_id = %task.session_id,
            tier = %task.tier,
            resume = task.resume_session,
            "task accepted"
        );

        let inner = self.inner.clone();
        let task_id = task.id.clone();
        tokio::spawn(async move {
            run_task(inner, task_id, token).await;
        });

        Ok(task)
    }

    /// Cancel a task: mark it, cancel the token, and signal the
    /// process group. 404 for unknown ids, 409 for terminal tasks.
    pub fn cancel(&self, task_id: &str) -> Result<(), ExecError> {
        let (token, pid) = {
            let mut state = self.inner.state.write();
            let Some(task) = state.tasks.get_mut(task_id) else {
                return Err(ExecError::NotFound(task_id.to_string()));
            };
            if task.state.is_terminal() {
                return Err(ExecError::AlreadyCompleted(task_id.to_string()));
            }
            task.state = TaskState::Cancelled;
            task.error = Some(TaskError::new(ErrorKind::Cancelled, "task cancelled"));
            task.completed_at = Some(Utc::now());
            state.phase = AgentPhase::Cancelling;
            (state.cancel.clone(), state.current_pid)
        };

        tracing::info!(task_id, "cancelling task");
        if let Some(token) = token {
            token.cancel();
        }
        if let Some(pid) = pid {
            signal_group(pid);
        }
        Ok(())
    }

    /// Cancel whatever is running (used by forced shutdown).
    pub fn cancel_current(&self) {
        let current = self.inner.state.read().current.clone();
        if let Some(task_id) = current {
            let _ = self.cancel(task_id.as_str());
        }
    }

    /// In-memory task lookup; history is the fallback at the API layer.
    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.inner.state.read().tasks.get(task_id).cloned()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.state.read().phase == AgentPhase::Idle
    }

    pub fn status(&self) -> AgentStatus {
        let state = self.inner.state.read();
        let current_task = state.current.as_ref().and_then(|id| {
            state.tasks.get(id.as_str()).map(|task| TaskPreview {
                task_id: task.id.clone(),
                session_id: task.session_id.clone(),
                prompt_preview: preview(&task.prompt, PREVIEW_LEN),
                started_at: task.started_at,
            })
        });
        AgentStatus {
            state: state.phase,
            kind: self.inner.config.kind,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.inner.started_at.elapsed().as_secs(),
            current_task,
            config: AgentConfigInfo {
                port: self.inner.config.port,
                model: self.inner.config.models.standard.clone(),
            },
        }
    }
}

/// Terminal data computed by the run loop.
struct RunResult {
    state: TaskState,
    exit_code: Option<i32>,
    output: Option<String>,
    error: Option<TaskError>,
    usage: Option<TokenUsage>,
    session_id: SessionId,
    resumes: u32,
}

/// How one subprocess attempt ended.
enum AttemptEnd {
    Finished(std::process::ExitStatus),
    Cancelled,
    TimedOut,
    StreamError(String),
}

async fn run_task(inner: Arc<ExecutorInner>, task_id: TaskId, token: CancellationToken) {
    let task = {
        let state = inner.state.read();
        match state.tasks.get(task_id.as_str()) {
            Some(task) => task.clone(),
            None => return,
        }
    };

    let mut raw = String::new();
    let result = execute(&inner, &task, &token, &mut raw).await;
    finalize(&inner, &task_id, result, raw).await;
}

async fn execute(
    inner: &ExecutorInner,
    task: &Task,
    token: &CancellationToken,
    raw: &mut String,
) -> RunResult {
    let mut session_id = task.session_id.clone();
    let mut resume = task.resume_session;
    let mut resumes = 0u32;
    let runner = inner.runner.as_ref();

    let fail = |kind: ErrorKind, message: String, session_id: &SessionId, resumes: u32| RunResult {
        state: TaskState::Failed,
        exit_code: None,
        output: None,
        error: Some(TaskError::new(kind, message)),
        usage: None,
        session_id: session_id.clone(),
        resumes,
    };

    // Workspace first: a fresh session purges any stale directory.
    let mut workdir = match prepare_workdir(&inner.config.sessions_dir(), &session_id, resume) {
        Ok(dir) => dir,
        Err(err) => {
            return fail(
                ErrorKind::SessionError,
                format!("failed to prepare workdir: {err}"),
                &session_id,
                resumes,
            )
        }
    };

    let agency = match load_agency_prompt(
        &inner.config.prompts_dir(),
        inner.config.kind,
        &inner.config.mode,
    ) {
        Ok(prompt) => prompt,
        Err(err) => {
            return fail(
                ErrorKind::PromptError,
                format!("failed to read agency prompt: {err}"),
                &session_id,
                resumes,
            )
        }
    };
    let full_prompt = compose_prompt(agency.as_deref(), &task.prompt);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(task.timeout_seconds);

    loop {
        let spec = CommandSpec {
            prompt: &full_prompt,
            model: &task.model,
            resume_session_id: resume.then(|| session_id.as_str()),
        };
        let bin = match runner.resolve_bin() {
            Ok(bin) => bin,
            Err(err) => {
                return fail(ErrorKind::StartError, err.to_string(), &session_id, resumes)
            }
        };
        let args = runner.build_command(&spec);

        let mut cmd = Command::new(&bin);
        cmd.args(&args)
            .current_dir(&workdir)
            .envs(&task.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                return fail(
                    ErrorKind::StartError,
                    format!("failed to spawn {}: {err}", bin.display()),
                    &session_id,
                    resumes,
                )
            }
        };

        let pid = child.id();
        {
            let mut state = inner.state.write();
            state.current_pid = pid;
        }
        tracing::info!(
            task_id = %task.id,
            pid = pid.unwrap_or(0),
            bin = %bin.display(),
            resume,
            "subprocess spawned"
        );

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child, pid).await;
            return fail(
                ErrorKind::PipeError,
                "stdout pipe missing".to_string(),
                &session_id,
                resumes,
            );
        };
        let stderr_tail = spawn_stderr_tail(child.stderr.take());

        let mut frames = FramedRead::new(stdout, LinesCodec::new_with_max_length(MAX_LINE_LEN));
        let mut parser = StreamParser::new();
        let end = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    if let Some(pid) = pid { signal_group(pid); }
                    break AttemptEnd::Cancelled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    if let Some(pid) = pid { signal_group(pid); }
                    break AttemptEnd::TimedOut;
                }
                frame = frames.next() => match frame {
                    Some(Ok(line)) => {
                        for event in parser.parse_line(line.as_bytes()) {
                            tracing::debug!(
                                task_id = %task.id,
                                kind = %event.kind,
                                tool = event.tool_name.as_deref().unwrap_or(""),
                                "stream event"
                            );
                        }
                        raw.push_str(&line);
                        raw.push('\n');
                    }
                    Some(Err(err)) => {
                        if let Some(pid) = pid { signal_group(pid); }
                        break AttemptEnd::StreamError(err.to_string());
                    }
                    None => {
                        break AttemptEnd::Finished(match child.wait().await {
                            Ok(status) => status,
                            Err(err) => {
                                return fail(
                                    ErrorKind::PipeError,
                                    format!("wait failed: {err}"),
                                    &session_id,
                                    resumes,
                                )
                            }
                        });
                    }
                }
            }
        };

        if !matches!(end, AttemptEnd::Finished(_)) {
            reap(&mut child, pid).await;
        }
        {
            let mut state = inner.state.write();
            state.current_pid = None;
        }

        match end {
            AttemptEnd::Cancelled => {
                return RunResult {
                    state: TaskState::Cancelled,
                    exit_code: None,
                    output: None,
                    error: Some(TaskError::new(ErrorKind::Cancelled, "task cancelled")),
                    usage: None,
                    session_id,
                    resumes,
                };
            }
            AttemptEnd::TimedOut => {
                return fail(
                    ErrorKind::Timeout,
                    format!("deadline exceeded after {}s", task.timeout_seconds),
                    &session_id,
                    resumes,
                );
            }
            AttemptEnd::StreamError(message) => {
                return fail(
                    ErrorKind::PipeError,
                    format!("stream read failed: {message}"),
                    &session_id,
                    resumes,
                );
            }
            AttemptEnd::Finished(exit) => {
                let outcome = runner.parse_output(raw);

                // Adopt the CLI-reported session id when it is safe.
                if let Some(reported) = outcome.session_id.as_deref() {
                    if reported != session_id.as_str() {
                        match SessionId::parse(reported) {
                            Ok(adopted) => {
                                if let Some(moved) = adopt_workdir(
                                    &inner.config.sessions_dir(),
                                    &session_id,
                                    &adopted,
                                ) {
                                    workdir = moved;
                                }
                                tracing::debug!(
                                    task_id = %task.id,
                                    from = %session_id,
                                    to = %adopted,
                                    "adopted CLI-reported session id"
                                );
                                session_id = adopted;
                            }
                            Err(_) => {
                                tracing::warn!(
                                    task_id = %task.id,
                                    reported,
                                    "ignoring unsafe CLI-reported session id"
                                );
                            }
                        }
                    }
                }

                if outcome.is_max_turns() {
                    if runner.supports_auto_resume() && resumes < runner.max_turns_limit() {
                        resumes += 1;
                        resume = true;
                        {
                            let mut state = inner.state.write();
                            if let Some(t) = state.tasks.get_mut(task.id.as_str()) {
                                t.max_turns_resumes = resumes;
                                t.resume_session = true;
                            }
                        }
                        tracing::info!(
                            task_id = %task.id,
                            resumes,
                            "max turns reached, auto-resuming"
                        );
                        continue;
                    }
                    return fail(
                        ErrorKind::MaxTurns,
                        format!("turn limit reached after {resumes} auto-resumes"),
                        &session_id,
                        resumes,
                    );
                }

                let exit_code = exit.code();
                if outcome.is_error || !exit.success() {
                    let stderr = stderr_tail.await.unwrap_or_default();
                    let message = outcome
                        .final_text
                        .clone()
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| {
                            format!(
                                "CLI exited with {:?}: {}",
                                exit_code,
                                preview(stderr.trim(), PREVIEW_LEN)
                            )
                        });
                    let mut result =
                        fail(runner.error_kind(), message, &session_id, resumes);
                    result.exit_code = exit_code;
                    result.usage = outcome.usage;
                    return result;
                }

                return RunResult {
                    state: TaskState::Completed,
                    exit_code,
                    output: outcome.final_text,
                    error: None,
                    usage: outcome.usage,
                    session_id,
                    resumes,
                };
            }
        }
    }
}

async fn finalize(inner: &ExecutorInner, task_id: &TaskId, result: RunResult, raw: String) {
    let completed_at = Utc::now();

    let finished = {
        let mut state = inner.state.write();
        let task = match state.tasks.get_mut(task_id.as_str()) {
            Some(task) => task,
            None => return,
        };
        // A concurrent cancel may have already made the task terminal;
        // the first terminal transition wins.
        if !task.state.is_terminal() {
            task.state = result.state;
            task.error = result.error;
            task.completed_at = Some(completed_at);
        } else if task.completed_at.is_none() {
            task.completed_at = Some(completed_at);
        }
        task.session_id = result.session_id;
        task.exit_code = result.exit_code;
        task.output = result.output;
        task.token_usage = result.usage;
        task.max_turns_resumes = result.resumes;
        task.duration_seconds = Some(
            (task.completed_at.unwrap_or(completed_at) - task.started_at).num_milliseconds()
                as f64
                / 1000.0,
        );
        let finished = task.clone();

        state.phase = AgentPhase::Idle;
        state.current = None;
        state.current_pid = None;
        state.cancel = None;
        finished
    };

    tracing::info!(
        task_id = %finished.id,
        state = %finished.state,
        exit_code = finished.exit_code.unwrap_or(-1),
        duration_s = finished.duration_seconds.unwrap_or(0.0),
        "task finished"
    );

    // History before callback, so a caller reacting to the callback can
    // immediately read the outline.
    let entry = HistoryEntry {
        task_id: finished.id.clone(),
        session_id: finished.session_id.to_string(),
        state: finished.state,
        prompt: finished.prompt.clone(),
        model: finished.model.clone(),
        output: finished.output.clone(),
        prompt_preview: String::new(),
        output_preview: String::new(),
        started_at: finished.started_at,
        completed_at: finished.completed_at.unwrap_or(completed_at),
        duration_seconds: finished.duration_seconds.unwrap_or(0.0),
        exit_code: finished.exit_code,
        error: finished.error.clone(),
        token_usage: finished.token_usage,
        steps: extract_steps(&raw),
        has_debug_log: false,
    };
    if let Err(err) = inner.history.save(entry) {
        tracing::warn!(task_id = %finished.id, error = %err, "failed to save history outline");
    }
    if !raw.is_empty() {
        if let Err(err) = inner.history.save_debug_log(&finished.id, raw.as_bytes()) {
            tracing::warn!(task_id = %finished.id, error = %err, "failed to save debug log");
        }
    }

    if let Some(callback_url) = finished.callback_url.clone() {
        let payload = CallbackPayload {
            task_id: finished.id.clone(),
            state: finished.state,
            exit_code: finished.exit_code,
            error: finished.error.clone(),
            completed_at: finished.completed_at.unwrap_or(completed_at),
        };
        tokio::spawn(async move {
            deliver_callback(&callback_url, &payload).await;
        });
    }
}

/// Collect up to [`STDERR_TAIL`] bytes of stderr in the background.
fn spawn_stderr_tail(
    stderr: Option<tokio::process::ChildStderr>,
) -> tokio::task::JoinHandle<String> {
    tokio::spawn(async move {
        let Some(mut stderr) = stderr else {
            return String::new();
        };
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.len() > STDERR_TAIL {
                        let start = buf.len() - STDERR_TAIL;
                        buf.drain(..start);
                    }
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// SIGTERM the whole process group so grandchildren exit too.
#[cfg(unix)]
fn signal_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    if let Err(err) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::debug!(pid, error = %err, "killpg failed");
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32) {}

/// Reap a signalled child, escalating to SIGKILL after a grace period.
async fn reap(child: &mut Child, pid: Option<u32>) {
    match tokio::time::timeout(REAP_GRACE, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            tracing::warn!(pid = pid.unwrap_or(0), "process ignored SIGTERM, killing");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
