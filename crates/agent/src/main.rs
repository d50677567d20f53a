//! agency-agent binary: one CLI-backed worker on one port.

use agency_adapters::runner_for;
use agency_agent::{serve, AgentConfig, AppState, Executor, RingLog};
use agency_core::AgentKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "agency-agent", about = "Single-task CLI-backed worker")]
struct Args {
    /// Port to listen on (loopback).
    #[arg(long, env = "AGENCY_AGENT_PORT", default_value_t = 8700)]
    port: u16,

    /// Wrapped CLI flavor: claude or codex.
    #[arg(long, env = "AGENCY_AGENT_KIND", default_value = "claude")]
    kind: String,

    /// State directory (sessions, history, prompts).
    #[arg(long, env = "AGENCY_AGENT_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Deployment mode for agency prompt selection.
    #[arg(long, env = "AGENCY_AGENT_MODE", default_value = "prod")]
    mode: String,

    /// Default per-task timeout in seconds.
    #[arg(long, env = "AGENCY_AGENT_TIMEOUT", default_value_t = 900)]
    timeout_seconds: u64,

    /// Model for fast-tier tasks.
    #[arg(long, env = "AGENCY_AGENT_MODEL_FAST")]
    model_fast: Option<String>,

    /// Model for standard-tier tasks.
    #[arg(long, env = "AGENCY_AGENT_MODEL")]
    model: Option<String>,

    /// Model for heavy-tier tasks.
    #[arg(long, env = "AGENCY_AGENT_MODEL_HEAVY")]
    model_heavy: Option<String>,
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agency")
        .join("agent")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let ring = RingLog::default();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("AGENCY_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(ring.layer())
        .init();

    let kind = match AgentKind::from_str(&args.kind) {
        Ok(kind) => kind,
        Err(err) => {
            tracing::error!(error = %err, "invalid --kind");
            return ExitCode::FAILURE;
        }
    };

    let state_dir = args.state_dir.unwrap_or_else(default_state_dir);
    let mut config = AgentConfig::new(args.port, kind, state_dir);
    config.mode = args.mode;
    config.default_timeout = Duration::from_secs(args.timeout_seconds.max(1));
    if let Some(model) = args.model_fast {
        config.models.fast = model;
    }
    if let Some(model) = args.model {
        config.models.standard = model;
    }
    if let Some(model) = args.model_heavy {
        config.models.heavy = model;
    }

    let executor = match Executor::new(config.clone(), runner_for(kind)) {
        Ok(executor) => executor,
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize executor");
            return ExitCode::FAILURE;
        }
    };

    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(port = config.port, error = %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    let state = AppState {
        executor,
        ring,
        shutdown: shutdown.clone(),
    };

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            ctrl_c_shutdown.cancel();
        }
    });

    tracing::info!(
        port = config.port,
        kind = %config.kind,
        state_dir = %config.state_dir.display(),
        "agent listening"
    );

    match serve(listener, state).await {
        Ok(()) => {
            tracing::info!("agent stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}
