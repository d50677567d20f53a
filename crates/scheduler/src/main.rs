//! agency-sched binary: cron → director queue (or agent fallback).

use agency_scheduler::reload::{spawn_watcher, DEFAULT_RELOAD_INTERVAL};
use agency_scheduler::{serve, AppState, HttpSubmitter, Scheduler, SchedulerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "agency-sched", about = "Cron scheduler feeding the Agency queue")]
struct Args {
    /// Path to the TOML config file.
    #[arg(long, env = "AGENCY_SCHED_CONFIG")]
    config: PathBuf,

    /// Override the config file's port.
    #[arg(long, env = "AGENCY_SCHED_PORT")]
    port: Option<u16>,

    /// Config mtime poll interval in seconds.
    #[arg(long, env = "AGENCY_SCHED_RELOAD_SECONDS")]
    reload_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("AGENCY_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match SchedulerConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %args.config.display(), error = %err, "invalid config");
            return ExitCode::FAILURE;
        }
    };
    let port = args.port.unwrap_or(config.port);
    let job_count = config.jobs.len();

    let scheduler = Scheduler::new(config, Arc::new(HttpSubmitter::default()));
    let shutdown = CancellationToken::new();

    let listener = match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(port, error = %err, "failed to bind");
            return ExitCode::FAILURE;
        }
    };

    scheduler.spawn_tick_loop(shutdown.clone());
    let reload_interval = args
        .reload_seconds
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RELOAD_INTERVAL);
    spawn_watcher(
        scheduler.clone(),
        args.config.clone(),
        reload_interval,
        shutdown.clone(),
    );

    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            ctrl_c_shutdown.cancel();
        }
    });

    tracing::info!(port, jobs = job_count, config = %args.config.display(), "scheduler listening");

    let state = AppState {
        scheduler,
        shutdown,
    };
    match serve(listener, state).await {
        Ok(()) => {
            tracing::info!("scheduler stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}
