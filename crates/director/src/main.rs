//! agencyd binary: the director process.

use agency_director::{serve_external, serve_internal, AppState, Director, DirectorConfig};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "agencyd", about = "Agency director: queue, dispatch, sessions")]
struct Args {
    /// External (authenticated) port.
    #[arg(long, env = "AGENCY_DIRECTOR_PORT", default_value_t = 9000)]
    port: u16,

    /// Internal loopback port for scheduler submissions and callbacks.
    #[arg(long, env = "AGENCY_DIRECTOR_INTERNAL_PORT", default_value_t = 9001)]
    internal_port: u16,

    /// Bind address of the external surface.
    #[arg(long, env = "AGENCY_DIRECTOR_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Token required on external /api routes (empty disables auth).
    #[arg(long, env = "AGENCY_DIRECTOR_TOKEN", default_value = "")]
    token: String,

    /// Work queue capacity.
    #[arg(long, env = "AGENCY_QUEUE_CAPACITY", default_value_t = 100)]
    queue_capacity: usize,

    /// State directory (persisted queue).
    #[arg(long, env = "AGENCY_DIRECTOR_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// First port of the agent discovery range.
    #[arg(long, env = "AGENCY_DISCOVERY_START", default_value_t = 8700)]
    discovery_start: u16,

    /// Last port of the agent discovery range.
    #[arg(long, env = "AGENCY_DISCOVERY_END", default_value_t = 8720)]
    discovery_end: u16,
}

fn default_state_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agency")
        .join("director")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("AGENCY_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state_dir = args.state_dir.unwrap_or_else(default_state_dir);
    let mut config = DirectorConfig::new(args.port, args.internal_port, state_dir);
    config.token = args.token;
    config.queue_capacity = args.queue_capacity;
    config.discovery.port_range = args.discovery_start..=args.discovery_end;

    let director = match Director::new(config.clone()) {
        Ok(director) => Arc::new(director),
        Err(err) => {
            tracing::error!(error = %err, "failed to open queue");
            return ExitCode::FAILURE;
        }
    };

    let external = match tokio::net::TcpListener::bind((args.bind.as_str(), config.external_port))
        .await
    {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(port = config.external_port, error = %err, "failed to bind external");
            return ExitCode::FAILURE;
        }
    };
    // Internal surface is loopback-only by construction.
    let internal =
        match tokio::net::TcpListener::bind(("127.0.0.1", config.internal_port)).await {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(port = config.internal_port, error = %err, "failed to bind internal");
                return ExitCode::FAILURE;
            }
        };

    director.start();

    let shutdown = director.shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    tracing::info!(
        external_port = config.external_port,
        internal_port = config.internal_port,
        state_dir = %config.state_dir.display(),
        "director listening"
    );

    let state = AppState { director };
    let internal_task = tokio::spawn(serve_internal(internal, state.clone()));
    let result = serve_external(external, state).await;
    let _ = internal_task.await;

    match result {
        Ok(()) => {
            tracing::info!("director stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}
