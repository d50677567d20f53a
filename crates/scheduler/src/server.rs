//! Scheduler HTTP surface: status, manual trigger, shutdown.

use agency_core::{ApiError, ErrorKind};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::io;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::scheduler::{Scheduler, TriggerError};

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/trigger/{name}", post(post_trigger))
        .route("/shutdown", post(post_shutdown))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> io::Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn get_status(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "service": "agency-scheduler",
        "version": env!("CARGO_PKG_VERSION"),
        "jobs": state.scheduler.snapshots(),
    }))
    .into_response()
}

async fn post_trigger(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.scheduler.trigger(&name).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(TriggerError::NotFound(name)) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                ErrorKind::NotFound,
                format!("unknown job: {name}"),
            )),
        )
            .into_response(),
        Err(TriggerError::Running(name)) => (
            StatusCode::CONFLICT,
            Json(ApiError::new(
                ErrorKind::AgentBusy,
                format!("job already running: {name}"),
            )),
        )
            .into_response(),
    }
}

async fn post_shutdown(State(state): State<AppState>) -> Response {
    tracing::info!("shutdown requested");
    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.cancel();
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"state": "shutting_down"})),
    )
        .into_response()
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
