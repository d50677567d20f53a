//! Agent HTTP surface.
//!
//! All routes are loopback-trusted; the director is the authenticated
//! boundary. Task submission, cancellation, and shutdown mutate the
//! executor; everything else is read-only over the executor, history,
//! and the log ring.

use agency_core::{ApiError, ErrorKind, ShutdownRequest, SubmitRequest, TaskAccepted};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::io;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::executor::{ExecError, Executor};
use crate::history::HistoryError;
use crate::logring::RingLog;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub executor: Executor,
    pub ring: RingLog,
    pub shutdown: CancellationToken,
}

/// Build the agent router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/task", post(post_task))
        .route("/task/{id}", get(get_task))
        .route("/task/{id}/cancel", post(post_cancel))
        .route("/shutdown", post(post_shutdown))
        .route("/history", get(get_history))
        .route("/history/{id}", get(get_history_entry))
        .route("/history/{id}/debug", get(get_history_debug))
        .route("/logs", get(get_logs))
        .route("/logs/stats", get(get_log_stats))
        .with_state(state)
}

/// Serve until the shutdown token fires.
pub async fn serve(listener: TcpListener, state: AppState) -> io::Result<()> {
    let shutdown = state.shutdown.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn err(status: StatusCode, body: ApiError) -> Response {
    (status, Json(body)).into_response()
}

async fn get_status(State(state): State<AppState>) -> Response {
    Json(state.executor.status()).into_response()
}

async fn post_task(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Response {
    let valid = match req.validate(state.executor.config().default_timeout) {
        Ok(valid) => valid,
        Err(e) => {
            return err(
                StatusCode::BAD_REQUEST,
                ApiError::new(ErrorKind::ValidationError, e.to_string()),
            )
        }
    };

    match state.executor.accept(valid) {
        Ok(task) => (
            StatusCode::CREATED,
            Json(TaskAccepted {
                task_id: task.id,
                session_id: task.session_id,
                status: task.state,
            }),
        )
            .into_response(),
        Err(ExecError::Busy { current_task }) => err(
            StatusCode::CONFLICT,
            ApiError::new(ErrorKind::AgentBusy, "agent is busy")
                .with_current_task(current_task),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::SessionError, e.to_string()),
        ),
    }
}

async fn get_task(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Some(task) = state.executor.get_task(&id) {
        return Json(task).into_response();
    }
    match state.executor.history().get(&id) {
        Ok(entry) => Json(entry).into_response(),
        Err(HistoryError::NotFound(_)) => err(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorKind::NotFound, format!("unknown task: {id}")),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::SessionError, e.to_string()),
        ),
    }
}

async fn post_cancel(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.executor.cancel(&id) {
        Ok(()) => Json(serde_json::json!({
            "task_id": id,
            "state": "cancelled",
        }))
        .into_response(),
        Err(ExecError::NotFound(_)) => err(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorKind::NotFound, format!("unknown task: {id}")),
        ),
        Err(ExecError::AlreadyCompleted(_)) => err(
            StatusCode::CONFLICT,
            ApiError::new(ErrorKind::AlreadyCompleted, "task already terminal"),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::SessionError, e.to_string()),
        ),
    }
}

async fn post_shutdown(State(state): State<AppState>, body: axum::body::Bytes) -> Response {
    // The body is optional; an empty one means default options.
    let req: ShutdownRequest = if body.is_empty() {
        ShutdownRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                return err(
                    StatusCode::BAD_REQUEST,
                    ApiError::new(ErrorKind::ValidationError, e.to_string()),
                )
            }
        }
    };
    if !state.executor.is_idle() && !req.force {
        return err(
            StatusCode::CONFLICT,
            ApiError::new(ErrorKind::AgentBusy, "task in flight; use force"),
        );
    }
    if req.force {
        state.executor.cancel_current();
    }

    tracing::info!(force = req.force, "shutdown requested");
    let shutdown = state.shutdown.clone();
    let grace = Duration::from_secs(req.timeout_seconds.min(300));
    let executor = state.executor.clone();
    tokio::spawn(async move {
        // Give the in-flight cancellation a moment to settle, bounded
        // by the requested grace period.
        let waited = tokio::time::timeout(grace, async {
            while !executor.is_idle() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        if waited.is_err() {
            tracing::warn!("shutdown grace period expired with task in flight");
        }
        shutdown.cancel();
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"state": "shutting_down"})),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Response {
    match state
        .executor
        .history()
        .list(query.page.unwrap_or(0), query.limit.unwrap_or(0))
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::SessionError, e.to_string()),
        ),
    }
}

async fn get_history_entry(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.executor.history().get(&id) {
        Ok(entry) => Json(entry).into_response(),
        Err(HistoryError::NotFound(_)) => err(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorKind::NotFound, format!("unknown task: {id}")),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::SessionError, e.to_string()),
        ),
    }
}

async fn get_history_debug(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.executor.history().get_debug_log(&id) {
        Ok(bytes) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(HistoryError::NotFound(_)) => err(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorKind::NotFound, format!("no debug log for: {id}")),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::SessionError, e.to_string()),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default)]
    limit: Option<usize>,
}

async fn get_logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> Response {
    Json(state.ring.tail(query.limit.unwrap_or(200))).into_response()
}

async fn get_log_stats(State(state): State<AppState>) -> Response {
    Json(state.ring.stats()).into_response()
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
