//! Director HTTP surfaces.
//!
//! External: token-authenticated routes for users and CLIs (`/status`
//! stays public). Internal: unauthenticated routes for trusted
//! loopback components — the scheduler's queue submissions and agent
//! completion callbacks. The internal listener must only ever be bound
//! to loopback.

use agency_core::{ApiError, CallbackPayload, ErrorKind, QueueAccepted, SubmitRequest};
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::director::Director;
use crate::queue::QueueError;

/// Shared state behind both surfaces.
#[derive(Clone)]
pub struct AppState {
    pub director: Arc<Director>,
}

fn err(status: StatusCode, body: ApiError) -> Response {
    (status, Json(body)).into_response()
}

/// External router: `/status` public, `/api/*` behind the token.
pub fn external_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/agents", get(get_agents))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/task", post(post_task))
        .route("/api/task/{id}", get(get_task))
        .route("/api/queue/{id}/cancel", post(post_queue_cancel))
        .route("/api/sessions", get(get_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/status", get(get_status))
        .merge(protected)
        .with_state(state)
}

/// Internal router: loopback-trusted.
pub fn internal_router(state: AppState) -> Router {
    Router::new()
        .route("/api/queue/task", post(post_task))
        .route("/api/callback/{queue_id}", post(post_callback))
        .route("/shutdown", post(post_shutdown))
        .with_state(state)
}

pub async fn serve_external(listener: TcpListener, state: AppState) -> io::Result<()> {
    let shutdown = state.director.shutdown.clone();
    axum::serve(listener, external_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

pub async fn serve_internal(listener: TcpListener, state: AppState) -> io::Result<()> {
    let shutdown = state.director.shutdown.clone();
    axum::serve(listener, internal_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Token check for the external `/api/*` routes. An empty configured
/// token disables auth (development mode).
async fn require_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let expected = &state.director.config.token;
    if !expected.is_empty() {
        let header_token = request
            .headers()
            .get("x-agency-token")
            .and_then(|v| v.to_str().ok());
        let presented = header_token.or(query.token.as_deref());
        if presented != Some(expected.as_str()) {
            return err(
                StatusCode::UNAUTHORIZED,
                ApiError::new(ErrorKind::ValidationError, "missing or invalid token"),
            );
        }
    }
    next.run(request).await
}

async fn get_status(State(state): State<AppState>) -> Response {
    Json(serde_json::json!({
        "service": "agency-director",
        "version": env!("CARGO_PKG_VERSION"),
        "queue": {
            "size": state.director.queue.len(),
            "capacity": state.director.queue.capacity(),
        },
        "agents": state.director.discovery.agents().len(),
    }))
    .into_response()
}

async fn get_agents(State(state): State<AppState>) -> Response {
    Json(state.director.discovery.agents()).into_response()
}

async fn get_dashboard(State(state): State<AppState>) -> Response {
    // Dashboard refresh doubles as the reconciliation point: agent
    // histories are folded in so restarts converge here.
    state.director.reconcile_sessions().await;
    Json(serde_json::json!({
        "sessions": state.director.sessions.list(),
        "agents": state.director.discovery.agents(),
        "queue": {
            "tasks": state.director.queue.snapshot(),
            "capacity": state.director.queue.capacity(),
        },
    }))
    .into_response()
}

async fn post_task(State(state): State<AppState>, Json(req): Json<SubmitRequest>) -> Response {
    let valid = match req.validate(state.director.config.default_timeout) {
        Ok(valid) => valid,
        Err(e) => {
            return err(
                StatusCode::BAD_REQUEST,
                ApiError::new(ErrorKind::ValidationError, e.to_string()),
            )
        }
    };

    match state.director.enqueue(valid) {
        Ok(queue_id) => {
            (StatusCode::CREATED, Json(QueueAccepted { queue_id })).into_response()
        }
        Err(QueueError::Full { capacity }) => err(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::new(
                ErrorKind::QueueFull,
                format!("queue full (capacity {capacity})"),
            ),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::ValidationError, e.to_string()),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct TaskQuery {
    #[serde(default)]
    agent_url: Option<String>,
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Response {
    // Queue ids resolve locally; agent task ids proxy through.
    if let Some(task) = state.director.queue.get(&id) {
        return Json(task).into_response();
    }
    if let Some(agent_url) = query.agent_url.as_deref() {
        if let Some(body) = state.director.proxy_task(&id, agent_url).await {
            return Json(body).into_response();
        }
    }
    err(
        StatusCode::NOT_FOUND,
        ApiError::new(ErrorKind::NotFound, format!("unknown task: {id}")),
    )
}

async fn post_queue_cancel(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.director.dispatcher.cancel(&id).await {
        Ok(()) => Json(serde_json::json!({
            "queue_id": id,
            "state": "cancelled",
        }))
        .into_response(),
        Err(crate::dispatcher::DispatchError::NotFound(_)) => err(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorKind::NotFound, format!("unknown queue task: {id}")),
        ),
        Err(e) => err(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorKind::ValidationError, e.to_string()),
        ),
    }
}

async fn get_sessions(State(state): State<AppState>) -> Response {
    Json(state.director.sessions.list()).into_response()
}

async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.director.sessions.get(&id) {
        Some(session) => Json(session).into_response(),
        None => err(
            StatusCode::NOT_FOUND,
            ApiError::new(ErrorKind::NotFound, format!("unknown session: {id}")),
        ),
    }
}

async fn post_callback(
    State(state): State<AppState>,
    Path(queue_id): Path<String>,
    Json(payload): Json<CallbackPayload>,
) -> Response {
    // Always 200, even for unknown queue ids: duplicates and late
    // deliveries are expected after cancels and restarts.
    state
        .director
        .dispatcher
        .handle_callback(&queue_id, &payload)
        .await;
    state.director.pass_notify.notify_one();
    Json(serde_json::json!({"status": "ok"})).into_response()
}

async fn post_shutdown(State(state): State<AppState>) -> Response {
    tracing::info!("shutdown requested");
    let shutdown = state.director.shutdown.clone();
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
