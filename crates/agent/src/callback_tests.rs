use super::deliver_callback;
use agency_core::{CallbackPayload, TaskId, TaskState};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn payload() -> CallbackPayload {
    CallbackPayload {
        task_id: TaskId::from_string("tsk-cb"),
        state: TaskState::Completed,
        exit_code: Some(0),
        error: None,
        completed_at: Utc::now(),
    }
}

/// Serve a handler returning the nth status from `statuses` per call.
async fn serve_statuses(statuses: &'static [u16]) -> (String, Arc<AtomicU32>) {
    let hits = Arc::new(AtomicU32::new(0));
    let hits_clone = hits.clone();
    let app = Router::new().route(
        "/cb",
        post(move || {
            let hits = hits_clone.clone();
            async move {
                let n = hits.fetch_add(1, Ordering::SeqCst) as usize;
                let code = statuses.get(n).copied().unwrap_or(200);
                StatusCode::from_u16(code).unwrap_or(StatusCode::OK)
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/cb"), hits)
}

#[tokio::test]
async fn first_attempt_success() {
    let (url, hits) = serve_statuses(&[200]).await;
    assert!(deliver_callback(&url, &payload()).await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_on_5xx_then_succeeds() {
    let (url, hits) = serve_statuses(&[500, 503, 200]).await;
    assert!(deliver_callback(&url, &payload()).await);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stops_on_4xx() {
    let (url, hits) = serve_statuses(&[404]).await;
    assert!(!deliver_callback(&url, &payload()).await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausts_retries_on_persistent_5xx() {
    // One initial attempt plus a retry per backoff entry, then give up.
    let (url, hits) = serve_statuses(&[500, 500, 500, 500, 500]).await;
    assert!(!deliver_callback(&url, &payload()).await);
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn network_error_retries_and_fails() {
    // Nothing listens on this port.
    let url = "http://127.0.0.1:9/cb";
    assert!(!deliver_callback(url, &payload()).await);
}
