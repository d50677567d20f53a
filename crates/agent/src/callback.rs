//! Completion callback delivery: agent → director.
//!
//! Fire-and-forget with bounded retries. Delivery failure is logged
//! and never changes the task's outcome.

use agency_core::CallbackPayload;
use std::time::Duration;

/// Per-attempt request timeout.
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);
/// Backoff between attempts: one initial try plus one retry per entry.
const BACKOFF: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(200),
    Duration::from_millis(400),
];

/// POST the payload to `callback_url`, retrying on 5xx and transport
/// errors. A 2xx stops with success; a 4xx stops immediately (the
/// director answered, it just did not want this callback).
pub async fn deliver_callback(callback_url: &str, payload: &CallbackPayload) -> bool {
    let client = match reqwest::Client::builder().timeout(ATTEMPT_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            tracing::warn!(error = %err, "callback client construction failed");
            return false;
        }
    };

    for attempt in 0..=BACKOFF.len() {
        match client.post(callback_url).json(payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(
                    task_id = %payload.task_id,
                    url = callback_url,
                    attempt,
                    "callback delivered"
                );
                return true;
            }
            Ok(resp) if resp.status().is_client_error() => {
                tracing::warn!(
                    task_id = %payload.task_id,
                    url = callback_url,
                    status = %resp.status(),
                    "callback rejected, not retrying"
                );
                return false;
            }
            Ok(resp) => {
                tracing::debug!(
                    task_id = %payload.task_id,
                    status = %resp.status(),
                    attempt,
                    "callback attempt failed"
                );
            }
            Err(err) => {
                tracing::debug!(
                    task_id = %payload.task_id,
                    error = %err,
                    attempt,
                    "callback attempt failed"
                );
            }
        }
        if let Some(backoff) = BACKOFF.get(attempt) {
            tokio::time::sleep(*backoff).await;
        }
    }

    tracing::warn!(
        task_id = %payload.task_id,
        url = callback_url,
        "callback delivery exhausted retries"
    );
    false
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
