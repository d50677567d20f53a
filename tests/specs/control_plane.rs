//! Director + agent end-to-end: dispatch, callbacks, cancel, restart.

use crate::support::{boot_agent, boot_director, submit_task, wait_for_json};
use agency_agent::test_support::ScriptRunner;
use serde_json::json;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_completes_within_deadline() {
    let agent = boot_agent(ScriptRunner::success("hi there")).await;
    let dir = tempfile::tempdir().unwrap();
    let director = boot_director(dir.path(), agent.port, None).await;

    let accepted = submit_task(&director.external, json!({"prompt": "say hi"})).await;
    let queue_id = accepted["queue_id"].as_str().unwrap().to_string();

    // Discovered, dispatched, executed, called back, completed.
    let done = wait_for_json(
        &format!("{}/api/task/{queue_id}", director.external),
        Duration::from_secs(10),
        |body| body["state"] == "completed",
    )
    .await;
    assert!(!done["task_id"].as_str().unwrap().is_empty());

    // The session store saw the whole lifecycle.
    let sessions = wait_for_json(
        &format!("{}/api/sessions", director.external),
        Duration::from_secs(2),
        |body| body.as_array().is_some_and(|s| !s.is_empty()),
    )
    .await;
    assert_eq!(sessions[0]["tasks"][0]["state"], "completed");
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_wins_over_belated_callback() {
    let agent = boot_agent(ScriptRunner::sleeper(60)).await;
    let dir = tempfile::tempdir().unwrap();
    let director = boot_director(dir.path(), agent.port, None).await;

    let accepted = submit_task(&director.external, json!({"prompt": "long haul"})).await;
    let queue_id = accepted["queue_id"].as_str().unwrap().to_string();
    let task_url = format!("{}/api/task/{queue_id}", director.external);

    wait_for_json(&task_url, Duration::from_secs(5), |body| {
        body["state"] == "working"
    })
    .await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/queue/{queue_id}/cancel", director.external))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    wait_for_json(&task_url, Duration::from_secs(2), |body| {
        body["state"] == "cancelled"
    })
    .await;

    // A belated completion callback is answered 200 and changes nothing.
    let resp = reqwest::Client::new()
        .post(format!("{}/api/callback/{queue_id}", director.internal))
        .json(&json!({
            "task_id": "tsk-late",
            "state": "completed",
            "completed_at": chrono::Utc::now().to_rfc3339(),
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body = wait_for_json(&task_url, Duration::from_secs(2), |_| true).await;
    assert_eq!(body["state"], "cancelled");
}

/// Stops after `error_max_turns` twice, then succeeds; the counter
/// file lives in the session workdir.
const MAX_TURNS_SCRIPT: &str = r#"
n=$(cat turns 2>/dev/null | wc -l)
echo x >> turns
if [ "$n" -ge 2 ]; then
  printf '{"type":"result","subtype":"success","session_id":"ses-resumed","result":"made it"}\n'
else
  printf '{"type":"result","subtype":"error_max_turns","session_id":"ses-resumed"}\n'
fi
"#;

#[tokio::test(flavor = "multi_thread")]
async fn max_turns_auto_resume_completes_with_two_resumes() {
    let agent = boot_agent(ScriptRunner::new(MAX_TURNS_SCRIPT)).await;
    let dir = tempfile::tempdir().unwrap();
    let director = boot_director(dir.path(), agent.port, None).await;

    let accepted = submit_task(&director.external, json!({"prompt": "long plan"})).await;
    let queue_id = accepted["queue_id"].as_str().unwrap().to_string();

    let done = wait_for_json(
        &format!("{}/api/task/{queue_id}", director.external),
        Duration::from_secs(10),
        |body| body["state"] == "completed",
    )
    .await;

    // The agent surfaces one task with both auto-resumes recorded.
    let task_id = done["task_id"].as_str().unwrap();
    let task = wait_for_json(
        &format!("{}/task/{task_id}", agent.url),
        Duration::from_secs(2),
        |_| true,
    )
    .await;
    assert_eq!(task["max_turns_resumes"], 2);
    assert_eq!(task["output"], "made it");
}

#[tokio::test(flavor = "multi_thread")]
async fn max_turns_limit_exhaustion_fails_with_max_turns() {
    let agent = boot_agent(ScriptRunner::new(
        r#"printf '{"type":"result","subtype":"error_max_turns"}\n'"#,
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let director = boot_director(dir.path(), agent.port, None).await;

    let accepted = submit_task(&director.external, json!({"prompt": "hopeless"})).await;
    let queue_id = accepted["queue_id"].as_str().unwrap().to_string();

    let done = wait_for_json(
        &format!("{}/api/task/{queue_id}", director.external),
        Duration::from_secs(10),
        |body| body["state"] == "failed",
    )
    .await;

    let task_id = done["task_id"].as_str().unwrap();
    let task = wait_for_json(
        &format!("{}/task/{task_id}", agent.url),
        Duration::from_secs(2),
        |_| true,
    )
    .await;
    assert_eq!(task["error"]["type"], "max_turns");
}

#[tokio::test(flavor = "multi_thread")]
async fn director_restart_recovers_orphaned_task() {
    // Slow enough to survive a director restart, then succeeds.
    let agent = boot_agent(ScriptRunner::new(
        r#"sleep 3
printf '{"type":"result","subtype":"success","session_id":"ses-orphan","result":"survived"}\n'
"#,
    ))
    .await;
    let dir = tempfile::tempdir().unwrap();

    // First life: dispatch, then stop while the agent is executing.
    let first = boot_director(dir.path(), agent.port, None).await;
    let internal_port = first.internal_port;
    let accepted = submit_task(&first.external, json!({"prompt": "outlive me"})).await;
    let queue_id = accepted["queue_id"].as_str().unwrap().to_string();

    wait_for_json(
        &format!("{}/api/task/{queue_id}", first.external),
        Duration::from_secs(5),
        |body| body["state"] == "working",
    )
    .await;
    first.director.shutdown.cancel();
    drop(first);

    // Second life on the same state dir and the same internal port, so
    // the agent's pending callback lands here.
    let second = boot_director(dir.path(), agent.port, Some(internal_port)).await;

    // The orphan is visible as working on the dashboard.
    let dashboard = wait_for_json(
        &format!("{}/api/dashboard", second.external),
        Duration::from_secs(3),
        |_| true,
    )
    .await;
    let queued = dashboard["queue"]["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["id"] == queue_id.as_str())
        .expect("orphan in dashboard");
    assert_eq!(queued["state"], "working");

    // The agent finishes; its callback completes the orphan.
    wait_for_json(
        &format!("{}/api/task/{queue_id}", second.external),
        Duration::from_secs(15),
        |body| body["state"] == "completed",
    )
    .await;
}
