//! Scheduler end-to-end: fallback submission and hot reload.

use crate::support::boot_agent;
use agency_agent::test_support::ScriptRunner;
use agency_scheduler::reload::spawn_watcher;
use agency_scheduler::{HttpSubmitter, Scheduler, SchedulerConfig};
use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A director stand-in that answers 500 to everything.
async fn broken_director() -> String {
    let app = axum::Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn write_config(path: &std::path::Path, director_url: &str, agent_url: &str, jobs: &str) {
    std::fs::write(
        path,
        format!(
            r#"
director_url = "{director_url}"
agent_url = "{agent_url}"
{jobs}
"#
        ),
    )
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn director_failure_falls_back_to_direct_agent_submission() {
    let agent = boot_agent(ScriptRunner::success("cron output")).await;
    let director_url = broken_director().await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sched.toml");
    write_config(
        &config_path,
        &director_url,
        &agent.url,
        r#"
[[jobs]]
name = "fallback-job"
schedule = "0 0 1 1 *"
prompt = "run anyway"
"#,
    );

    let scheduler = Scheduler::new(
        SchedulerConfig::load(&config_path).unwrap(),
        Arc::new(HttpSubmitter::default()),
    );

    let snapshot = scheduler.trigger("fallback-job").await.unwrap();
    assert_eq!(snapshot.last_status.unwrap().to_string(), "submitted");
    assert!(snapshot.last_task_id.is_some());
    assert!(snapshot.last_queue_id.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn busy_agent_fallback_is_skipped_busy() {
    let agent = boot_agent(ScriptRunner::sleeper(60)).await;
    let director_url = broken_director().await;

    // Occupy the agent first.
    let resp = reqwest::Client::new()
        .post(format!("{}/task", agent.url))
        .json(&serde_json::json!({"prompt": "occupy"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sched.toml");
    write_config(
        &config_path,
        &director_url,
        &agent.url,
        r#"
[[jobs]]
name = "blocked-job"
schedule = "0 0 1 1 *"
prompt = "wait your turn"
"#,
    );

    let scheduler = Scheduler::new(
        SchedulerConfig::load(&config_path).unwrap(),
        Arc::new(HttpSubmitter::default()),
    );
    let snapshot = scheduler.trigger("blocked-job").await.unwrap();
    assert_eq!(snapshot.last_status.unwrap().to_string(), "skipped_busy");

    agent.state.executor.cancel_current();
}

#[tokio::test(flavor = "multi_thread")]
async fn hot_reload_preserves_job_state_and_adds_new_jobs() {
    let agent = boot_agent(ScriptRunner::success("ok")).await;
    let director_url = broken_director().await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("sched.toml");
    write_config(
        &config_path,
        &director_url,
        &agent.url,
        r#"
[[jobs]]
name = "alpha"
schedule = "0 1 * * *"
prompt = "first version"
"#,
    );

    let scheduler = Scheduler::new(
        SchedulerConfig::load(&config_path).unwrap(),
        Arc::new(HttpSubmitter::default()),
    );
    let token = CancellationToken::new();
    spawn_watcher(
        scheduler.clone(),
        config_path.clone(),
        Duration::from_millis(100),
        token.clone(),
    );

    // Give alpha a run history before the rewrite.
    let before = scheduler.trigger("alpha").await.unwrap();
    assert_eq!(before.last_status.unwrap().to_string(), "submitted");

    // Rewrite: alpha changes prompt/schedule, beta appears.
    write_config(
        &config_path,
        &director_url,
        &agent.url,
        r#"
[[jobs]]
name = "alpha"
schedule = "30 2 * * *"
prompt = "second version"

[[jobs]]
name = "beta"
schedule = "0 4 * * *"
prompt = "newcomer"
"#,
    );
    let file = std::fs::OpenOptions::new()
        .append(true)
        .open(&config_path)
        .unwrap();
    file.set_modified(std::time::SystemTime::now() + Duration::from_secs(2))
        .unwrap();

    // Within the reload interval both jobs appear.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if scheduler.snapshots().len() == 2 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "reload never applied"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let snaps = scheduler.snapshots();
    let alpha = snaps.iter().find(|j| j.name == "alpha").unwrap();
    assert_eq!(alpha.schedule, "30 2 * * *");
    assert_eq!(alpha.last_run, before.last_run);
    assert_eq!(
        alpha.last_status.unwrap().to_string(),
        "submitted",
        "runtime state survives reload"
    );
    let beta = snaps.iter().find(|j| j.name == "beta").unwrap();
    assert!(beta.next_run.is_some());

    token.cancel();
}
