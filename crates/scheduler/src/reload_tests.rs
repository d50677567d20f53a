use super::spawn_watcher;
use crate::config::SchedulerConfig;
use crate::scheduler::Scheduler;
use crate::test_support::FakeSubmitter;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const INITIAL: &str = r#"
agent_url = "http://127.0.0.1:8700"
[[jobs]]
name = "alpha"
schedule = "0 1 * * *"
prompt = "first"
"#;

const UPDATED: &str = r#"
agent_url = "http://127.0.0.1:8700"
[[jobs]]
name = "alpha"
schedule = "0 2 * * *"
prompt = "second"
[[jobs]]
name = "beta"
schedule = "0 3 * * *"
prompt = "third"
"#;

async fn wait_for_jobs(scheduler: &Scheduler, count: usize) {
    for _ in 0..300 {
        if scheduler.snapshots().len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("never saw {count} jobs");
}

#[tokio::test]
async fn watcher_applies_valid_rewrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agency-sched.toml");
    std::fs::write(&path, INITIAL).unwrap();

    let scheduler = Scheduler::new(
        SchedulerConfig::load(&path).unwrap(),
        Arc::new(FakeSubmitter::new()),
    );
    let token = CancellationToken::new();
    spawn_watcher(
        scheduler.clone(),
        path.clone(),
        Duration::from_millis(50),
        token.clone(),
    );

    // Rewrite with a new mtime.
    tokio::time::sleep(Duration::from_millis(20)).await;
    std::fs::write(&path, UPDATED).unwrap();
    filetime_touch(&path);

    wait_for_jobs(&scheduler, 2).await;
    let snaps = scheduler.snapshots();
    assert!(snaps.iter().any(|j| j.name == "beta"));
    assert_eq!(
        snaps.iter().find(|j| j.name == "alpha").unwrap().schedule,
        "0 2 * * *"
    );

    token.cancel();
}

#[tokio::test]
async fn watcher_keeps_config_on_invalid_rewrite() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agency-sched.toml");
    std::fs::write(&path, INITIAL).unwrap();

    let scheduler = Scheduler::new(
        SchedulerConfig::load(&path).unwrap(),
        Arc::new(FakeSubmitter::new()),
    );
    let token = CancellationToken::new();
    spawn_watcher(
        scheduler.clone(),
        path.clone(),
        Duration::from_millis(50),
        token.clone(),
    );

    tokio::time::sleep(Duration::from_millis(20)).await;
    std::fs::write(&path, "port = not-a-number").unwrap();
    filetime_touch(&path);

    // Give the watcher time to notice and reject.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let snaps = scheduler.snapshots();
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].name, "alpha");

    token.cancel();
}

/// Bump mtime into the future so coarse filesystem timestamps cannot
/// hide a rapid rewrite.
fn filetime_touch(path: &std::path::Path) {
    let future = std::time::SystemTime::now() + Duration::from_secs(2);
    let file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    file.set_modified(future).unwrap();
}
