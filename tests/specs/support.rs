//! Shared rig: in-process agents and directors on ephemeral ports.

use agency_agent::test_support::{script_executor, ScriptRunner};
use agency_agent::{AppState as AgentAppState, RingLog};
use agency_director::{AppState as DirectorAppState, Director, DirectorConfig};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub struct TestAgent {
    pub url: String,
    pub port: u16,
    pub state: AgentAppState,
    _dir: TempDir,
}

/// Boot one agent over a scripted runner.
pub async fn boot_agent(runner: ScriptRunner) -> TestAgent {
    let dir = tempfile::tempdir().expect("tempdir");
    let state = AgentAppState {
        executor: script_executor(dir.path(), runner),
        ring: RingLog::new(256),
        shutdown: CancellationToken::new(),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind agent");
    let addr = listener.local_addr().expect("agent addr");
    let serve_state = state.clone();
    tokio::spawn(async move {
        let _ = agency_agent::serve(listener, serve_state).await;
    });
    TestAgent {
        url: format!("http://{addr}"),
        port: addr.port(),
        state,
        _dir: dir,
    }
}

pub struct TestDirector {
    pub external: String,
    pub internal: String,
    pub internal_port: u16,
    pub director: Arc<Director>,
}

/// Boot a director whose discovery watches exactly `agent_port`.
/// `internal_port` pins the internal surface (restart scenarios);
/// `None` picks an ephemeral port.
pub async fn boot_director(
    state_dir: &Path,
    agent_port: u16,
    internal_port: Option<u16>,
) -> TestDirector {
    let ext_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind external");
    let ext_addr = ext_listener.local_addr().expect("external addr");

    let int_listener = bind_retry(internal_port.unwrap_or(0)).await;
    let int_addr = int_listener.local_addr().expect("internal addr");

    let mut config = DirectorConfig::new(
        ext_addr.port(),
        int_addr.port(),
        state_dir.to_path_buf(),
    );
    config.discovery.port_range = agent_port..=agent_port;
    config.discovery.interval = Duration::from_millis(150);
    config.discovery.probe_timeout = Duration::from_millis(500);

    let director = Arc::new(Director::new(config).expect("director"));
    director.start();

    let state = DirectorAppState {
        director: director.clone(),
    };
    let ext_state = state.clone();
    tokio::spawn(async move {
        let _ = agency_director::serve_external(ext_listener, ext_state).await;
    });
    let int_state = state.clone();
    tokio::spawn(async move {
        let _ = agency_director::serve_internal(int_listener, int_state).await;
    });

    TestDirector {
        external: format!("http://{ext_addr}"),
        internal: format!("http://{int_addr}"),
        internal_port: int_addr.port(),
        director,
    }
}

/// Bind a port, retrying briefly — restarts reuse the previous
/// director's internal port moments after it closed.
async fn bind_retry(port: u16) -> tokio::net::TcpListener {
    for _ in 0..50 {
        match tokio::net::TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => return listener,
            Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    panic!("could not bind 127.0.0.1:{port}");
}

/// Poll `url` until `pred` approves the JSON body.
pub async fn wait_for_json(
    url: &str,
    timeout: Duration,
    pred: impl Fn(&Value) -> bool,
) -> Value {
    let client = reqwest::Client::new();
    let deadline = tokio::time::Instant::now() + timeout;
    let mut last: Option<Value> = None;
    while tokio::time::Instant::now() < deadline {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                if let Ok(body) = resp.json::<Value>().await {
                    if pred(&body) {
                        return body;
                    }
                    last = Some(body);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out polling {url}; last body: {last:?}");
}

/// Submit a task through the director's external surface.
pub async fn submit_task(external: &str, body: Value) -> Value {
    let resp = reqwest::Client::new()
        .post(format!("{external}/api/task"))
        .json(&body)
        .send()
        .await
        .expect("submit");
    assert_eq!(resp.status(), 201, "submission should be accepted");
    resp.json().await.expect("submit body")
}
