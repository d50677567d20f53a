use super::{ConfigError, SchedulerConfig};
use agency_core::{AgentKind, Tier};
use std::time::Duration;

fn load(text: &str) -> Result<SchedulerConfig, ConfigError> {
    let raw = toml::from_str(text).map_err(ConfigError::from)?;
    SchedulerConfig::validate(raw)
}

const VALID: &str = r#"
port = 9100
director_url = "http://127.0.0.1:9001"
agent_url = "http://127.0.0.1:8700/"

[[jobs]]
name = "nightly-triage"
schedule = "0 3 * * *"
prompt = "triage the bug backlog"
tier = "heavy"
timeout_seconds = 1200

[[jobs]]
name = "hourly-digest"
schedule = "5 * * * *"
prompt = "summarize recent activity"
agent_kind = "codex"
"#;

#[test]
fn valid_config_loads() {
    let config = load(VALID).unwrap();
    assert_eq!(config.port, 9100);
    assert_eq!(config.director_url.as_deref(), Some("http://127.0.0.1:9001"));
    // Trailing slash trimmed.
    assert_eq!(config.agent_url, "http://127.0.0.1:8700");
    assert_eq!(config.jobs.len(), 2);

    let nightly = &config.jobs[0];
    assert_eq!(nightly.name, "nightly-triage");
    assert_eq!(nightly.tier, Tier::Heavy);
    assert_eq!(nightly.timeout, Duration::from_secs(1200));
    assert_eq!(nightly.agent_kind, AgentKind::Claude);

    let hourly = &config.jobs[1];
    assert_eq!(hourly.tier, Tier::Standard);
    assert_eq!(hourly.timeout, super::DEFAULT_JOB_TIMEOUT);
    assert_eq!(hourly.agent_kind, AgentKind::Codex);
}

#[test]
fn port_defaults_when_absent() {
    let config = load(
        r#"
agent_url = "http://127.0.0.1:8700"
[[jobs]]
name = "a"
schedule = "* * * * *"
prompt = "p"
"#,
    )
    .unwrap();
    assert_eq!(config.port, super::DEFAULT_PORT);
    assert!(config.director_url.is_none());
}

#[test]
fn missing_agent_url_rejected() {
    let err = load(
        r#"
[[jobs]]
name = "a"
schedule = "* * * * *"
prompt = "p"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::MissingAgentUrl));
}

#[test]
fn no_jobs_rejected() {
    let err = load(r#"agent_url = "http://a""#).unwrap_err();
    assert!(matches!(err, ConfigError::NoJobs));
}

#[test]
fn duplicate_names_rejected() {
    let err = load(
        r#"
agent_url = "http://a"
[[jobs]]
name = "twin"
schedule = "* * * * *"
prompt = "p"
[[jobs]]
name = "twin"
schedule = "* * * * *"
prompt = "p"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateJob(name) if name == "twin"));
}

#[test]
fn bad_schedule_rejected_with_job_name() {
    let err = load(
        r#"
agent_url = "http://a"
[[jobs]]
name = "broken"
schedule = "99 * * * *"
prompt = "p"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::BadSchedule { name, .. } if name == "broken"));
}

#[test]
fn empty_prompt_rejected() {
    let err = load(
        r#"
agent_url = "http://a"
[[jobs]]
name = "quiet"
schedule = "* * * * *"
prompt = "  "
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::EmptyPrompt { name } if name == "quiet"));
}

#[test]
fn bad_tier_rejected() {
    let err = load(
        r#"
agent_url = "http://a"
[[jobs]]
name = "a"
schedule = "* * * * *"
prompt = "p"
tier = "ludicrous"
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::BadField { .. }));
}
