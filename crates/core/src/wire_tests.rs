use super::{ShutdownRequest, SubmitRequest};
use crate::task::{AgentKind, TaskSource, Tier};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(900);

fn base() -> SubmitRequest {
    SubmitRequest {
        prompt: "say hi".to_string(),
        ..SubmitRequest::default()
    }
}

#[test]
fn minimal_request_gets_defaults() {
    let valid = base().validate(DEFAULT_TIMEOUT).unwrap();
    assert_eq!(valid.tier, Tier::Standard);
    assert_eq!(valid.agent_kind, AgentKind::Claude);
    assert_eq!(valid.source, TaskSource::Web);
    assert_eq!(valid.timeout, DEFAULT_TIMEOUT);
    assert!(valid.session_id.is_none());
}

#[yare::parameterized(
    empty      = { "" },
    whitespace = { "   \n\t" },
)]
fn empty_prompt_rejected(prompt: &str) {
    let req = SubmitRequest {
        prompt: prompt.to_string(),
        ..SubmitRequest::default()
    };
    let err = req.validate(DEFAULT_TIMEOUT).unwrap_err();
    assert!(err.0.contains("prompt is required"), "{err}");
}

#[test]
fn unknown_tier_rejected() {
    let req = SubmitRequest {
        tier: Some("turbo".to_string()),
        ..base()
    };
    let err = req.validate(DEFAULT_TIMEOUT).unwrap_err();
    assert!(err.0.contains("invalid tier"), "{err}");
}

#[test]
fn unsafe_session_id_rejected() {
    let req = SubmitRequest {
        session_id: Some("../escape".to_string()),
        ..base()
    };
    let err = req.validate(DEFAULT_TIMEOUT).unwrap_err();
    assert!(err.0.contains("invalid session_id"), "{err}");
}

#[test]
fn explicit_fields_override_defaults() {
    let req = SubmitRequest {
        tier: Some("heavy".to_string()),
        agent_kind: Some("codex".to_string()),
        source: Some("scheduler".to_string()),
        timeout_seconds: Some(60),
        session_id: Some("ses-abc".to_string()),
        ..base()
    };
    let valid = req.validate(DEFAULT_TIMEOUT).unwrap();
    assert_eq!(valid.tier, Tier::Heavy);
    assert_eq!(valid.agent_kind, AgentKind::Codex);
    assert_eq!(valid.source, TaskSource::Scheduler);
    assert_eq!(valid.timeout, Duration::from_secs(60));
    assert_eq!(valid.session_id.unwrap().as_str(), "ses-abc");
}

#[test]
fn zero_timeout_rejected() {
    let req = SubmitRequest {
        timeout_seconds: Some(0),
        ..base()
    };
    assert!(req.validate(DEFAULT_TIMEOUT).is_err());
}

#[test]
fn missing_prompt_field_deserializes_then_fails_validation() {
    // The route handler relies on this: an absent prompt must reach
    // validation rather than die in serde, so the 400 carries the
    // documented message.
    let req: SubmitRequest = serde_json::from_str("{}").unwrap();
    let err = req.validate(DEFAULT_TIMEOUT).unwrap_err();
    assert!(err.0.contains("prompt is required"));
}

#[test]
fn shutdown_defaults() {
    let req: ShutdownRequest = serde_json::from_str("{}").unwrap();
    assert!(!req.force);
    assert_eq!(req.timeout_seconds, 30);
}
