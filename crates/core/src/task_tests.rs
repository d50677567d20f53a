use super::{ErrorKind, TaskState, Tier};
use std::str::FromStr;

#[yare::parameterized(
    queued_to_working      = { TaskState::Queued,    TaskState::Working,   true  },
    working_to_completed   = { TaskState::Working,   TaskState::Completed, true  },
    working_to_failed      = { TaskState::Working,   TaskState::Failed,    true  },
    working_to_cancelled   = { TaskState::Working,   TaskState::Cancelled, true  },
    queued_to_completed    = { TaskState::Queued,    TaskState::Completed, false },
    completed_to_working   = { TaskState::Completed, TaskState::Working,   false },
    failed_to_cancelled    = { TaskState::Failed,    TaskState::Cancelled, false },
    cancelled_to_completed = { TaskState::Cancelled, TaskState::Completed, false },
    working_to_queued      = { TaskState::Working,   TaskState::Queued,    false },
)]
fn task_state_edges(from: TaskState, to: TaskState, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_states() {
    assert!(!TaskState::Queued.is_terminal());
    assert!(!TaskState::Working.is_terminal());
    assert!(TaskState::Completed.is_terminal());
    assert!(TaskState::Failed.is_terminal());
    assert!(TaskState::Cancelled.is_terminal());
}

#[test]
fn tier_priority_ordering() {
    assert!(Tier::Heavy.priority() > Tier::Standard.priority());
    assert!(Tier::Standard.priority() > Tier::Fast.priority());
}

#[yare::parameterized(
    fast     = { "fast",     Tier::Fast     },
    standard = { "standard", Tier::Standard },
    heavy    = { "heavy",    Tier::Heavy    },
)]
fn tier_from_str(input: &str, expected: Tier) {
    assert_eq!(Tier::from_str(input).unwrap(), expected);
}

#[test]
fn tier_from_str_rejects_unknown() {
    let err = Tier::from_str("turbo").unwrap_err();
    assert!(err.contains("invalid tier"), "{err}");
}

#[test]
fn error_kind_wire_names() {
    assert_eq!(ErrorKind::ValidationError.to_string(), "validation_error");
    assert_eq!(ErrorKind::QueueFull.to_string(), "queue_full");
    assert_eq!(ErrorKind::MaxTurns.to_string(), "max_turns");
    // Display and serde must agree; the wire contract is the serde name.
    let json = serde_json::to_string(&ErrorKind::AgentBusy).unwrap();
    assert_eq!(json, "\"agent_busy\"");
}

#[test]
fn task_error_serializes_type_field() {
    let err = super::TaskError::new(ErrorKind::Timeout, "deadline exceeded");
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["type"], "timeout");
    assert_eq!(json["message"], "deadline exceeded");
}

#[test]
fn task_state_wire_names() {
    let json = serde_json::to_string(&TaskState::Working).unwrap();
    assert_eq!(json, "\"working\"");
    let back: TaskState = serde_json::from_str("\"cancelled\"").unwrap();
    assert_eq!(back, TaskState::Cancelled);
}
