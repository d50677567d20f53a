use super::{QueueId, TaskId};

#[test]
fn generated_ids_carry_prefix() {
    let id = TaskId::generate();
    assert!(id.as_str().starts_with("tsk-"));
    let id = QueueId::generate();
    assert!(id.as_str().starts_with("que-"));
}

#[test]
fn generated_ids_are_unique() {
    let a = TaskId::generate();
    let b = TaskId::generate();
    assert_ne!(a, b);
}

#[test]
fn from_string_round_trips() {
    let id = TaskId::from_string("tsk-abc123");
    assert_eq!(id.as_str(), "tsk-abc123");
    assert_eq!(id, "tsk-abc123");
}

#[test]
fn serde_is_transparent() {
    let id = QueueId::from_string("que-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"que-xyz\"");
    let back: QueueId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
