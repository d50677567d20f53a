use super::{QueueError, WorkQueue};
use agency_core::{AgentKind, QueueId, QueueState, QueuedTask, TaskId, TaskSource, Tier};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use std::collections::HashMap;
use tempfile::tempdir;

fn task(id: &str, tier: Tier, age_secs: i64) -> QueuedTask {
    QueuedTask {
        id: QueueId::from_string(id),
        prompt: format!("work {id}"),
        tier,
        timeout_seconds: 300,
        session_id: None,
        env: HashMap::new(),
        agent_kind: AgentKind::Claude,
        model: None,
        source: TaskSource::Web,
        source_job: None,
        state: QueueState::Pending,
        agent_url: None,
        task_id: None,
        enqueued_at: Utc::now() - Duration::seconds(age_secs),
        dispatched_at: None,
    }
}

#[test]
fn dispatch_order_is_priority_then_fifo() {
    let dir = tempdir().unwrap();
    let queue = WorkQueue::open(dir.path(), 10).unwrap();
    queue.enqueue(task("que-std-old", Tier::Standard, 30)).unwrap();
    queue.enqueue(task("que-fast", Tier::Fast, 60)).unwrap();
    queue.enqueue(task("que-heavy", Tier::Heavy, 5)).unwrap();
    queue.enqueue(task("que-std-new", Tier::Standard, 10)).unwrap();

    let next = queue.next_pending().unwrap();
    assert_eq!(next.id.as_str(), "que-heavy");
    queue.mark_dispatching(&next.id, "http://a").unwrap();

    let next = queue.next_pending().unwrap();
    assert_eq!(next.id.as_str(), "que-std-old");
    queue.mark_dispatching(&next.id, "http://a").unwrap();

    let next = queue.next_pending().unwrap();
    assert_eq!(next.id.as_str(), "que-std-new");
}

#[test]
fn admission_control_rejects_when_full() {
    let dir = tempdir().unwrap();
    let queue = WorkQueue::open(dir.path(), 2).unwrap();
    queue.enqueue(task("que-1", Tier::Standard, 0)).unwrap();
    queue.enqueue(task("que-2", Tier::Standard, 0)).unwrap();

    let err = queue.enqueue(task("que-3", Tier::Standard, 0)).unwrap_err();
    assert!(matches!(err, QueueError::Full { capacity: 2 }));

    // Removing one frees a slot.
    let id = QueueId::from_string("que-1");
    queue.remove(&id, QueueState::Cancelled).unwrap();
    queue.enqueue(task("que-3", Tier::Standard, 0)).unwrap();
}

#[test]
fn dispatch_lifecycle_and_requeue() {
    let dir = tempdir().unwrap();
    let queue = WorkQueue::open(dir.path(), 10).unwrap();
    queue.enqueue(task("que-1", Tier::Standard, 0)).unwrap();
    let id = QueueId::from_string("que-1");

    let dispatched = queue.mark_dispatching(&id, "http://127.0.0.1:8700").unwrap();
    assert_eq!(dispatched.state, QueueState::Dispatching);
    assert!(dispatched.dispatched_at.is_some());

    // Retryable failure goes back to pending with agent fields cleared.
    queue.requeue(&id).unwrap();
    let back = queue.get("que-1").unwrap();
    assert_eq!(back.state, QueueState::Pending);
    assert!(back.agent_url.is_none());
    assert!(back.dispatched_at.is_none());

    // Second round reaches working.
    queue.mark_dispatching(&id, "http://127.0.0.1:8700").unwrap();
    let working = queue
        .mark_working(&id, &TaskId::from_string("tsk-9"), None)
        .unwrap();
    assert_eq!(working.state, QueueState::Working);
    assert_eq!(working.task_id.as_ref().unwrap().as_str(), "tsk-9");

    // Working tasks cannot be re-dispatched.
    assert!(matches!(
        queue.mark_dispatching(&id, "http://other"),
        Err(QueueError::InvalidTransition { .. })
    ));
}

#[test]
fn remove_deletes_file_and_entry() {
    let dir = tempdir().unwrap();
    let queue = WorkQueue::open(dir.path(), 10).unwrap();
    queue.enqueue(task("que-1", Tier::Standard, 0)).unwrap();
    let id = QueueId::from_string("que-1");
    assert!(dir.path().join("que-1.json").exists());

    let removed = queue.remove(&id, QueueState::Cancelled).unwrap();
    assert_eq!(removed.state, QueueState::Cancelled);
    assert!(!dir.path().join("que-1.json").exists());
    // Gone from the active queue, still answerable for status queries.
    assert_eq!(queue.len(), 0);
    assert_eq!(queue.get("que-1").unwrap().state, QueueState::Cancelled);

    assert!(matches!(
        queue.remove(&id, QueueState::Cancelled),
        Err(QueueError::NotFound(_))
    ));
}

#[test]
fn restart_preserves_dispatched_orphans() {
    let dir = tempdir().unwrap();
    {
        let queue = WorkQueue::open(dir.path(), 10).unwrap();
        queue.enqueue(task("que-p", Tier::Standard, 0)).unwrap();
        queue.enqueue(task("que-d", Tier::Standard, 0)).unwrap();
        queue.enqueue(task("que-w", Tier::Standard, 0)).unwrap();
        queue
            .mark_dispatching(&QueueId::from_string("que-d"), "http://a")
            .unwrap();
        queue
            .mark_dispatching(&QueueId::from_string("que-w"), "http://a")
            .unwrap();
        queue
            .mark_working(
                &QueueId::from_string("que-w"),
                &TaskId::from_string("tsk-1"),
                None,
            )
            .unwrap();
    }

    // Reopen: the pre- and post-restart dispatched sets must be equal.
    let queue = WorkQueue::open(dir.path(), 10).unwrap();
    assert_eq!(queue.len(), 3);
    let mut dispatched: Vec<_> = queue
        .dispatched()
        .into_iter()
        .map(|t| t.id.as_str().to_string())
        .collect();
    dispatched.sort();
    assert_eq!(dispatched, vec!["que-d", "que-w"]);
    assert_eq!(queue.get("que-p").unwrap().state, QueueState::Pending);
    assert_eq!(
        queue.get("que-w").unwrap().task_id.as_ref().unwrap().as_str(),
        "tsk-1"
    );
}

proptest! {
    /// next_pending always returns the highest-priority, oldest task.
    #[test]
    fn next_pending_is_maximal(specs in proptest::collection::vec((0u8..3, 0i64..1000), 1..20)) {
        let dir = tempdir().unwrap();
        let queue = WorkQueue::open(dir.path(), 100).unwrap();
        for (n, (tier_n, age)) in specs.iter().enumerate() {
            let tier = match tier_n { 0 => Tier::Fast, 1 => Tier::Standard, _ => Tier::Heavy };
            queue.enqueue(task(&format!("que-{n:03}"), tier, *age)).unwrap();
        }

        let next = queue.next_pending().unwrap();
        for other in queue.snapshot() {
            prop_assert!(
                next.tier.priority() > other.tier.priority()
                    || (next.tier.priority() == other.tier.priority()
                        && next.enqueued_at <= other.enqueued_at)
            );
        }
    }
}
