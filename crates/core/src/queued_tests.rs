use super::QueueState;

#[yare::parameterized(
    pending_to_dispatching   = { QueueState::Pending,     QueueState::Dispatching, true  },
    dispatching_to_working   = { QueueState::Dispatching, QueueState::Working,     true  },
    dispatching_back_pending = { QueueState::Dispatching, QueueState::Pending,     true  },
    working_to_completed     = { QueueState::Working,     QueueState::Completed,   true  },
    working_to_failed        = { QueueState::Working,     QueueState::Failed,      true  },
    pending_cancel           = { QueueState::Pending,     QueueState::Cancelled,   true  },
    dispatching_cancel       = { QueueState::Dispatching, QueueState::Cancelled,   true  },
    working_cancel           = { QueueState::Working,     QueueState::Cancelled,   true  },
    pending_to_working       = { QueueState::Pending,     QueueState::Working,     false },
    pending_to_completed     = { QueueState::Pending,     QueueState::Completed,   false },
    working_back_pending     = { QueueState::Working,     QueueState::Pending,     false },
    completed_cancel         = { QueueState::Completed,   QueueState::Cancelled,   false },
    cancelled_to_working     = { QueueState::Cancelled,   QueueState::Working,     false },
    failed_to_pending        = { QueueState::Failed,      QueueState::Pending,     false },
)]
fn queue_state_edges(from: QueueState, to: QueueState, allowed: bool) {
    assert_eq!(from.can_transition_to(to), allowed);
}

#[test]
fn terminal_states() {
    assert!(QueueState::Completed.is_terminal());
    assert!(QueueState::Failed.is_terminal());
    assert!(QueueState::Cancelled.is_terminal());
    assert!(!QueueState::Pending.is_terminal());
    assert!(!QueueState::Dispatching.is_terminal());
    assert!(!QueueState::Working.is_terminal());
}

#[test]
fn queue_state_wire_names() {
    assert_eq!(
        serde_json::to_string(&QueueState::Dispatching).unwrap(),
        "\"dispatching\""
    );
}
