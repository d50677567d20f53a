//! Opaque identifiers for tasks and queue entries.

crate::define_id! {
    /// Identifier an agent assigns when it accepts a task.
    ///
    /// Unique within an agent's lifetime; the director treats it as an
    /// opaque token for status queries and cancellation.
    pub struct TaskId("tsk-");
}

crate::define_id! {
    /// Identifier the director assigns when a task enters the work queue.
    ///
    /// Unique for the queue's lifetime; the completion callback route is
    /// keyed by this id.
    pub struct QueueId("que-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
