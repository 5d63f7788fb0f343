use thiserror::Error;

/// Errors returned synchronously to the caller of [`crate::Scheduler::enqueue`].
///
/// Mirrors the way the teacher wraps dispatch-time failures
/// (`RuntimeError::QueueFull`, `RuntimeError::OrchestratorQueueFull`,
/// `RuntimeError::BackendShutdown`) as a single `thiserror` enum rather than
/// a bespoke error per call site.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The admission timeout elapsed before a queue slot became available.
    #[error("queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The scheduler is `Closing` or `Closed`; no further tasks are accepted.
    #[error("scheduler is closed")]
    Closed,

    /// The task's `on_enqueue` hook returned an error; the task was never
    /// admitted (its reserved queue slot was released).
    #[error("on_enqueue rejected task: {0}")]
    OnEnqueueRejected(String),
}
