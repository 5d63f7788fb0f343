use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::cancellation::{CancellationToken, StageContext};

/// Terminal and transient states a task moves through.
///
/// `None` is never written by the runner; it exists so a freshly constructed
/// task (not yet admitted) has a well-defined default state to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TaskState {
    #[default]
    None = 0,
    Unissued = 1,
    InProgress = 2,
    Finished = 3,
    Failed = 4,
    Abandoned = 5,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Unissued,
            2 => Self::InProgress,
            3 => Self::Finished,
            4 => Self::Failed,
            5 => Self::Abandoned,
            _ => Self::None,
        }
    }
}

/// An atomic cell holding a [`TaskState`].
///
/// A plain `AtomicU8` is enough here — the state has no payload and is only
/// ever read by the runner's owner and by external status readers after the
/// completion barrier, so there is no need for a mutex. The same reasoning
/// the design notes give for the admission counter.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(initial: TaskState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// The error a stage returns.
///
/// `NoSuchKey` is the one sentinel the runner distinguishes: it marks a task
/// permanently `Failed` rather than retriable `Unissued`. Everything else —
/// I/O errors, native-builder failures, whatever — rolls up into `Other` and
/// is treated as transient.
#[derive(Debug, Error)]
pub enum StageError {
    /// Required input data is permanently unavailable.
    #[error("no such key: {0}")]
    NoSuchKey(String),

    /// Any other stage failure; the control plane may retry the task.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::NoSuchKey(key.into())
    }

    pub fn is_no_such_key(&self) -> bool {
        matches!(self, Self::NoSuchKey(_))
    }
}

/// A schedulable unit: one index-build request and its four lifecycle stages.
///
/// Implementors own their data; the runner never reaches past this trait's
/// method set (mirrors the teacher's `Stage` enum, which the orchestrator
/// drives purely through `Stage::name`/`CpuStage::run`/`GpuStage::run`
/// without inspecting what a stage closure captured).
///
/// Stage methods run strictly in order — `prepare`, `load_data`,
/// `build_index`, `save_index_files` — and a stage is only entered if the
/// previous one succeeded and `ctx` was not cancelled. Each stage method is
/// expected to return promptly once `ctx.is_cancelled()` becomes true; the
/// scheduler does not forcibly abort a running stage.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Stable, human-readable name used in logs and status reporting.
    fn name(&self) -> &str;

    /// This task's own cancellation token (independent of the scheduler's).
    fn cancellation(&self) -> CancellationToken;

    /// Admission hook, invoked exactly once, synchronously on the caller,
    /// immediately after a queue slot has been reserved for this task but
    /// before it becomes visible to the runner. An error here aborts
    /// admission entirely: the reserved slot is released and no stage runs.
    async fn on_enqueue(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn prepare(&self, ctx: &StageContext) -> Result<(), StageError>;
    async fn load_data(&self, ctx: &StageContext) -> Result<(), StageError>;
    async fn build_index(&self, ctx: &StageContext) -> Result<(), StageError>;
    async fn save_index_files(&self, ctx: &StageContext) -> Result<(), StageError>;

    /// Cleanup hook, invoked exactly once after the task has left the
    /// pipeline — on success, failure, or abandonment. Must not panic; a
    /// panicking `reset` can leave the task's terminal state or a worker
    /// loop in an inconsistent place (see `Scheduler::run_task`).
    async fn reset(&self);

    /// Write the task's terminal (or `InProgress`) state. Called by the
    /// runner only; written exactly once per admission with the final
    /// state.
    fn set_state(&self, state: TaskState);

    /// Read the task's current state.
    fn state(&self) -> TaskState;
}
