use tokio::sync::watch;

/// A cancellation signal, readable from many clones of the same [`CancellationToken`].
///
/// Built on a `tokio::sync::watch` channel the same way the teacher's runtime
/// layer signals task cancellation (`tokio::sync::watch::Sender<bool>` /
/// `Receiver<bool>` in `TaskRecord`/`GpuStage::run`), generalized into a
/// standalone pair so both the scheduler and individual tasks can own one.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

/// The write side of a [`CancellationToken`]; dropping it does not cancel —
/// call [`cancel`](Self::cancel) explicitly.
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

impl CancellationSource {
    /// Create a fresh, not-yet-cancelled token pair.
    pub fn new() -> (Self, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancellationToken { rx })
    }

    /// Signal cancellation. Idempotent; safe to call from any thread.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancellationToken {
    /// Non-blocking check of the current cancellation state.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until this token is cancelled. Resolves immediately if it
    /// already is.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Source dropped without ever cancelling: treat as "never cancelled",
        // so this future simply never resolves from here on.
        std::future::pending::<()>().await;
    }
}

/// The merged view of a task's own cancellation and the scheduler's root
/// cancellation, passed to every stage call.
///
/// Two independent cancellation sources feed every stage (§5 of the design):
/// the task's own context and the scheduler's child context. Rather than
/// spawning a watcher task to merge them into one channel, `StageContext`
/// checks/races both directly — no extra task, no extra allocation per
/// admitted task.
#[derive(Clone, Debug)]
pub struct StageContext {
    scheduler: CancellationToken,
    task: CancellationToken,
}

impl StageContext {
    pub(crate) fn new(scheduler: CancellationToken, task: CancellationToken) -> Self {
        Self { scheduler, task }
    }

    /// `true` if either the task's own context or the scheduler's root
    /// context has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.scheduler.is_cancelled() || self.task.is_cancelled()
    }

    /// Resolves as soon as either cancellation source fires.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.scheduler.cancelled() => {}
            _ = self.task.cancelled() => {}
        }
    }
}
