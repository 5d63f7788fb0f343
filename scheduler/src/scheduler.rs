use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cancellation::{CancellationSource, CancellationToken, StageContext};
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::task::{StageError, Task, TaskState};

type QueueItem = Arc<dyn Task>;

struct Inner {
    capacity: usize,
    admission_timeout: std::time::Duration,
    workers: usize,
    /// `None` once `close()` has dropped the sending half: this is how the
    /// queue tells its worker loops "no more items are coming".
    tx: Mutex<Option<mpsc::Sender<QueueItem>>>,
    rx: Mutex<Option<mpsc::Receiver<QueueItem>>>,
    closed: AtomicBool,
    start_guard: AtomicBool,
    close_guard: Mutex<bool>,
    root_source: CancellationSource,
    root_token: CancellationToken,
    worker_handles: Mutex<Option<Vec<JoinHandle<()>>>>,
}

/// The bounded task scheduler.
///
/// Owns the queue, a root cancellation context derived from the caller, and
/// the lifecycle latches described in the design (`Created -> Started ->
/// Closing -> Closed`). Cloning a `Scheduler` is cheap (it's a handle around
/// a shared `Inner`), the same way `Orchestrator` in the teacher's runtime
/// layer is a cheap `Clone` handle around `ResultStorage` + `ResourceManager`.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Construct a scheduler. Does not start consuming until [`Scheduler::start`]
    /// is called; `enqueue` works immediately (tasks simply buffer).
    pub fn new(config: SchedulerConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        let (root_source, root_token) = CancellationSource::new();
        Self {
            inner: Arc::new(Inner {
                capacity: config.capacity,
                admission_timeout: config.admission_timeout,
                workers: config.workers.max(1),
                tx: Mutex::new(Some(tx)),
                rx: Mutex::new(Some(rx)),
                closed: AtomicBool::new(false),
                start_guard: AtomicBool::new(false),
                close_guard: Mutex::new(false),
                root_source,
                root_token,
            }),
        }
    }

    /// Spawn the background stage-runner worker(s). Idempotent: a repeated
    /// call is a no-op. Must not be called after [`Scheduler::close`].
    pub fn start(&self) {
        if self.inner.start_guard.swap(true, Ordering::SeqCst) {
            return; // already started
        }
        self.spawn_workers();
    }

    /// Claims the receiver and spawns `workers` runner loops over it. Callers
    /// must have already won the `start_guard` compare-exchange; both
    /// `start()` and `close()` (for the not-yet-started case) go through
    /// this, so the receiver is taken exactly once no matter which one wins
    /// the race.
    fn spawn_workers(&self) {
        let rx = self
            .inner
            .rx
            .try_lock()
            .expect("spawn_workers races only with itself, guarded by start_guard")
            .take()
            .expect("receiver taken exactly once, guarded by start_guard");
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(self.inner.workers);
        for worker_id in 0..self.inner.workers {
            let rx = Arc::clone(&rx);
            let root_token = self.inner.root_token.clone();
            handles.push(tokio::spawn(Self::run_worker(worker_id, rx, root_token)));
        }
        *self
            .inner
            .worker_handles
            .try_lock()
            .expect("worker_handles only written once, from spawn_workers") = Some(handles);
    }

    /// Attempt to admit `task`. Reserves a queue slot (waiting up to
    /// `admission_timeout`), then runs `task.on_enqueue()` while still
    /// holding that reservation: on success the task becomes visible to the
    /// runner; on failure the reservation is released and the task never
    /// touches the queue.
    pub async fn enqueue(&self, task: Arc<dyn Task>) -> Result<(), SchedulerError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(SchedulerError::Closed);
        }

        let tx = {
            let guard = self.inner.tx.lock().await;
            guard.as_ref().cloned().ok_or(SchedulerError::Closed)?
        };

        let permit = match tokio::time::timeout(self.inner.admission_timeout, tx.reserve()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(SchedulerError::Closed),
            Err(_) => {
                return Err(SchedulerError::QueueFull {
                    capacity: self.inner.capacity,
                })
            }
        };

        match task.on_enqueue().await {
            Ok(()) => {
                info!(task = task.name(), "task admitted");
                permit.send(task);
                Ok(())
            }
            Err(e) => {
                // Dropping the permit (instead of sending) restores exactly
                // one unit of queue capacity; the task was never visible to
                // the runner.
                drop(permit);
                warn!(task = task.name(), error = %e, "on_enqueue rejected task");
                Err(SchedulerError::OnEnqueueRejected(e.to_string()))
            }
        }
    }

    /// Stop accepting new tasks, drain everything already admitted, and wait
    /// for all in-flight tasks to reach a terminal state. Idempotent: a
    /// second call waits on the first call's drain (if still running) or
    /// returns immediately once it has already completed.
    pub async fn close(&self) {
        let mut guard = self.inner.close_guard.lock().await;
        if *guard {
            return; // a previous close() already ran to completion
        }
        *guard = true;

        self.inner.closed.store(true, Ordering::SeqCst);

        // Dropping the sending half lets every worker's `rx.recv()` return
        // `None` once the buffered items are drained, ending its loop.
        self.inner.tx.lock().await.take();

        // Cancel the root context *before* waiting on the workers below: an
        // in-flight task that only observes the scheduler's root token (not
        // a private one of its own) needs this signal to unblock from a
        // stage that is otherwise waiting forever, and close() is about to
        // sit in the join below until that very task reaches a terminal
        // state. Firing the cancel after the join would be too late to ever
        // be observed.
        self.inner.root_source.cancel();

        // If start() was never called, nothing is draining the tasks that
        // enqueue() already buffered. Spawn the workers now so the drain
        // guarantee holds regardless of whether the caller ever started the
        // scheduler.
        if !self.inner.start_guard.swap(true, Ordering::SeqCst) {
            self.spawn_workers();
        }

        let handles = self.inner.worker_handles.lock().await.take();
        if let Some(handles) = handles {
            for handle in handles {
                let _ = handle.await;
            }
        }

        info!("scheduler closed");
        // `guard` is held for the whole drain, so concurrent close() callers
        // block here and then see `*guard == true` and return immediately.
    }

    async fn run_worker(
        worker_id: usize,
        rx: Arc<Mutex<mpsc::Receiver<QueueItem>>>,
        root_token: CancellationToken,
    ) {
        loop {
            let task = {
                let mut guard = rx.lock().await;
                guard.recv().await
            };
            let Some(task) = task else {
                break;
            };

            let name = task.name().to_owned();
            let handle = tokio::spawn(Self::run_task(Arc::clone(&task), root_token.clone()));
            let outcome = match handle.await {
                Ok(state) => state,
                Err(join_err) => {
                    warn!(
                        worker = worker_id,
                        task = %name,
                        error = %join_err,
                        "task pipeline panicked; treating as transient failure"
                    );
                    TaskState::Unissued
                }
            };

            task.set_state(outcome);
            task.reset().await;
            info!(worker = worker_id, task = %name, state = ?outcome, "task terminal");
        }
    }

    /// Drive a single admitted task through its four stages and return the
    /// terminal state to assign. Runs inside its own `tokio::spawn` (see
    /// `run_worker`) so a panic in any stage is caught by the runtime and
    /// surfaces as a `JoinError`, not a crashed worker loop.
    async fn run_task(task: Arc<dyn Task>, root_token: CancellationToken) -> TaskState {
        task.set_state(TaskState::InProgress);
        let ctx = StageContext::new(root_token, task.cancellation());
        Self::drive_stages(task.as_ref(), &ctx).await
    }

    async fn drive_stages(task: &dyn Task, ctx: &StageContext) -> TaskState {
        if ctx.is_cancelled() {
            return TaskState::Abandoned;
        }
        if let Err(e) = task.prepare(ctx).await {
            return Self::map_stage_error(e);
        }

        if ctx.is_cancelled() {
            return TaskState::Abandoned;
        }
        if let Err(e) = task.load_data(ctx).await {
            return Self::map_stage_error(e);
        }

        if ctx.is_cancelled() {
            return TaskState::Abandoned;
        }
        if let Err(e) = task.build_index(ctx).await {
            return Self::map_stage_error(e);
        }

        if ctx.is_cancelled() {
            return TaskState::Abandoned;
        }
        if let Err(e) = task.save_index_files(ctx).await {
            return Self::map_stage_error(e);
        }

        TaskState::Finished
    }

    fn map_stage_error(err: StageError) -> TaskState {
        if err.is_no_such_key() {
            TaskState::Failed
        } else {
            TaskState::Unissued
        }
    }
}
