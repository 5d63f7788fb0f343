mod config;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument};
use vdb_index_scheduler::{
    CancellationSource, CancellationToken, Scheduler, StageContext, StageError, StateCell, Task,
    TaskState,
};

use config::WorkerConfig;

/// A toy index-build task: stands in for the real pipeline (native
/// index-builder bindings, object storage, metadata persistence — all out
/// of scope for the scheduler itself) so this binary can demonstrate the
/// startup/shutdown sequence end to end.
struct DemoIndexTask {
    name: String,
    token: CancellationToken,
    _source: CancellationSource,
    state: StateCell,
}

impl DemoIndexTask {
    fn new(name: impl Into<String>) -> Arc<Self> {
        let (source, token) = CancellationSource::new();
        Arc::new(Self {
            name: name.into(),
            token,
            _source: source,
            state: StateCell::new(TaskState::None),
        })
    }
}

#[async_trait]
impl Task for DemoIndexTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancellation(&self) -> CancellationToken {
        self.token.clone()
    }

    #[instrument(skip(self, ctx), fields(task = %self.name))]
    async fn prepare(&self, ctx: &StageContext) -> Result<(), StageError> {
        run_stage(ctx, "prepare").await
    }

    #[instrument(skip(self, ctx), fields(task = %self.name))]
    async fn load_data(&self, ctx: &StageContext) -> Result<(), StageError> {
        run_stage(ctx, "load_data").await
    }

    #[instrument(skip(self, ctx), fields(task = %self.name))]
    async fn build_index(&self, ctx: &StageContext) -> Result<(), StageError> {
        run_stage(ctx, "build_index").await
    }

    #[instrument(skip(self, ctx), fields(task = %self.name))]
    async fn save_index_files(&self, ctx: &StageContext) -> Result<(), StageError> {
        run_stage(ctx, "save_index_files").await
    }

    async fn reset(&self) {
        info!(task = %self.name, "released demo task resources");
    }

    fn set_state(&self, state: TaskState) {
        info!(task = %self.name, ?state, "task reached terminal state");
        self.state.set(state);
    }

    fn state(&self) -> TaskState {
        self.state.get()
    }
}

async fn run_stage(ctx: &StageContext, stage: &str) -> Result<(), StageError> {
    info!(stage, "running stage");
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(50)) => Ok(()),
        _ = ctx.cancelled() => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .init();

    info!(?config, "starting index-build worker");

    let scheduler = Scheduler::new(config.scheduler);
    scheduler.start();

    static DEMO_TASK_SEQ: AtomicUsize = AtomicUsize::new(0);
    for _ in 0..4 {
        let id = DEMO_TASK_SEQ.fetch_add(1, Ordering::SeqCst);
        let task = DemoIndexTask::new(format!("demo-{id}"));
        if let Err(e) = scheduler.enqueue(task).await {
            tracing::warn!(error = %e, "failed to enqueue demo task");
        }
    }

    shutdown_signal().await;
    info!("shutdown signal received, draining scheduler");
    scheduler.close().await;
    info!("worker stopped");

    Ok(())
}

/// Waits for either ctrl-c or, on unix, SIGTERM — the same dual-signal
/// shutdown trigger `slab-server/src/main.rs` waits on before calling
/// `with_graceful_shutdown`.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl_c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
