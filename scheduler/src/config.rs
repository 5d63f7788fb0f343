use std::time::Duration;

/// Constructor-supplied configuration for a [`crate::Scheduler`].
///
/// `capacity` and `admission_timeout` are the two recognized options the
/// specification calls out explicitly; `workers` generalizes the runner to
/// `W >= 1` identical consumers, with `1` as the default and only
/// configuration the design guarantees strict FIFO ordering for.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of tasks buffered in the queue awaiting a worker.
    pub capacity: usize,
    /// Upper bound on how long `enqueue` will wait for a free slot.
    pub admission_timeout: Duration,
    /// Number of background stage-runner workers. `1` preserves strict
    /// dequeue-order processing; `W > 1` trades that for throughput.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            admission_timeout: Duration::from_secs(2),
            workers: 1,
        }
    }
}

impl SchedulerConfig {
    /// Read configuration from the process environment, falling back to
    /// [`SchedulerConfig::default`] for anything unset or unparseable.
    ///
    /// Follows the teacher's `Config::from_env` convention
    /// (`slab-server/src/config.rs`): every field has a sensible default, and
    /// `SCHED_*` variables are read best-effort via `parse_env`.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            capacity: parse_env("SCHED_CAPACITY", default.capacity),
            admission_timeout: Duration::from_millis(parse_env(
                "SCHED_ADMIT_TIMEOUT_MS",
                default.admission_timeout.as_millis() as u64,
            )),
            workers: parse_env("SCHED_WORKERS", default.workers),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
