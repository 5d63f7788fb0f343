use std::time::Duration;

use vdb_index_scheduler::SchedulerConfig;

/// Configuration for the worker binary: the scheduler's own tunables plus the
/// handful of process-level knobs (logging) the scheduler itself has no
/// opinion about.
///
/// Follows `slab-server/src/config.rs`'s `Config::from_env` shape: every
/// field has a documented default and reads a single `SCHED_*` variable.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub scheduler: SchedulerConfig,
    /// `tracing_subscriber::EnvFilter` directive string, e.g. `"info"` or
    /// `"vdb_index_scheduler=debug,warn"`.
    pub log_filter: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            scheduler: SchedulerConfig {
                capacity: parse_env("SCHED_CAPACITY", default.scheduler.capacity),
                admission_timeout: Duration::from_millis(parse_env(
                    "SCHED_ADMIT_TIMEOUT_MS",
                    default.scheduler.admission_timeout.as_millis() as u64,
                )),
                workers: parse_env("SCHED_WORKERS", default.scheduler.workers),
            },
            log_filter: std::env::var("SCHED_LOG").unwrap_or(default.log_filter),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_scheduler_default_plus_info_logging() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.scheduler.capacity, 1024);
        assert_eq!(cfg.log_filter, "info");
    }

    #[test]
    fn from_env_picks_up_overrides() {
        std::env::set_var("SCHED_CAPACITY", "16");
        std::env::set_var("SCHED_ADMIT_TIMEOUT_MS", "50");
        std::env::set_var("SCHED_WORKERS", "2");
        std::env::set_var("SCHED_LOG", "debug");

        let cfg = WorkerConfig::from_env();
        assert_eq!(cfg.scheduler.capacity, 16);
        assert_eq!(cfg.scheduler.admission_timeout, Duration::from_millis(50));
        assert_eq!(cfg.scheduler.workers, 2);
        assert_eq!(cfg.log_filter, "debug");

        std::env::remove_var("SCHED_CAPACITY");
        std::env::remove_var("SCHED_ADMIT_TIMEOUT_MS");
        std::env::remove_var("SCHED_WORKERS");
        std::env::remove_var("SCHED_LOG");
    }
}
