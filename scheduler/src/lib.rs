//! Bounded-admission, stage-driven task scheduler for an index-build worker.
//!
//! A [`Scheduler`] accepts [`Task`] objects through [`Scheduler::enqueue`],
//! buffers them in a bounded FIFO queue, and drives each one through its
//! four build stages (`prepare`, `load_data`, `build_index`,
//! `save_index_files`) on a background worker once [`Scheduler::start`] has
//! been called. See `SPEC_FULL.md` for the full outcome-mapping table and
//! lifecycle description.

mod cancellation;
mod config;
mod error;
mod scheduler;
mod task;


pub use cancellation::{CancellationSource, CancellationToken, StageContext};
pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use scheduler::Scheduler;
pub use task::{StageError, StateCell, Task, TaskState};
