//! Scheduled task execution and status tracking.
//!
//! Descriptors in a [`TaskStore`](crate::task_store::TaskStore) name a task
//! implementation by type key and an interval. The [`TaskScheduler`] picks up
//! due descriptors and hands them to the [`ExecutionTracker`], which runs them
//! under a per-task lease and records the outcome. [`TaskAdmin`] lets an
//! administrator edit descriptors and run a task on demand.

mod admin;
mod lease;
mod registry;
mod scheduler;
mod task;
pub mod tasks;
mod tracker;

pub use admin::{AdminError, AdminResult, TaskAdmin, TaskInfo};
pub use lease::{LeaseGuard, LeaseSet};
pub use registry::TaskRegistry;
pub use scheduler::{
    is_due, SchedulerConfig, TaskScheduler, DEFAULT_SHUTDOWN_GRACE, DEFAULT_TICK_INTERVAL,
};
pub use task::{ScheduleTask, TaskContext, TaskError};
pub use tracker::{ExecutionTracker, RunOutcome};
