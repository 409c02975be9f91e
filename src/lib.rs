//! Scheduled task execution and status tracking.
//!
//! This library exposes the internal modules for embedding and testing.

pub mod bootstrap;
pub mod config;
pub mod metrics;
pub mod schedule_tasks;
pub mod sqlite_persistence;
pub mod task_store;

// Re-export commonly used types for convenience
pub use schedule_tasks::{
    ExecutionTracker, RunOutcome, ScheduleTask, TaskAdmin, TaskRegistry, TaskScheduler,
};
pub use task_store::{InMemoryTaskStore, ScheduleTaskDescriptor, SqliteTaskStore, TaskStore};
