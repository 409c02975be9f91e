//! Common test infrastructure
//!
//! Builds a scheduler stack on a temporary SQLite database with a pair of
//! counting task implementations.

#![allow(dead_code)]

use async_trait::async_trait;
use schedule_task_server::schedule_tasks::{
    ExecutionTracker, SchedulerConfig, ScheduleTask, TaskAdmin, TaskContext, TaskError,
    TaskRegistry, TaskScheduler,
};
use schedule_task_server::task_store::{ScheduleTaskDescriptor, SqliteTaskStore, TaskStore};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const SUCCEEDING_TYPE_KEY: &str = "succeeding";
pub const FAILING_TYPE_KEY: &str = "failing";

pub struct CountingTask {
    type_key: &'static str,
    fail: bool,
    pub executions: Arc<AtomicUsize>,
}

#[async_trait]
impl ScheduleTask for CountingTask {
    fn type_key(&self) -> &'static str {
        self.type_key
    }

    fn description(&self) -> &'static str {
        "Counts executions"
    }

    async fn execute(&self, _ctx: &TaskContext) -> Result<(), TaskError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(TaskError::ExecutionFailed("always fails".to_string()))
        } else {
            Ok(())
        }
    }
}

pub struct TestEnv {
    pub temp_dir: TempDir,
    pub db_path: PathBuf,
    pub store: Arc<SqliteTaskStore>,
    pub tracker: Arc<ExecutionTracker>,
    pub admin: TaskAdmin,
    pub scheduler: TaskScheduler,
    pub succeeded: Arc<AtomicUsize>,
    pub failed: Arc<AtomicUsize>,
}

impl TestEnv {
    pub fn new(tasks: Vec<ScheduleTaskDescriptor>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        let store = Arc::new(SqliteTaskStore::new(&db_path).unwrap());
        for task in &tasks {
            store.insert(task).unwrap();
        }

        let succeeded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(Arc::new(CountingTask {
            type_key: SUCCEEDING_TYPE_KEY,
            fail: false,
            executions: succeeded.clone(),
        }));
        registry.register(Arc::new(CountingTask {
            type_key: FAILING_TYPE_KEY,
            fail: true,
            executions: failed.clone(),
        }));

        let tracker = Arc::new(ExecutionTracker::new(
            store.clone() as Arc<dyn TaskStore>,
            Arc::new(registry),
        ));
        let scheduler = TaskScheduler::new(
            tracker.clone(),
            SchedulerConfig {
                tick_interval: Duration::from_millis(20),
                shutdown_grace: Duration::from_secs(1),
            },
        );

        Self {
            temp_dir,
            db_path,
            admin: TaskAdmin::new(tracker.clone()),
            store,
            tracker,
            scheduler,
            succeeded,
            failed,
        }
    }
}

/// Poll `condition` every 10ms for up to two seconds.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
