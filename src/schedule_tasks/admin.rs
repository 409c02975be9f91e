use super::tracker::{ExecutionTracker, RunOutcome};
use crate::task_store::{is_valid_interval, normalize_store_id, ScheduleTaskDescriptor, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Schedule task not found: {0}")]
    NotFound(String),

    #[error("Schedule task already exists: {0}")]
    DuplicateId(String),

    #[error("Interval must be a positive number of seconds up to one hundred years, got {0}")]
    InvalidInterval(i64),

    #[error("Type key of schedule task {id} cannot be changed")]
    TypeKeyChanged { id: String },

    #[error("Type key must not be empty")]
    EmptyTypeKey,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AdminError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AdminError::NotFound(id),
            StoreError::DuplicateId(id) => AdminError::DuplicateId(id),
            other => AdminError::Store(other),
        }
    }
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;

/// A descriptor as shown to administrators.
#[derive(Debug, Clone, Serialize)]
pub struct TaskInfo {
    #[serde(flatten)]
    pub task: ScheduleTaskDescriptor,
    pub is_running: bool,
    /// When the scheduler will next pick the task up, `None` if disabled or
    /// beyond the representable date range.
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Administrator entry point: listing, editing and manual triggering.
#[derive(Clone)]
pub struct TaskAdmin {
    tracker: Arc<ExecutionTracker>,
}

impl TaskAdmin {
    pub fn new(tracker: Arc<ExecutionTracker>) -> Self {
        Self { tracker }
    }

    fn info(&self, task: ScheduleTaskDescriptor) -> TaskInfo {
        let is_running = self.tracker.is_running(&task.id);
        let next_run_at = if !task.enabled {
            None
        } else if task.last_start_utc.is_none() {
            Some(Utc::now())
        } else {
            task.next_run_at()
        };
        TaskInfo {
            task,
            is_running,
            next_run_at,
        }
    }

    /// All descriptors, ordered by name.
    pub fn list(&self) -> AdminResult<Vec<TaskInfo>> {
        let tasks = self.tracker.store().list()?;
        Ok(tasks.into_iter().map(|t| self.info(t)).collect())
    }

    pub fn get(&self, task_id: &str) -> AdminResult<TaskInfo> {
        let task = self.tracker.store().get(task_id)?;
        Ok(self.info(task))
    }

    /// Add a new descriptor. An empty id is replaced by a generated one.
    ///
    /// Outcome timestamps on `task` are ignored; a new descriptor has never run.
    pub fn create(&self, task: &ScheduleTaskDescriptor) -> AdminResult<ScheduleTaskDescriptor> {
        validate_interval(task.seconds)?;
        if task.type_key.trim().is_empty() {
            return Err(AdminError::EmptyTypeKey);
        }

        let id = if task.id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            task.id.clone()
        };

        let created = ScheduleTaskDescriptor::new(id, &task.name, &task.type_key, task.seconds)
            .with_enabled(task.enabled)
            .with_stop_on_error(task.stop_on_error)
            .with_store_id(task.store_id.clone());

        if self.tracker.registry().resolve(&created.type_key).is_none() {
            warn!(
                "Creating schedule task {} with unregistered type key '{}'",
                created.id, created.type_key
            );
        }

        self.tracker.store().insert(&created)?;
        info!("Created schedule task {} ({})", created.id, created.name);
        Ok(created)
    }

    /// Apply the editable fields of `edit` to the stored descriptor with the same id.
    ///
    /// Name, interval, enabled flag, stop-on-error and store scope are copied.
    /// Outcome timestamps always keep their stored values.
    pub fn update(&self, edit: &ScheduleTaskDescriptor) -> AdminResult<ScheduleTaskDescriptor> {
        validate_interval(edit.seconds)?;

        let current = self.tracker.store().get(&edit.id)?;
        if current.type_key != edit.type_key {
            return Err(AdminError::TypeKeyChanged {
                id: edit.id.clone(),
            });
        }

        let updated = self.tracker.update_descriptor(&edit.id, |t| {
            t.name = edit.name.clone();
            t.seconds = edit.seconds;
            t.enabled = edit.enabled;
            t.stop_on_error = edit.stop_on_error;
            t.store_id = normalize_store_id(edit.store_id.clone());
            Ok(())
        })?;

        info!(
            "Updated schedule task {} (interval: {}s, enabled: {})",
            updated.id, updated.seconds, updated.enabled
        );
        Ok(updated)
    }

    pub fn delete(&self, task_id: &str) -> AdminResult<()> {
        self.tracker.store().delete(task_id)?;
        info!("Deleted schedule task {}", task_id);
        Ok(())
    }

    /// Run a task immediately, regardless of its schedule or enabled flag.
    ///
    /// Returns [`RunOutcome::AlreadyRunning`] if a run is in progress.
    pub async fn run_now(&self, task_id: &str) -> AdminResult<RunOutcome> {
        let task = self.tracker.store().get(task_id)?;
        info!("Manually triggering schedule task {} ({})", task.id, task.name);
        Ok(self.tracker.run(&task).await?)
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.tracker.is_running(task_id)
    }
}

fn validate_interval(seconds: i64) -> AdminResult<()> {
    if !is_valid_interval(seconds) {
        return Err(AdminError::InvalidInterval(seconds));
    }
    Ok(())
}
