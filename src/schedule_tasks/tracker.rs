use super::lease::{LeaseGuard, LeaseSet};
use super::registry::TaskRegistry;
use super::task::{ScheduleTask, TaskContext, TaskError};
use crate::metrics;
use crate::task_store::{ScheduleTaskDescriptor, StoreError, StoreResult, TaskStore};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of asking the tracker to run a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    /// The task ran and reported an error or panicked.
    Failure(String),
    /// No implementation is registered for the contained type key.
    ImplementationMissing(String),
    /// Another run of the same task holds the lease.
    AlreadyRunning,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Failure(_) => "failure",
            RunOutcome::ImplementationMissing(_) => "implementation_missing",
            RunOutcome::AlreadyRunning => "already_running",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }
}

/// Runs tasks and keeps the outcome fields of their descriptors up to date.
///
/// This is the only writer of `last_start_utc`, `last_success_utc` and
/// `last_non_success_end_utc`.
#[derive(Clone)]
pub struct ExecutionTracker {
    store: Arc<dyn TaskStore>,
    registry: Arc<TaskRegistry>,
    leases: LeaseSet,
    /// Serializes read-modify-write cycles on descriptors.
    write_gate: Arc<Mutex<()>>,
}

impl ExecutionTracker {
    pub fn new(store: Arc<dyn TaskStore>, registry: Arc<TaskRegistry>) -> Self {
        Self {
            store,
            registry,
            leases: LeaseSet::new(),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.leases.is_held(task_id)
    }

    pub fn running_task_ids(&self) -> Vec<String> {
        self.leases.held_ids()
    }

    /// Load the current descriptor, apply `f` and persist it, without
    /// interleaving with other writes made through this tracker.
    pub fn update_descriptor<F>(&self, task_id: &str, f: F) -> StoreResult<ScheduleTaskDescriptor>
    where
        F: FnOnce(&mut ScheduleTaskDescriptor) -> StoreResult<()>,
    {
        let _gate = self.write_gate.lock().unwrap_or_else(|e| e.into_inner());
        let mut task = self.store.get(task_id)?;
        f(&mut task)?;
        self.store.update(&task)?;
        Ok(task)
    }

    /// Run `task` once, recording its start and outcome.
    ///
    /// Task failures (including panics) are reported as [`RunOutcome::Failure`].
    /// An error is returned only when the descriptor could not be read or written.
    ///
    /// Once the lease is taken the run continues on its own tokio task, which
    /// owns the lease. Dropping or aborting the returned future does not
    /// release the lease before the work and its outcome write have finished.
    pub async fn run(&self, task: &ScheduleTaskDescriptor) -> Result<RunOutcome, StoreError> {
        let Some(lease) = self.leases.try_acquire(&task.id) else {
            debug!("Schedule task {} is already running, skipping", task.id);
            metrics::record_task_skip(&task.id, RunOutcome::AlreadyRunning.as_str());
            return Ok(RunOutcome::AlreadyRunning);
        };

        let Some(implementation) = self.registry.resolve(&task.type_key) else {
            warn!(
                "Schedule task {} has no registered implementation for type key '{}'",
                task.id, task.type_key
            );
            let outcome = RunOutcome::ImplementationMissing(task.type_key.clone());
            metrics::record_task_skip(&task.id, outcome.as_str());
            return Ok(outcome);
        };

        let tracker = self.clone();
        tokio::spawn(async move { tracker.run_leased(lease, implementation).await })
            .await
            .map_err(|e| {
                StoreError::Other(anyhow!(
                    "Run of schedule task {} did not complete: {}",
                    task.id,
                    e
                ))
            })?
    }

    async fn run_leased(
        self,
        lease: LeaseGuard,
        implementation: Arc<dyn ScheduleTask>,
    ) -> Result<RunOutcome, StoreError> {
        let task_id = lease.task_id().to_string();

        let started_at = Utc::now();
        let current = self.update_descriptor(&task_id, |t| {
            t.last_start_utc = Some(started_at);
            Ok(())
        })?;

        info!(
            "Starting schedule task: {} ({}, type: {})",
            current.id, current.name, current.type_key
        );

        let ctx = TaskContext {
            task_id: current.id.clone(),
            task_name: current.name.clone(),
            store_id: current.store_id.clone(),
        };

        metrics::set_task_running(&task_id, true);
        let start_time = Instant::now();
        let result = tokio::spawn(async move { implementation.execute(&ctx).await })
            .await
            .unwrap_or_else(|e| Err(TaskError::Panicked(join_error_message(e))));
        let elapsed = start_time.elapsed();
        metrics::set_task_running(&task_id, false);

        let outcome = match result {
            Ok(()) => {
                info!("Schedule task {} completed successfully in {:?}", task_id, elapsed);
                RunOutcome::Success
            }
            Err(e) => {
                error!("Schedule task {} failed after {:?}: {}", task_id, elapsed, e);
                RunOutcome::Failure(e.to_string())
            }
        };

        // Clock adjustments must not place the outcome before its own start.
        let finished_at = Utc::now().max(started_at);
        self.record_outcome(&task_id, &outcome, finished_at)?;
        metrics::record_task_run(&task_id, outcome.as_str(), elapsed);

        drop(lease);
        Ok(outcome)
    }

    fn record_outcome(
        &self,
        task_id: &str,
        outcome: &RunOutcome,
        finished_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = self.update_descriptor(task_id, |t| {
            if outcome.is_success() {
                t.last_success_utc = Some(finished_at);
            } else {
                t.last_non_success_end_utc = Some(finished_at);
                if t.stop_on_error && t.enabled {
                    warn!("Disabling schedule task {} after failed run", t.id);
                    t.enabled = false;
                }
            }
            Ok(())
        });

        if let Err(e) = &result {
            error!(
                "Failed to record outcome '{}' for schedule task {}: {}",
                outcome.as_str(),
                task_id,
                e
            );
        }
        result.map(|_| ())
    }
}

fn join_error_message(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
