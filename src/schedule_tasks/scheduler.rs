use super::tracker::ExecutionTracker;
use crate::metrics;
use crate::task_store::ScheduleTaskDescriptor;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often descriptors are checked for due runs.
    pub tick_interval: Duration,
    /// How long `stop` waits for in-flight runs before abandoning them.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Whether `task` should be dispatched at `now`.
///
/// A task is due when it is enabled, not currently leased, and either has
/// never started or its interval has elapsed since the last start.
pub fn is_due(task: &ScheduleTaskDescriptor, now: DateTime<Utc>, leased: bool) -> bool {
    if !task.enabled || leased {
        return false;
    }
    if task.last_start_utc.is_none() {
        return true;
    }
    // An interval reaching past the representable date range is never due
    task.next_run_at().is_some_and(|next_run| now >= next_run)
}

struct RunningLoop {
    shutdown_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodically dispatches due tasks to the execution tracker.
///
/// Stopped until [`TaskScheduler::start`] is called; [`TaskScheduler::stop`]
/// returns it to the stopped state once in-flight runs have drained.
pub struct TaskScheduler {
    tracker: Arc<ExecutionTracker>,
    config: SchedulerConfig,
    running: Option<RunningLoop>,
}

impl TaskScheduler {
    pub fn new(tracker: Arc<ExecutionTracker>, config: SchedulerConfig) -> Self {
        Self {
            tracker,
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawn the scheduler loop on the current tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Task scheduler is already running");
            return;
        }

        info!(
            "Starting task scheduler (tick: {:?}, shutdown grace: {:?})",
            self.config.tick_interval, self.config.shutdown_grace
        );

        let shutdown_token = CancellationToken::new();
        let scheduler_loop = SchedulerLoop {
            tracker: Arc::clone(&self.tracker),
            tick_interval: self.config.tick_interval,
            shutdown_grace: self.config.shutdown_grace,
            running_handles: HashMap::new(),
            shutdown_token: shutdown_token.clone(),
        };
        let handle = tokio::spawn(scheduler_loop.run());

        self.running = Some(RunningLoop {
            shutdown_token,
            handle,
        });
    }

    /// Stop dispatching and wait for in-flight runs, up to the shutdown grace.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            debug!("Task scheduler is not running");
            return;
        };

        running.shutdown_token.cancel();
        if let Err(e) = running.handle.await {
            error!("Task scheduler loop terminated abnormally: {}", e);
        }
    }
}

struct SchedulerLoop {
    tracker: Arc<ExecutionTracker>,
    tick_interval: Duration,
    shutdown_grace: Duration,
    /// Dispatched runs, by task id. Not shared; managed by the loop only.
    running_handles: HashMap<String, JoinHandle<()>>,
    shutdown_token: CancellationToken,
}

impl SchedulerLoop {
    async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Task scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Task scheduler stopped");
    }

    fn tick(&mut self) {
        metrics::record_scheduler_tick();
        self.cleanup_completed_runs();

        let tasks = match self.tracker.store().list() {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Failed to list schedule tasks: {}", e);
                return;
            }
        };

        let now = Utc::now();
        for task in tasks {
            if self.running_handles.contains_key(&task.id) {
                continue;
            }
            if is_due(&task, now, self.tracker.is_running(&task.id)) {
                self.dispatch(task);
            }
        }
    }

    fn dispatch(&mut self, task: ScheduleTaskDescriptor) {
        debug!("Dispatching schedule task {} ({})", task.id, task.type_key);

        let tracker = Arc::clone(&self.tracker);
        let task_id = task.id.clone();
        let handle = tokio::spawn(async move {
            match tracker.run(&task).await {
                Ok(outcome) => {
                    debug!(
                        "Scheduled run of task {} finished: {}",
                        task.id,
                        outcome.as_str()
                    );
                }
                Err(e) => {
                    error!("Failed to record scheduled run of task {}: {}", task.id, e);
                }
            }
        });

        self.running_handles.insert(task_id, handle);
    }

    fn cleanup_completed_runs(&mut self) {
        self.running_handles.retain(|task_id, handle| {
            let finished = handle.is_finished();
            if finished {
                debug!("Run of schedule task {} completed", task_id);
            }
            !finished
        });
    }

    async fn shutdown(&mut self) {
        if self.running_handles.is_empty() {
            return;
        }

        info!(
            "Waiting up to {:?} for {} running schedule task(s)",
            self.shutdown_grace,
            self.running_handles.len()
        );

        let deadline = tokio::time::Instant::now() + self.shutdown_grace;
        for (task_id, mut handle) in self.running_handles.drain() {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                // The run keeps its lease until its work ends
                warn!(
                    "Abandoning schedule task {} after shutdown grace period; it keeps running in the background",
                    task_id
                );
                handle.abort();
            }
        }
    }
}
