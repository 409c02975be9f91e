//! Log cleanup task.
//!
//! Deletes files under a log directory that have not been modified within
//! the retention period.

use crate::schedule_tasks::task::{ScheduleTask, TaskContext, TaskError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const LOG_CLEANUP_TYPE_KEY: &str = "log_cleanup";

pub struct LogCleanupTask {
    dir: PathBuf,
    retention_days: u64,
}

impl LogCleanupTask {
    pub fn new(dir: PathBuf, retention_days: u64) -> Self {
        Self {
            dir,
            retention_days,
        }
    }

    fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }
}

/// Delete regular files under `dir` last modified before `cutoff`.
/// Returns the number of deleted files.
fn delete_files_older_than(dir: &Path, cutoff: SystemTime) -> Result<usize, TaskError> {
    if !dir.is_dir() {
        return Err(TaskError::Misconfigured(format!(
            "Log directory {} does not exist",
            dir.display()
        )));
    }

    let mut deleted = 0;
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable log entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            _ => continue,
        };
        if modified >= cutoff {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => deleted += 1,
            Err(e) => warn!("Failed to delete {}: {}", entry.path().display(), e),
        }
    }

    Ok(deleted)
}

#[async_trait]
impl ScheduleTask for LogCleanupTask {
    fn type_key(&self) -> &'static str {
        LOG_CLEANUP_TYPE_KEY
    }

    fn description(&self) -> &'static str {
        "Delete log files older than the retention period"
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let cutoff = SystemTime::now()
            .checked_sub(self.retention())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        info!(
            "Task {} cleaning up files in {} older than {} days",
            ctx.task_id,
            self.dir.display(),
            self.retention_days
        );

        let dir = self.dir.clone();
        let deleted = tokio::task::spawn_blocking(move || delete_files_older_than(&dir, cutoff))
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("Cleanup worker failed: {}", e)))??;

        if deleted > 0 {
            info!("Deleted {} old log files", deleted);
        } else {
            info!("No log files to clean up");
        }

        Ok(())
    }
}
