//! Startup wiring: seeding configured descriptors and registering built-in tasks.

use crate::config::AppConfig;
use crate::schedule_tasks::tasks::{KeepAliveTask, LogCleanupTask};
use crate::schedule_tasks::TaskRegistry;
use crate::task_store::{ScheduleTaskDescriptor, StoreError, StoreResult, TaskStore};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Insert each descriptor whose id is not stored yet. Existing descriptors are
/// left untouched so administrator edits survive restarts.
///
/// Returns the number of inserted descriptors.
pub fn seed_tasks(store: &dyn TaskStore, tasks: &[ScheduleTaskDescriptor]) -> StoreResult<usize> {
    let mut inserted = 0;
    for task in tasks {
        match store.get(&task.id) {
            Ok(_) => {
                debug!("Schedule task {} already exists, not seeding", task.id);
            }
            Err(StoreError::NotFound(_)) => {
                store.insert(task)?;
                info!("Seeded schedule task {} ({})", task.id, task.type_key);
                inserted += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(inserted)
}

/// Build the registry of built-in implementations enabled by `config`.
pub fn build_registry(config: &AppConfig) -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    if let Some(ref ka) = config.keep_alive {
        match KeepAliveTask::new(ka.url.clone(), ka.timeout) {
            Ok(task) => registry.register(Arc::new(task)),
            Err(e) => error!("Failed to create keep-alive task: {:#}", e),
        }
    }

    if let Some(ref lc) = config.log_cleanup {
        registry.register(Arc::new(LogCleanupTask::new(
            lc.dir.clone(),
            lc.retention_days,
        )));
    }

    registry
}
