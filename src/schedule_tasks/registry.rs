use super::task::ScheduleTask;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Static mapping from type key to task implementation.
///
/// Populated once at startup and then shared read-only.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn ScheduleTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation under its own type key.
    ///
    /// Registering a second implementation for the same key replaces the first.
    pub fn register(&mut self, task: Arc<dyn ScheduleTask>) {
        let type_key = task.type_key().to_string();
        info!("Registering schedule task: {} - {}", type_key, task.description());
        if self.tasks.insert(type_key.clone(), task).is_some() {
            warn!("Replaced previously registered schedule task: {}", type_key);
        }
    }

    pub fn resolve(&self, type_key: &str) -> Option<Arc<dyn ScheduleTask>> {
        self.tasks.get(type_key).cloned()
    }

    pub fn type_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
