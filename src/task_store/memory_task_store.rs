use super::models::ScheduleTaskDescriptor;
use super::{StoreError, StoreResult, TaskStore};
use anyhow::anyhow;
use std::collections::HashMap;
use std::sync::RwLock;

/// Task store kept entirely in memory. Nothing survives a restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, ScheduleTaskDescriptor>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: impl IntoIterator<Item = ScheduleTaskDescriptor>) -> Self {
        Self {
            tasks: RwLock::new(tasks.into_iter().map(|t| (t.id.clone(), t)).collect()),
        }
    }
}

fn poisoned() -> StoreError {
    StoreError::Other(anyhow!("In-memory task store lock poisoned"))
}

impl TaskStore for InMemoryTaskStore {
    fn list(&self) -> StoreResult<Vec<ScheduleTaskDescriptor>> {
        let tasks = self.tasks.read().map_err(|_| poisoned())?;
        let mut list: Vec<_> = tasks.values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    fn get(&self, id: &str) -> StoreResult<ScheduleTaskDescriptor> {
        let tasks = self.tasks.read().map_err(|_| poisoned())?;
        tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn insert(&self, task: &ScheduleTaskDescriptor) -> StoreResult<()> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::DuplicateId(task.id.clone()));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn update(&self, task: &ScheduleTaskDescriptor) -> StoreResult<()> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        match tasks.get_mut(&task.id) {
            Some(existing) => {
                *existing = task.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(task.id.clone())),
        }
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let mut tasks = self.tasks.write().map_err(|_| poisoned())?;
        tasks
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}
