use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of task ids that currently have a run in progress.
///
/// Acquiring is exclusive and not reentrant: a second acquire for the same id
/// fails until the first guard is dropped.
#[derive(Clone, Default)]
pub struct LeaseSet {
    held: Arc<Mutex<HashSet<String>>>,
}

impl LeaseSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn held(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set is only mutated by single insert/remove calls, so a poisoned
        // lock still holds a consistent set.
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Try to take the lease for `task_id`. Returns `None` if it is already held.
    pub fn try_acquire(&self, task_id: &str) -> Option<LeaseGuard> {
        if self.held().insert(task_id.to_string()) {
            Some(LeaseGuard {
                leases: self.clone(),
                task_id: task_id.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_held(&self, task_id: &str) -> bool {
        self.held().contains(task_id)
    }

    pub fn held_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.held().iter().cloned().collect();
        ids.sort();
        ids
    }
}

/// Releases its lease when dropped, including on panic or task abort.
pub struct LeaseGuard {
    leases: LeaseSet,
    task_id: String,
}

impl LeaseGuard {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.leases.held().remove(&self.task_id);
    }
}
