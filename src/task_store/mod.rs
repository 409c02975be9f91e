mod memory_task_store;
mod models;
mod schema;
mod sqlite_task_store;

pub use memory_task_store::InMemoryTaskStore;
pub use models::*;
pub use schema::TASK_STORE_VERSIONED_SCHEMAS;
pub use sqlite_task_store::SqliteTaskStore;

use thiserror::Error;

/// Errors returned by task descriptor persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Schedule task not found: {0}")]
    NotFound(String),

    #[error("Schedule task already exists: {0}")]
    DuplicateId(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence for schedule task descriptors.
///
/// `list` is ordered by name (then id) so administrative listings are stable.
#[cfg_attr(test, mockall::automock)]
pub trait TaskStore: Send + Sync {
    fn list(&self) -> StoreResult<Vec<ScheduleTaskDescriptor>>;
    fn get(&self, id: &str) -> StoreResult<ScheduleTaskDescriptor>;
    fn insert(&self, task: &ScheduleTaskDescriptor) -> StoreResult<()>;
    fn update(&self, task: &ScheduleTaskDescriptor) -> StoreResult<()>;
    fn delete(&self, id: &str) -> StoreResult<()>;
}
