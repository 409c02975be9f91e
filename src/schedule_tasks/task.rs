use async_trait::async_trait;
use thiserror::Error;

/// Errors a schedule task can report from its execution.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Task misconfigured: {0}")]
    Misconfigured(String),
}

/// Information about the descriptor a task is being run for.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: String,
    pub task_name: String,
    /// Store the descriptor is scoped to, `None` for global tasks.
    pub store_id: Option<String>,
}

/// A unit of recurring work, bound to descriptors through its type key.
///
/// Implementations may perform I/O and take arbitrary time. They are never
/// run concurrently for the same descriptor, but the same implementation can
/// serve several descriptors at once.
#[async_trait]
pub trait ScheduleTask: Send + Sync {
    /// Key under which this implementation is registered.
    fn type_key(&self) -> &'static str;

    /// Description of what this task does.
    fn description(&self) -> &'static str;

    /// Perform the work.
    async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError>;
}
