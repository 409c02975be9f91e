//! Built-in schedule task implementations.

pub mod keep_alive;
pub mod log_cleanup;

pub use keep_alive::KeepAliveTask;
pub use log_cleanup::LogCleanupTask;
