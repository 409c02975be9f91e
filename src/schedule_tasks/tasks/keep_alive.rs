//! Keep-alive task.
//!
//! Periodically requests a URL so the target application (and its caches)
//! stay warm.

use crate::schedule_tasks::task::{ScheduleTask, TaskContext, TaskError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const KEEP_ALIVE_TYPE_KEY: &str = "keep_alive";

/// Sends a GET request to the configured URL. Any non-2xx response is a failure.
pub struct KeepAliveTask {
    client: reqwest::Client,
    url: String,
}

impl KeepAliveTask {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl ScheduleTask for KeepAliveTask {
    fn type_key(&self) -> &'static str {
        KEEP_ALIVE_TYPE_KEY
    }

    fn description(&self) -> &'static str {
        "Request the configured URL to keep the site alive"
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        debug!("Keep-alive task {} requesting {}", ctx.task_id, self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| {
                TaskError::ExecutionFailed(format!("Request to {} failed: {}", self.url, e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TaskError::ExecutionFailed(format!(
                "Keep-alive request to {} returned status {}",
                self.url, status
            )));
        }

        debug!("Keep-alive request to {} returned {}", self.url, status);
        Ok(())
    }
}
