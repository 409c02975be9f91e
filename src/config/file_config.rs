use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub tick_interval_ms: Option<u64>,
    pub shutdown_grace_secs: Option<u64>,

    /// Descriptors inserted at startup when their id is not stored yet.
    pub tasks: Vec<TaskSeedConfig>,

    // Built-in task implementations, registered only when configured
    pub keep_alive: Option<KeepAliveConfig>,
    pub log_cleanup: Option<LogCleanupConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaskSeedConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub type_key: String,
    pub seconds: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub stop_on_error: bool,
    #[serde(default)]
    pub store_id: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeepAliveConfig {
    pub url: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogCleanupConfig {
    pub dir: String,
    pub retention_days: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
