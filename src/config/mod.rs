mod file_config;

pub use file_config::{FileConfig, KeepAliveConfig, LogCleanupConfig, TaskSeedConfig};

use crate::schedule_tasks::{SchedulerConfig, DEFAULT_SHUTDOWN_GRACE, DEFAULT_TICK_INTERVAL};
use crate::task_store::{is_valid_interval, ScheduleTaskDescriptor, MAX_INTERVAL_SECONDS};
use anyhow::{bail, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_KEEP_ALIVE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_RETENTION_DAYS: u64 = 30;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub tick_interval_ms: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE.as_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub tick_interval: Duration,
    pub shutdown_grace: Duration,

    /// Descriptors to insert at startup if missing.
    pub seed_tasks: Vec<ScheduleTaskDescriptor>,

    pub keep_alive: Option<KeepAliveSettings>,
    pub log_cleanup: Option<LogCleanupSettings>,
}

#[derive(Debug, Clone)]
pub struct KeepAliveSettings {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LogCleanupSettings {
    pub dir: PathBuf,
    pub retention_days: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let tick_interval_ms = file.tick_interval_ms.unwrap_or(cli.tick_interval_ms);
        if tick_interval_ms == 0 {
            bail!("tick_interval_ms must be greater than zero");
        }
        let shutdown_grace_secs = file.shutdown_grace_secs.unwrap_or(cli.shutdown_grace_secs);

        let seed_tasks = resolve_seed_tasks(&file.tasks)?;

        let keep_alive = match file.keep_alive {
            Some(ka) => {
                if ka.url.trim().is_empty() {
                    bail!("keep_alive.url must not be empty");
                }
                Some(KeepAliveSettings {
                    url: ka.url,
                    timeout: Duration::from_secs(
                        ka.timeout_secs.unwrap_or(DEFAULT_KEEP_ALIVE_TIMEOUT_SECS),
                    ),
                })
            }
            None => None,
        };

        let log_cleanup = file.log_cleanup.map(|lc| LogCleanupSettings {
            dir: PathBuf::from(lc.dir),
            retention_days: lc.retention_days.unwrap_or(DEFAULT_LOG_RETENTION_DAYS),
        });

        Ok(Self {
            db_path,
            tick_interval: Duration::from_millis(tick_interval_ms),
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
            seed_tasks,
            keep_alive,
            log_cleanup,
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: self.tick_interval,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

fn resolve_seed_tasks(seeds: &[TaskSeedConfig]) -> Result<Vec<ScheduleTaskDescriptor>> {
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(seeds.len());

    for seed in seeds {
        if seed.id.trim().is_empty() {
            bail!("Seeded task ids must not be empty");
        }
        if !seen.insert(seed.id.as_str()) {
            bail!("Duplicate seeded task id: {}", seed.id);
        }
        if seed.type_key.trim().is_empty() {
            bail!("Seeded task {} has an empty type_key", seed.id);
        }
        if !is_valid_interval(seed.seconds) {
            bail!(
                "Seeded task {} must have an interval between 1 and {} seconds, got {}",
                seed.id,
                MAX_INTERVAL_SECONDS,
                seed.seconds
            );
        }

        let name = if seed.name.is_empty() {
            seed.id.clone()
        } else {
            seed.name.clone()
        };
        tasks.push(
            ScheduleTaskDescriptor::new(&seed.id, name, &seed.type_key, seed.seconds)
                .with_enabled(seed.enabled)
                .with_stop_on_error(seed.stop_on_error)
                .with_store_id(seed.store_id.clone()),
        );
    }

    Ok(tasks)
}
