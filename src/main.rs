use anyhow::{Context, Result};
use clap::Parser;
use schedule_task_server::bootstrap::{build_registry, seed_tasks};
use schedule_task_server::config::{AppConfig, CliConfig, FileConfig};
use schedule_task_server::metrics;
use schedule_task_server::schedule_tasks::{
    ExecutionTracker, TaskAdmin, TaskScheduler, DEFAULT_SHUTDOWN_GRACE, DEFAULT_TICK_INTERVAL,
};
use schedule_task_server::task_store::{SqliteTaskStore, TaskStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file holding schedule task descriptors.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// How often the scheduler checks for due tasks, in milliseconds.
    #[clap(long, default_value_t = DEFAULT_TICK_INTERVAL.as_millis() as u64)]
    pub tick_interval_ms: u64,

    /// How long to wait for running tasks on shutdown, in seconds.
    #[clap(long, default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs())]
    pub shutdown_grace_secs: u64,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_path: self.db_path.clone(),
            tick_interval_ms: self.tick_interval_ms,
            shutdown_grace_secs: self.shutdown_grace_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match cli_args.config {
        Some(ref path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening SQLite task database at {:?}...", app_config.db_path);
    let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::new(&app_config.db_path)?);

    let seeded = seed_tasks(store.as_ref(), &app_config.seed_tasks)
        .context("Failed to seed schedule tasks")?;
    if seeded > 0 {
        info!("Seeded {} schedule task(s) from config", seeded);
    }

    let registry = Arc::new(build_registry(&app_config));
    info!(
        "Task registry initialized with {} implementation(s): {:?}",
        registry.len(),
        registry.type_keys()
    );

    let tracker = Arc::new(ExecutionTracker::new(store, registry.clone()));
    let admin = TaskAdmin::new(tracker.clone());

    match admin.list() {
        Ok(tasks) => {
            for task_info in tasks {
                if registry.resolve(&task_info.task.type_key).is_none() {
                    warn!(
                        "Schedule task {} uses unregistered type key '{}' and will not run",
                        task_info.task.id, task_info.task.type_key
                    );
                }
                info!(
                    "Schedule task {} ({}): every {}s, enabled: {}, next run: {:?}",
                    task_info.task.id,
                    task_info.task.name,
                    task_info.task.seconds,
                    task_info.task.enabled,
                    task_info.next_run_at
                );
            }
        }
        Err(e) => error!("Failed to list schedule tasks: {}", e),
    }

    let mut scheduler = TaskScheduler::new(tracker, app_config.scheduler_config());
    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating graceful shutdown");

    scheduler.stop().await;

    match metrics::gather_text() {
        Ok(text) => debug!("Final metrics:\n{}", text),
        Err(e) => warn!("Failed to render metrics: {}", e),
    }

    Ok(())
}
