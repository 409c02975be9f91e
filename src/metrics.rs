use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all schedule task metrics
const PREFIX: &str = "schedule_tasks";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref TASK_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_runs_total"), "Total schedule task runs by outcome"),
        &["task_id", "outcome"]
    ).expect("Failed to create runs_total metric");

    pub static ref TASK_RUN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_run_duration_seconds"),
            "Schedule task execution duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 300.0, 1800.0]),
        &["task_id"]
    ).expect("Failed to create run_duration_seconds metric");

    pub static ref TASK_RUNNING: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_running"), "Whether a schedule task is currently running"),
        &["task_id"]
    ).expect("Failed to create running metric");

    pub static ref SCHEDULER_TICKS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_scheduler_ticks_total"),
        "Total scheduler loop ticks"
    ).expect("Failed to create scheduler_ticks_total metric");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(TASK_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TASK_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(TASK_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULER_TICKS_TOTAL.clone()));
}

pub fn record_task_run(task_id: &str, outcome: &str, duration: Duration) {
    TASK_RUNS_TOTAL.with_label_values(&[task_id, outcome]).inc();
    TASK_RUN_DURATION_SECONDS
        .with_label_values(&[task_id])
        .observe(duration.as_secs_f64());
}

/// Count a run that ended before executing (skipped or unresolved).
pub fn record_task_skip(task_id: &str, outcome: &str) {
    TASK_RUNS_TOTAL.with_label_values(&[task_id, outcome]).inc();
}

pub fn set_task_running(task_id: &str, running: bool) {
    TASK_RUNNING
        .with_label_values(&[task_id])
        .set(if running { 1.0 } else { 0.0 });
}

pub fn record_scheduler_tick() {
    SCHEDULER_TICKS_TOTAL.inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        init_metrics();
        init_metrics();

        record_scheduler_tick();
        let metric_families = REGISTRY.gather();
        assert!(!metric_families.is_empty(), "Metrics should be registered");
    }

    #[test]
    fn test_record_task_run() {
        init_metrics();

        record_task_run("metrics_test_task", "success", Duration::from_millis(20));

        let count = TASK_RUNS_TOTAL
            .with_label_values(&["metrics_test_task", "success"])
            .get();
        assert!(count >= 1.0);

        let text = gather_text().unwrap();
        assert!(text.contains("schedule_tasks_runs_total"));
    }

    #[test]
    fn test_set_task_running() {
        set_task_running("metrics_running_task", true);
        assert_eq!(
            TASK_RUNNING
                .with_label_values(&["metrics_running_task"])
                .get(),
            1.0
        );

        set_task_running("metrics_running_task", false);
        assert_eq!(
            TASK_RUNNING
                .with_label_values(&["metrics_running_task"])
                .get(),
            0.0
        );
    }
}
