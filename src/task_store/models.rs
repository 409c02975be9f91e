use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Longest accepted interval between runs: one hundred years.
pub const MAX_INTERVAL_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Whether `seconds` is an acceptable run interval.
pub fn is_valid_interval(seconds: i64) -> bool {
    seconds > 0 && seconds <= MAX_INTERVAL_SECONDS
}

/// Durable record describing one schedulable task and the outcome of its latest runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTaskDescriptor {
    /// Stable identifier, immutable once created.
    pub id: String,
    /// Human-readable label shown to administrators.
    pub name: String,
    /// Key of the registered implementation that runs this task. Immutable.
    pub type_key: String,
    /// Interval between runs, in seconds. Must be positive.
    pub seconds: i64,
    pub enabled: bool,
    /// Store the task applies to. `None` means global.
    pub store_id: Option<String>,
    /// Disable the task after a failed run.
    pub stop_on_error: bool,
    pub last_start_utc: Option<DateTime<Utc>>,
    pub last_success_utc: Option<DateTime<Utc>>,
    pub last_non_success_end_utc: Option<DateTime<Utc>>,
}

impl ScheduleTaskDescriptor {
    /// Create an enabled, never-run descriptor.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        type_key: impl Into<String>,
        seconds: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_key: type_key.into(),
            seconds,
            enabled: true,
            store_id: None,
            stop_on_error: false,
            last_start_utc: None,
            last_success_utc: None,
            last_non_success_end_utc: None,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn with_store_id(mut self, store_id: Option<String>) -> Self {
        self.store_id = normalize_store_id(store_id);
        self
    }

    /// Time at which the task becomes due again.
    ///
    /// `None` if it has never started, or if the interval puts the next run
    /// beyond the representable date range.
    pub fn next_run_at(&self) -> Option<DateTime<Utc>> {
        let start = self.last_start_utc?;
        let interval = TimeDelta::try_seconds(self.seconds.max(0))?;
        start.checked_add_signed(interval)
    }
}

/// Blank store ids mean "global" and are stored as `None`.
pub fn normalize_store_id(store_id: Option<String>) -> Option<String> {
    store_id.filter(|s| !s.trim().is_empty())
}
