//! SQLite schema for the schedule task database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - Schedule task descriptors
// =============================================================================

const SCHEDULE_TASKS_TABLE_V1: Table = Table {
    name: "schedule_tasks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("type_key", &SqlType::Text, non_null = true),
        sqlite_column!("seconds", &SqlType::Integer, non_null = true),
        sqlite_column!("enabled", &SqlType::Integer, non_null = true),
        sqlite_column!("store_id", &SqlType::Text),
        sqlite_column!("stop_on_error", &SqlType::Integer, non_null = true),
        sqlite_column!("last_start_utc", &SqlType::Text),
        sqlite_column!("last_success_utc", &SqlType::Text),
        sqlite_column!("last_non_success_end_utc", &SqlType::Text),
    ],
    indices: &[("idx_schedule_tasks_name", "name, id")],
};

pub const TASK_STORE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[SCHEDULE_TASKS_TABLE_V1],
    migration: None,
}];
