use super::models::{normalize_store_id, ScheduleTaskDescriptor};
use super::schema::TASK_STORE_VERSIONED_SCHEMAS;
use super::{StoreError, StoreResult, TaskStore};
use crate::sqlite_persistence::{VersionedSchema, BASE_DB_VERSION};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

const SELECT_COLUMNS: &str = "id, name, type_key, seconds, enabled, store_id, stop_on_error,
     last_start_utc, last_success_utc, last_non_success_end_utc";

pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open schedule task database")?;
        let latest_schema = TASK_STORE_VERSIONED_SCHEMAS
            .last()
            .context("No schedule task schema defined")?;

        if is_new_db {
            info!("Creating new schedule task database at {:?}", path);
            latest_schema.create(&conn)?;
        } else {
            let db_version = VersionedSchema::read_version(&conn)?;
            if db_version < 1 {
                anyhow::bail!(
                    "Schedule task database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = TASK_STORE_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version as i64 == db_version)
                .with_context(|| format!("Unknown schedule task database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Schedule task database schema validation failed for version {}",
                    db_version
                )
            })?;

            if db_version < latest_schema.version as i64 {
                info!(
                    "Migrating schedule task database from version {} to {}",
                    db_version, latest_schema.version
                );
                Self::migrate(&mut conn, db_version as usize)?;
            }
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &mut Connection, from_version: usize) -> Result<()> {
        let tx = conn.transaction()?;
        let mut latest = from_version;
        for schema in TASK_STORE_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
        {
            if let Some(migration_fn) = schema.migration {
                migration_fn(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
            latest = schema.version;
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other(anyhow!("Schedule task database lock poisoned")))
    }

    fn format_datetime(dt: &Option<DateTime<Utc>>) -> Option<String> {
        dt.map(|dt| dt.to_rfc3339())
    }

    /// Read an optional RFC 3339 timestamp column. A value that does not parse
    /// is a conversion error rather than a missing timestamp.
    fn get_datetime(row: &rusqlite::Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
        let Some(value) = row.get::<_, Option<String>>(column)? else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| {
                let index = row.as_ref().column_index(column).unwrap_or_default();
                rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
            })
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<ScheduleTaskDescriptor> {
        Ok(ScheduleTaskDescriptor {
            id: row.get("id")?,
            name: row.get("name")?,
            type_key: row.get("type_key")?,
            seconds: row.get("seconds")?,
            enabled: row.get::<_, i64>("enabled")? != 0,
            store_id: normalize_store_id(row.get("store_id")?),
            stop_on_error: row.get::<_, i64>("stop_on_error")? != 0,
            last_start_utc: Self::get_datetime(row, "last_start_utc")?,
            last_success_utc: Self::get_datetime(row, "last_success_utc")?,
            last_non_success_end_utc: Self::get_datetime(row, "last_non_success_end_utc")?,
        })
    }
}

impl TaskStore for SqliteTaskStore {
    fn list(&self) -> StoreResult<Vec<ScheduleTaskDescriptor>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM schedule_tasks ORDER BY name, id",
            SELECT_COLUMNS
        ))?;
        let tasks = stmt
            .query_map([], Self::row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn get(&self, id: &str) -> StoreResult<ScheduleTaskDescriptor> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM schedule_tasks WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            Self::row_to_task,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn insert(&self, task: &ScheduleTaskDescriptor) -> StoreResult<()> {
        let conn = self.conn()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM schedule_tasks WHERE id = ?1",
                params![task.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            return Err(StoreError::DuplicateId(task.id.clone()));
        }

        conn.execute(
            "INSERT INTO schedule_tasks (id, name, type_key, seconds, enabled, store_id,
                 stop_on_error, last_start_utc, last_success_utc, last_non_success_end_utc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id,
                task.name,
                task.type_key,
                task.seconds,
                task.enabled as i64,
                normalize_store_id(task.store_id.clone()),
                task.stop_on_error as i64,
                Self::format_datetime(&task.last_start_utc),
                Self::format_datetime(&task.last_success_utc),
                Self::format_datetime(&task.last_non_success_end_utc),
            ],
        )?;
        Ok(())
    }

    fn update(&self, task: &ScheduleTaskDescriptor) -> StoreResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE schedule_tasks SET name = ?2, type_key = ?3, seconds = ?4, enabled = ?5,
                 store_id = ?6, stop_on_error = ?7, last_start_utc = ?8,
                 last_success_utc = ?9, last_non_success_end_utc = ?10
             WHERE id = ?1",
            params![
                task.id,
                task.name,
                task.type_key,
                task.seconds,
                task.enabled as i64,
                normalize_store_id(task.store_id.clone()),
                task.stop_on_error as i64,
                Self::format_datetime(&task.last_start_utc),
                Self::format_datetime(&task.last_success_utc),
                Self::format_datetime(&task.last_non_success_end_utc),
            ],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(task.id.clone()));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM schedule_tasks WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct TestStore {
        store: SqliteTaskStore,
        _temp_dir: TempDir,
    }

    fn create_test_store() -> TestStore {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        let store = SqliteTaskStore::new(&db_path).unwrap();
        TestStore {
            store,
            _temp_dir: temp_dir,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let test = create_test_store();
        let store = &test.store;

        let task = ScheduleTaskDescriptor::new("t1", "Keep alive", "keep_alive", 300)
            .with_stop_on_error(true)
            .with_store_id(Some("store-1".to_string()));
        store.insert(&task).unwrap();

        let loaded = store.get("t1").unwrap();
        assert_eq!(loaded, task);
    }

    #[test]
    fn test_insert_duplicate_id_fails() {
        let test = create_test_store();
        let store = &test.store;

        let task = ScheduleTaskDescriptor::new("t1", "Keep alive", "keep_alive", 300);
        store.insert(&task).unwrap();

        let err = store.insert(&task).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "t1"));
    }

    #[test]
    fn test_get_nonexistent() {
        let test = create_test_store();
        let err = test.store.get("missing").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn test_update_roundtrips_timestamps() {
        let test = create_test_store();
        let store = &test.store;

        let mut task = ScheduleTaskDescriptor::new("t1", "Keep alive", "keep_alive", 300);
        store.insert(&task).unwrap();

        let start = Utc::now();
        task.last_start_utc = Some(start);
        task.last_success_utc = Some(start + chrono::Duration::milliseconds(250));
        task.enabled = false;
        store.update(&task).unwrap();

        let loaded = store.get("t1").unwrap();
        assert_eq!(loaded.last_start_utc, Some(start));
        assert_eq!(
            loaded.last_success_utc,
            Some(start + chrono::Duration::milliseconds(250))
        );
        assert!(loaded.last_non_success_end_utc.is_none());
        assert!(!loaded.enabled);
    }

    #[test]
    fn test_malformed_timestamp_is_an_error() {
        let test = create_test_store();
        let store = &test.store;

        store
            .insert(&ScheduleTaskDescriptor::new("t1", "Keep alive", "keep_alive", 60))
            .unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE schedule_tasks SET last_start_utc = 'yesterday' WHERE id = 't1'",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.get("t1"),
            Err(StoreError::Database(
                rusqlite::Error::FromSqlConversionFailure(_, Type::Text, _)
            ))
        ));
        assert!(matches!(store.list(), Err(StoreError::Database(_))));
    }

    #[test]
    fn test_update_nonexistent_fails() {
        let test = create_test_store();
        let task = ScheduleTaskDescriptor::new("ghost", "Ghost", "keep_alive", 60);

        let err = test.store.update(&task).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_delete() {
        let test = create_test_store();
        let store = &test.store;

        store
            .insert(&ScheduleTaskDescriptor::new("t1", "Keep alive", "keep_alive", 60))
            .unwrap();
        store.delete("t1").unwrap();

        assert!(matches!(store.get("t1"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete("t1"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_is_ordered_by_name() {
        let test = create_test_store();
        let store = &test.store;

        store
            .insert(&ScheduleTaskDescriptor::new("c", "Send queued emails", "queued_emails", 60))
            .unwrap();
        store
            .insert(&ScheduleTaskDescriptor::new("a", "Keep alive", "keep_alive", 60))
            .unwrap();
        store
            .insert(&ScheduleTaskDescriptor::new("b", "Clear logs", "log_cleanup", 60))
            .unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Clear logs", "Keep alive", "Send queued emails"]);
    }

    #[test]
    fn test_reopen_existing_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");

        {
            let store = SqliteTaskStore::new(&db_path).unwrap();
            store
                .insert(&ScheduleTaskDescriptor::new("t1", "Keep alive", "keep_alive", 60))
                .unwrap();
        }

        let store = SqliteTaskStore::new(&db_path).unwrap();
        assert_eq!(store.get("t1").unwrap().name, "Keep alive");
    }

    #[test]
    fn test_open_rejects_foreign_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE something_else (x INTEGER)", [])
                .unwrap();
        }

        assert!(SqliteTaskStore::new(&db_path).is_err());
    }

    fn set_raw_version(db_path: &Path, raw_version: i64) {
        let conn = Connection::open(db_path).unwrap();
        conn.execute(&format!("PRAGMA user_version = {}", raw_version), [])
            .unwrap();
    }

    #[test]
    fn test_open_rejects_version_below_one() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        SqliteTaskStore::new(&db_path).unwrap();

        for raw_version in [0, BASE_DB_VERSION as i64] {
            set_raw_version(&db_path, raw_version);
            let err = SqliteTaskStore::new(&db_path).err().unwrap();
            assert!(
                err.to_string().contains("is invalid (expected >= 1)"),
                "Unexpected error for version {}: {}",
                raw_version,
                err
            );
        }
    }

    #[test]
    fn test_open_rejects_unknown_version() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("tasks.db");
        SqliteTaskStore::new(&db_path).unwrap();

        set_raw_version(&db_path, BASE_DB_VERSION as i64 + 5);
        let err = SqliteTaskStore::new(&db_path).err().unwrap();
        assert!(err
            .to_string()
            .contains("Unknown schedule task database version 5"));
    }
}
