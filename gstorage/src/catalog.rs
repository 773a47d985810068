use crate::config::StorageConfig;
use crate::errors::{Result, StorageError};
use crate::models::{TaskLog, TaskStatus};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Bookkeeping database recording load and download runs.
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let path = config.catalog_path().ok_or_else(|| {
            StorageError::Config("catalog requires storage.directory to be set".to_string())
        })?;
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS task_logs (
                task_id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_name TEXT,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT,
                details TEXT
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn create_task_log(&self, task_name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let start_time = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO task_logs (task_name, start_time, status) VALUES (?1, ?2, ?3)",
            params![task_name, start_time, TaskStatus::Running.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update_task_log_status(
        &self,
        task_id: i64,
        status: TaskStatus,
        details: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let end_time = chrono::Utc::now().timestamp();
        let details = serde_json::to_string(details)?;
        let updated = conn.execute(
            "UPDATE task_logs SET status = ?1, details = ?2, end_time = ?3 WHERE task_id = ?4",
            params![status.as_str(), details, end_time, task_id],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("task log {task_id}")));
        }
        Ok(())
    }

    /// Most recent runs first.
    pub fn recent_task_logs(&self, limit: usize) -> Result<Vec<TaskLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT task_id, task_name, start_time, end_time, status, details
             FROM task_logs ORDER BY task_id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let status: Option<String> = row.get(4)?;
            Ok(TaskLog {
                task_id: row.get(0)?,
                task_name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                start_time: row.get(2)?,
                end_time: row.get(3)?,
                status: status
                    .as_deref()
                    .and_then(TaskStatus::parse)
                    .unwrap_or(TaskStatus::Failed),
                details: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            })
        })?;
        let mut logs = Vec::new();
        for log in rows {
            logs.push(log?);
        }
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn setup() -> (Catalog, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = StorageConfig::new(dir.path());
        let catalog = Catalog::new(&config).unwrap();
        catalog.initialize_schema().unwrap();
        (catalog, dir)
    }

    #[test]
    fn test_task_log_crud() {
        let (catalog, _dir) = setup();

        let task_id = catalog.create_task_log("load").unwrap();
        assert_eq!(task_id, 1);

        catalog
            .update_task_log_status(task_id, TaskStatus::Success, &json!({"lines": 42}))
            .unwrap();

        let logs = catalog.recent_task_logs(10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].task_name, "load");
        assert_eq!(logs[0].status, TaskStatus::Success);
        assert!(logs[0].end_time.is_some());
        assert_eq!(logs[0].details, r#"{"lines":42}"#);
    }

    #[test]
    fn updating_unknown_task_is_not_found() {
        let (catalog, _dir) = setup();
        let err = catalog
            .update_task_log_status(99, TaskStatus::Failed, &json!({}))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn memory_config_has_no_catalog() {
        assert!(matches!(
            Catalog::new(&StorageConfig::in_memory()),
            Err(StorageError::Config(_))
        ));
    }
}
