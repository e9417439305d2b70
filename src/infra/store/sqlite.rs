//! SQLite-backed task store.
//!
//! Several processes may open the same database file; each conditional
//! update is a single `UPDATE ... WHERE` statement, so SQLite's write lock
//! makes claims exclusive across processes. Success is read from the number
//! of changed rows, never from the absence of an error.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value;

use crate::core::{CandidateQuery, SchedulerError, Task, TaskId, TaskStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS synced_tasks (
    id             TEXT    NOT NULL PRIMARY KEY,
    method         TEXT    NOT NULL,
    args           TEXT    NOT NULL,   -- JSON array
    run_at_ms      INTEGER NOT NULL,
    assigned_at_ms INTEGER,            -- NULL while unclaimed
    meta           TEXT                -- opaque JSON or NULL
);
CREATE INDEX IF NOT EXISTS idx_synced_tasks_method_run_at ON synced_tasks (method, run_at_ms);
";

const COLUMNS: &str = "id, method, args, run_at_ms, assigned_at_ms, meta";

/// Task store over a single SQLite connection.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `path` in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(SchedulerError::store)?;
        }
        let conn = Connection::open(path).map_err(SchedulerError::store)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(SchedulerError::store)?;
        tracing::debug!(path = %path.display(), "sqlite task store opened");
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, SchedulerError> {
        let conn = Connection::open_in_memory().map_err(SchedulerError::store)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, SchedulerError> {
        // concurrent writers from other processes wait instead of failing
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(SchedulerError::store)?;
        conn.execute_batch(SCHEMA).map_err(SchedulerError::store)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn to_sql_ms(ms: u128) -> Result<i64, SchedulerError> {
    i64::try_from(ms).map_err(|_| SchedulerError::InvalidRunAt(format!("{ms} ms does not fit the store")))
}

fn from_sql_ms(ms: i64) -> u128 {
    u128::try_from(ms).unwrap_or(0)
}

struct RawTask {
    id: String,
    method: String,
    args: String,
    run_at_ms: i64,
    assigned_at_ms: Option<i64>,
    meta: Option<String>,
}

impl RawTask {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            method: row.get(1)?,
            args: row.get(2)?,
            run_at_ms: row.get(3)?,
            assigned_at_ms: row.get(4)?,
            meta: row.get(5)?,
        })
    }

    fn into_task(self) -> Result<Task, SchedulerError> {
        let id: TaskId = self.id.parse().map_err(SchedulerError::store)?;
        let args: Vec<Value> = serde_json::from_str(&self.args).map_err(SchedulerError::store)?;
        let meta = self
            .meta
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()
            .map_err(SchedulerError::store)?;
        Ok(Task {
            id,
            method: self.method,
            args,
            run_at_ms: from_sql_ms(self.run_at_ms),
            assigned_at_ms: self.assigned_at_ms.map(from_sql_ms),
            meta,
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert(&self, task: Task) -> Result<TaskId, SchedulerError> {
        let args = serde_json::to_string(&task.args).map_err(SchedulerError::store)?;
        let meta = task
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(SchedulerError::store)?;
        let run_at_ms = to_sql_ms(task.run_at_ms)?;
        let assigned_at_ms = task.assigned_at_ms.map(to_sql_ms).transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO synced_tasks (id, method, args, run_at_ms, assigned_at_ms, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![task.id.to_string(), task.method, args, run_at_ms, assigned_at_ms, meta],
        )
        .map_err(SchedulerError::store)?;
        Ok(task.id)
    }

    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Task>, SchedulerError> {
        if query.methods.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; query.methods.len()].join(", ");
        let sql = format!(
            "SELECT {COLUMNS} FROM synced_tasks
             WHERE method IN ({placeholders})
               AND run_at_ms <= ?
               AND assigned_at_ms IS NULL
             ORDER BY run_at_ms DESC, rowid ASC
             LIMIT ?"
        );
        let now_ms = to_sql_ms(query.now_ms)?;
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let mut bound: Vec<rusqlite::types::Value> = query
            .methods
            .iter()
            .map(|m| rusqlite::types::Value::Text(m.clone()))
            .collect();
        bound.push(rusqlite::types::Value::Integer(now_ms));
        bound.push(rusqlite::types::Value::Integer(limit));

        let raw: Vec<RawTask> = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql).map_err(SchedulerError::store)?;
            let rows = stmt
                .query_map(params_from_iter(bound.iter()), RawTask::from_row)
                .map_err(SchedulerError::store)?;
            rows.collect::<rusqlite::Result<_>>().map_err(SchedulerError::store)?
        };
        raw.into_iter().map(RawTask::into_task).collect()
    }

    async fn claim(&self, id: TaskId, now_ms: u128) -> Result<bool, SchedulerError> {
        let now_ms = to_sql_ms(now_ms)?;
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE synced_tasks SET assigned_at_ms = ?1
                 WHERE id = ?2 AND assigned_at_ms IS NULL",
                params![now_ms, id.to_string()],
            )
            .map_err(SchedulerError::store)?;
        Ok(changed == 1)
    }

    async fn reschedule(&self, id: TaskId, run_at_ms: u128) -> Result<bool, SchedulerError> {
        let run_at_ms = to_sql_ms(run_at_ms)?;
        let changed = self
            .conn
            .lock()
            .execute(
                "UPDATE synced_tasks SET run_at_ms = ?1, assigned_at_ms = NULL WHERE id = ?2",
                params![run_at_ms, id.to_string()],
            )
            .map_err(SchedulerError::store)?;
        Ok(changed == 1)
    }

    async fn delete(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.conn
            .lock()
            .execute("DELETE FROM synced_tasks WHERE id = ?1", [id.to_string()])
            .map_err(SchedulerError::store)?;
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, SchedulerError> {
        let sql = format!("SELECT {COLUMNS} FROM synced_tasks WHERE id = ?1");
        let result = {
            let conn = self.conn.lock();
            conn.query_row(&sql, [id.to_string()], RawTask::from_row)
        };
        match result {
            Ok(raw) => raw.into_task().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SchedulerError::store(e)),
        }
    }

    async fn release_stale(&self, cutoff_ms: u128) -> Result<usize, SchedulerError> {
        let cutoff_ms = to_sql_ms(cutoff_ms)?;
        self.conn
            .lock()
            .execute(
                "UPDATE synced_tasks SET assigned_at_ms = NULL
                 WHERE assigned_at_ms IS NOT NULL AND assigned_at_ms < ?1",
                [cutoff_ms],
            )
            .map_err(SchedulerError::store)
    }
}
