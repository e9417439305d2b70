//! File-backed task store using JSON lines.
//!
//! Documents are held in memory and the whole collection is rewritten to
//! `<dir>/<collection>.jsonl` after every mutation (write to a temp file, then
//! rename). Conditional updates are atomic within one process only; use the
//! SQLite store when several processes share the collection.

use std::fs::{self, create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::store::sort_and_limit;
use crate::core::{CandidateQuery, SchedulerError, Task, TaskId, TaskStore};

/// Durable single-process store.
pub struct FileTaskStore {
    path: PathBuf,
    tasks: Mutex<Vec<Task>>,
}

impl FileTaskStore {
    /// Open (or create) the collection `collection` under `dir`.
    pub fn open(dir: impl AsRef<Path>, collection: &str) -> Result<Self, SchedulerError> {
        let dir = dir.as_ref();
        create_dir_all(dir).map_err(SchedulerError::store)?;
        let path = dir.join(format!("{collection}.jsonl"));
        let tasks = Self::load(&path)?;
        tracing::debug!(path = %path.display(), count = tasks.len(), "file task store opened");
        Ok(Self {
            path,
            tasks: Mutex::new(tasks),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<Vec<Task>, SchedulerError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path).map_err(SchedulerError::store)?;
        let mut tasks = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(SchedulerError::store)?;
            if line.trim().is_empty() {
                continue;
            }
            let task: Task = serde_json::from_str(&line).map_err(SchedulerError::store)?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    fn persist(&self, tasks: &[Task]) -> Result<(), SchedulerError> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)
                .map_err(SchedulerError::store)?;
            let mut writer = BufWriter::new(file);
            for task in tasks {
                let line = serde_json::to_string(task).map_err(SchedulerError::store)?;
                writeln!(writer, "{line}").map_err(SchedulerError::store)?;
            }
            writer.flush().map_err(SchedulerError::store)?;
        }
        fs::rename(&tmp, &self.path).map_err(SchedulerError::store)
    }

    /// Apply `f` to the document `id` and persist if it returned `true`.
    fn update(&self, id: TaskId, f: impl FnOnce(&mut Task) -> bool) -> Result<bool, SchedulerError> {
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        let before = task.clone();
        if !f(task) {
            return Ok(false);
        }
        if let Err(e) = self.persist(&tasks) {
            // keep memory and disk in agreement
            if let Some(task) = tasks.iter_mut().find(|t| t.id == id) {
                *task = before;
            }
            return Err(e);
        }
        Ok(true)
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    async fn insert(&self, task: Task) -> Result<TaskId, SchedulerError> {
        let mut tasks = self.tasks.lock();
        let id = task.id;
        if tasks.iter().any(|t| t.id == id) {
            return Err(SchedulerError::StoreUnavailable(format!("duplicate task id {id}")));
        }
        tasks.push(task);
        if let Err(e) = self.persist(&tasks) {
            tasks.pop();
            return Err(e);
        }
        Ok(id)
    }

    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Task>, SchedulerError> {
        let matching: Vec<Task> = self
            .tasks
            .lock()
            .iter()
            .filter(|t| query.matches(t))
            .cloned()
            .collect();
        Ok(sort_and_limit(matching, query.limit))
    }

    async fn claim(&self, id: TaskId, now_ms: u128) -> Result<bool, SchedulerError> {
        self.update(id, |task| {
            if task.assigned_at_ms.is_some() {
                return false;
            }
            task.assigned_at_ms = Some(now_ms);
            true
        })
    }

    async fn reschedule(&self, id: TaskId, run_at_ms: u128) -> Result<bool, SchedulerError> {
        self.update(id, |task| {
            task.run_at_ms = run_at_ms;
            task.assigned_at_ms = None;
            true
        })
    }

    async fn delete(&self, id: TaskId) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.lock();
        let Some(pos) = tasks.iter().position(|t| t.id == id) else {
            return Ok(());
        };
        let removed = tasks.remove(pos);
        if let Err(e) = self.persist(&tasks) {
            tasks.insert(pos, removed);
            return Err(e);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, SchedulerError> {
        Ok(self.tasks.lock().iter().find(|t| t.id == id).cloned())
    }

    async fn release_stale(&self, cutoff_ms: u128) -> Result<usize, SchedulerError> {
        let mut tasks = self.tasks.lock();
        let before = tasks.clone();
        let mut released = 0;
        for task in tasks.iter_mut() {
            if task.assigned_at_ms.is_some_and(|at| at < cutoff_ms) {
                task.assigned_at_ms = None;
                released += 1;
            }
        }
        if released > 0 {
            if let Err(e) = self.persist(&tasks) {
                *tasks = before;
                return Err(e);
            }
        }
        Ok(released)
    }
}
