//! In-memory task store for development, tests, and single-process use.
//!
//! Several schedulers sharing one `Arc<InMemoryTaskStore>` behave like
//! several processes sharing a database: every conditional update runs under
//! one mutex, so at most one claim per document succeeds.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::store::sort_and_limit;
use crate::core::{CandidateQuery, SchedulerError, Task, TaskId, TaskStore};

struct Entry {
    seq: u64,
    task: Task,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    tasks: HashMap<TaskId, Entry>,
}

/// Mutex-guarded map of task documents.
#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: Mutex<Inner>,
}

impl InMemoryTaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all documents in insertion order.
    pub fn snapshot(&self) -> Vec<Task> {
        let inner = self.inner.lock();
        let mut entries: Vec<&Entry> = inner.tasks.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.task.clone()).collect()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: Task) -> Result<TaskId, SchedulerError> {
        let mut inner = self.inner.lock();
        let id = task.id;
        if inner.tasks.contains_key(&id) {
            return Err(SchedulerError::StoreUnavailable(format!("duplicate task id {id}")));
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(id, Entry { seq, task });
        Ok(id)
    }

    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Task>, SchedulerError> {
        let matching: Vec<Task> = {
            let inner = self.inner.lock();
            let mut entries: Vec<&Entry> = inner
                .tasks
                .values()
                .filter(|e| query.matches(&e.task))
                .collect();
            entries.sort_by_key(|e| e.seq);
            entries.into_iter().map(|e| e.task.clone()).collect()
        };
        Ok(sort_and_limit(matching, query.limit))
    }

    async fn claim(&self, id: TaskId, now_ms: u128) -> Result<bool, SchedulerError> {
        let mut inner = self.inner.lock();
        match inner.tasks.get_mut(&id) {
            Some(entry) if entry.task.assigned_at_ms.is_none() => {
                entry.task.assigned_at_ms = Some(now_ms);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn reschedule(&self, id: TaskId, run_at_ms: u128) -> Result<bool, SchedulerError> {
        let mut inner = self.inner.lock();
        Ok(inner.tasks.get_mut(&id).is_some_and(|entry| {
            entry.task.run_at_ms = run_at_ms;
            entry.task.assigned_at_ms = None;
            true
        }))
    }

    async fn delete(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.inner.lock().tasks.remove(&id);
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, SchedulerError> {
        Ok(self.inner.lock().tasks.get(&id).map(|e| e.task.clone()))
    }

    async fn release_stale(&self, cutoff_ms: u128) -> Result<usize, SchedulerError> {
        let mut inner = self.inner.lock();
        let mut released = 0;
        for entry in inner.tasks.values_mut() {
            if entry.task.assigned_at_ms.is_some_and(|at| at < cutoff_ms) {
                entry.task.assigned_at_ms = None;
                released += 1;
            }
        }
        Ok(released)
    }
}
