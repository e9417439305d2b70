//! Narrow interface the scheduler requires from the shared task collection.

use async_trait::async_trait;

use crate::core::{SchedulerError, Task, TaskId};

/// Filter for the poll query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Only tasks whose method is one of these names.
    pub methods: Vec<String>,
    /// Only tasks with `run_at_ms <= now_ms`.
    pub now_ms: u128,
    /// Maximum number of documents returned.
    pub limit: usize,
}

impl CandidateQuery {
    /// Whether `task` satisfies the query predicate (ignoring the limit).
    pub fn matches(&self, task: &Task) -> bool {
        task.is_eligible(self.now_ms) && self.methods.iter().any(|m| m == &task.method)
    }
}

/// Sort candidates the way every backend must return them: `run_at_ms`
/// descending, then truncate to `limit`.
///
/// Ties keep their input order (stable sort).
pub fn sort_and_limit(mut tasks: Vec<Task>, limit: usize) -> Vec<Task> {
    tasks.sort_by(|a, b| b.run_at_ms.cmp(&a.run_at_ms));
    tasks.truncate(limit);
    tasks
}

/// Persistent collection shared by every worker process.
///
/// Implementations own no scheduling logic. `claim` is the single arbiter of
/// which worker runs a task: it must succeed for at most one caller per
/// unclaimed document, and report success only when a document was modified.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a new document and return its id.
    async fn insert(&self, task: Task) -> Result<TaskId, SchedulerError>;

    /// Unclaimed, due tasks for the given methods, `run_at_ms` descending, limited.
    async fn find_candidates(&self, query: &CandidateQuery) -> Result<Vec<Task>, SchedulerError>;

    /// Set `assigned_at_ms = now_ms` iff the document exists and is unclaimed.
    async fn claim(&self, id: TaskId, now_ms: u128) -> Result<bool, SchedulerError>;

    /// Set `run_at_ms` and clear the claim marker, whatever its state.
    /// Returns `false` if no document matched.
    async fn reschedule(&self, id: TaskId, run_at_ms: u128) -> Result<bool, SchedulerError>;

    /// Remove a document. Deleting a missing id is not an error.
    async fn delete(&self, id: TaskId) -> Result<(), SchedulerError>;

    /// Point lookup.
    async fn find_by_id(&self, id: TaskId) -> Result<Option<Task>, SchedulerError>;

    /// Clear claim markers set before `cutoff_ms`. Returns how many were released.
    async fn release_stale(&self, cutoff_ms: u128) -> Result<usize, SchedulerError>;
}
