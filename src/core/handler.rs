//! Handler contract and the per-execution task context.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::core::{AppResult, SchedulerError, Task, TaskId, TaskStore};
use crate::util::clock::{after_ms, to_epoch_ms};

/// Code registered under a method name.
///
/// The handler receives a [`TaskContext`] for the claimed task and the task's
/// positional arguments. Returning `Err` is logged and the task is deleted
/// anyway, unless the handler rescheduled it first.
///
/// Closures and `async fn`s of the shape
/// `Fn(TaskContext, Vec<Value>) -> impl Future<Output = AppResult<()>>`
/// implement this trait directly.
///
/// ```rust,ignore
/// scheduler.register("send-reminder", |ctx: TaskContext, args: Vec<Value>| async move {
///     if !deliver(&args[0]).await? {
///         ctx.delay(Duration::from_secs(30)).await?;
///     }
///     Ok(())
/// });
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the task.
    async fn call(&self, ctx: TaskContext, args: Vec<Value>) -> AppResult<()>;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(TaskContext, Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    async fn call(&self, ctx: TaskContext, args: Vec<Value>) -> AppResult<()> {
        (self)(ctx, args).await
    }
}

/// How one execution of a task ended, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Handler returned `Ok`; the task is deleted.
    Completed,
    /// Handler moved the task to a new due time; the task is kept.
    Rescheduled {
        /// New due time in milliseconds since the epoch.
        run_at_ms: u128,
    },
    /// Handler returned an error or panicked; the task is deleted.
    Failed(String),
}

impl TaskOutcome {
    /// Whether the dispatcher should delete the task.
    pub const fn deletes_task(&self) -> bool {
        !matches!(self, Self::Rescheduled { .. })
    }
}

struct ContextInner {
    task: Task,
    store: Arc<dyn TaskStore>,
    rescheduled_to: Mutex<Option<u128>>,
}

/// Handle to the claimed task for the duration of one execution.
///
/// Cheap to clone. `delay` and `reschedule` write the new due time to the
/// store immediately and tell the dispatcher not to delete the task.
#[derive(Clone)]
pub struct TaskContext {
    inner: Arc<ContextInner>,
}

impl TaskContext {
    pub(crate) fn new(task: Task, store: Arc<dyn TaskStore>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                task,
                store,
                rescheduled_to: Mutex::new(None),
            }),
        }
    }

    /// Id of the executing task.
    pub fn id(&self) -> TaskId {
        self.inner.task.id
    }

    /// Method name the task was registered under.
    pub fn method(&self) -> &str {
        &self.inner.task.method
    }

    /// Opaque metadata attached at creation.
    pub fn meta(&self) -> Option<&Value> {
        self.inner.task.meta.as_ref()
    }

    /// Due time this execution was scheduled for.
    pub fn run_at_ms(&self) -> u128 {
        self.inner.task.run_at_ms
    }

    /// When this worker claimed the task.
    pub fn assigned_at_ms(&self) -> Option<u128> {
        self.inner.task.assigned_at_ms
    }

    /// Snapshot of the task document as claimed.
    pub fn task(&self) -> &Task {
        &self.inner.task
    }

    /// Run the task again after `delay` instead of deleting it.
    ///
    /// Returns whether a stored document was updated; `false` means the task
    /// had already been removed, which is not an error.
    pub async fn delay(&self, delay: Duration) -> Result<bool, SchedulerError> {
        let run_at_ms = after_ms(delay)?;
        self.reschedule_ms(run_at_ms).await
    }

    /// Run the task again at `at` instead of deleting it.
    pub async fn reschedule(&self, at: SystemTime) -> Result<bool, SchedulerError> {
        let run_at_ms = to_epoch_ms(at)?;
        self.reschedule_ms(run_at_ms).await
    }

    /// Reschedule to an absolute due time in milliseconds since the epoch.
    pub async fn reschedule_ms(&self, run_at_ms: u128) -> Result<bool, SchedulerError> {
        let id = self.id();
        let matched = self.inner.store.reschedule(id, run_at_ms).await?;
        *self.inner.rescheduled_to.lock() = Some(run_at_ms);
        if matched {
            tracing::debug!(task_id = %id, run_at_ms, "task rescheduled");
        } else {
            tracing::warn!(task_id = %id, run_at_ms, "reschedule matched no document");
        }
        Ok(matched)
    }

    /// Due time recorded by the last successful reschedule call, if any.
    pub fn rescheduled_to(&self) -> Option<u128> {
        *self.inner.rescheduled_to.lock()
    }
}

impl std::fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskContext")
            .field("task", &self.inner.task)
            .field("rescheduled_to", &self.rescheduled_to())
            .finish_non_exhaustive()
    }
}
