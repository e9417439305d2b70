//! Fluent construction of persisted tasks.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::{MethodRegistry, SchedulerError, Task, TaskId, TaskStore};
use crate::util::clock::{after_ms, now_ms, to_epoch_ms};

/// Accumulates the fields of a new task and persists it on [`TaskBuilder::build`].
///
/// Setters never fail. A bad method name or due time is remembered and
/// reported by `build`; a later call to the same setter replaces both the
/// value and the remembered error.
///
/// ```rust,ignore
/// let task = scheduler
///     .builder()
///     .method("send-reminder", task_args![42, {"foo": "bar"}])
///     .timeout(Duration::from_secs(5))
///     .meta(json!({"tenant": "acme"}))
///     .build()
///     .await?;
/// ```
#[must_use = "a task is only stored once `build` is awaited"]
pub struct TaskBuilder {
    registry: MethodRegistry,
    store: Arc<dyn TaskStore>,
    audit: Option<(Arc<dyn AuditSink>, String)>,
    method: Option<String>,
    method_error: Option<SchedulerError>,
    args: Vec<Value>,
    run_at: Option<Result<u128, SchedulerError>>,
    meta: Option<Value>,
}

impl TaskBuilder {
    /// Builder validating against `registry` and inserting into `store`.
    ///
    /// Processes that only enqueue work can use this without running a
    /// scheduler, as long as their registry lists the method names.
    pub fn new(registry: MethodRegistry, store: Arc<dyn TaskStore>) -> Self {
        Self {
            registry,
            store,
            audit: None,
            method: None,
            method_error: None,
            args: Vec::new(),
            run_at: None,
            meta: None,
        }
    }

    pub(crate) fn with_audit(mut self, sink: Option<Arc<dyn AuditSink>>, worker: &str) -> Self {
        self.audit = sink.map(|s| (s, worker.to_string()));
        self
    }

    /// Set the method name and its positional arguments.
    pub fn method(mut self, name: impl Into<String>, args: Vec<Value>) -> Self {
        let name = name.into();
        self.method_error = if name.is_empty() {
            Some(SchedulerError::InvalidMethod("method name is empty".into()))
        } else if self.registry.contains(&name) {
            None
        } else {
            Some(SchedulerError::InvalidMethod(format!("`{name}` is not registered")))
        };
        self.method = Some(name);
        self.args = args;
        self
    }

    /// Replace the positional arguments.
    pub fn args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    /// Due at an absolute time.
    pub fn run_at(mut self, at: SystemTime) -> Self {
        self.run_at = Some(to_epoch_ms(at));
        self
    }

    /// Due at an absolute time in milliseconds since the epoch.
    pub fn run_at_ms(mut self, run_at_ms: u128) -> Self {
        self.run_at = Some(Ok(run_at_ms));
        self
    }

    /// Due `delay` from now. The clock is read when this is called, not at `build`.
    pub fn timeout(mut self, delay: Duration) -> Self {
        self.run_at = Some(after_ms(delay));
        self
    }

    /// Attach opaque metadata, visible to the handler through its context.
    pub fn meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Validate and insert the task. Returns the stored document.
    ///
    /// Without a due time the task is due immediately.
    pub async fn build(self) -> Result<Task, SchedulerError> {
        if let Some(err) = self.method_error {
            return Err(err);
        }
        let Some(method) = self.method else {
            return Err(SchedulerError::InvalidMethod("no method set".into()));
        };
        // the registry may have been replaced between `method` and `build`
        if !self.registry.contains(&method) {
            return Err(SchedulerError::InvalidMethod(format!("`{method}` is not registered")));
        }
        let run_at_ms = match self.run_at {
            Some(run_at) => run_at?,
            None => now_ms(),
        };

        let task = Task {
            id: TaskId::generate(),
            method,
            args: self.args,
            run_at_ms,
            assigned_at_ms: None,
            meta: self.meta,
        };
        self.store.insert(task.clone()).await?;
        tracing::debug!(task_id = %task.id, method = %task.method, run_at_ms, "task created");

        if let Some((sink, worker)) = &self.audit {
            sink.record(build_audit_event(
                Some(task.id),
                Some(&task.method),
                worker.as_str(),
                AuditAction::Created,
                None,
            ));
        }
        Ok(task)
    }
}

impl std::fmt::Debug for TaskBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskBuilder")
            .field("method", &self.method)
            .field("args", &self.args)
            .field("run_at", &self.run_at)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
