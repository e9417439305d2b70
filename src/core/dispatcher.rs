//! Execution of claimed tasks and in-flight accounting.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Notify;

use crate::core::{SchedulerError, Task, TaskContext, TaskHandler, TaskOutcome, TaskStore};

/// Count of handlers currently executing in this process.
///
/// A slot is taken right after a successful claim and given back when the
/// dispatch future ends, whatever the handler did.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    pub(crate) fn current(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn acquire(self: &Arc<Self>) -> Slot {
        self.count.fetch_add(1, Ordering::AcqRel);
        Slot(Arc::clone(self))
    }

    /// Resolve once no slot is held.
    pub(crate) async fn idle(&self) {
        loop {
            // register before reading the counter so a release in between is not missed
            let notified = self.idle.notified();
            if self.current() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One in-flight execution. Dropping it frees the slot.
pub(crate) struct Slot(Arc<InFlight>);

impl Drop for Slot {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Run `handler` for a claimed task and classify how it ended.
///
/// Handler errors and panics both become [`TaskOutcome::Failed`]. A
/// reschedule recorded on the context wins over a failure, so a handler that
/// delays itself and then errors keeps its task.
pub(crate) async fn execute(store: Arc<dyn TaskStore>, task: Task, handler: Arc<dyn TaskHandler>) -> TaskOutcome {
    let args = task.args.clone();
    let ctx = TaskContext::new(task, store);
    let result = AssertUnwindSafe(handler.call(ctx.clone(), args))
        .catch_unwind()
        .await;

    let failure = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{e:#}")),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    if let Some(run_at_ms) = ctx.rescheduled_to() {
        if let Some(reason) = failure {
            tracing::warn!("task {} failed after rescheduling itself: {}", ctx.id(), reason);
        }
        return TaskOutcome::Rescheduled { run_at_ms };
    }
    match failure {
        None => TaskOutcome::Completed,
        Some(reason) => TaskOutcome::Failed(reason),
    }
}

/// Apply an outcome to the store: delete the task unless it was rescheduled.
pub(crate) async fn settle(store: &dyn TaskStore, task: &Task, outcome: &TaskOutcome) -> Result<(), SchedulerError> {
    if outcome.deletes_task() {
        store.delete(task.id).await?;
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
