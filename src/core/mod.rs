//! Core scheduling abstractions: tasks, the store contract, handlers, and the poll loop.

pub mod audit;
pub mod builder;
mod dispatcher;
pub mod error;
pub mod handler;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod task;

use std::future::Future;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use builder::TaskBuilder;
pub use error::{AppResult, SchedulerError};
pub use handler::{TaskContext, TaskHandler, TaskOutcome};
pub use registry::MethodRegistry;
pub use scheduler::{PollReport, Scheduler};
pub use store::{CandidateQuery, TaskStore};
pub use task::{Task, TaskId};

/// Abstraction for spawning task execution on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
