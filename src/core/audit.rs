//! Audit trail of task lifecycle transitions.
//!
//! The scheduler records one event per transition when a sink is attached.
//! Sinks are synchronous and must be cheap; they run inside the poll tick and
//! the dispatch task.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::TaskId;
use crate::util::clock::now_ms;

/// Lifecycle transition being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Task inserted by the builder.
    Created,
    /// This worker won the claim.
    Claimed,
    /// Handler returned normally; task deleted.
    Completed,
    /// Handler failed or panicked; task deleted.
    Failed,
    /// Handler moved the task to a new due time.
    Rescheduled,
    /// Stale claim cleared by an operator.
    Released,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Rescheduled => "rescheduled",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Related task, if the event concerns a single task.
    pub task_id: Option<TaskId>,
    /// Method name, if known.
    pub method: Option<String>,
    /// Worker that performed the transition.
    pub worker: String,
    /// Transition.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context (error message, new due time, ...).
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// Bounded in-memory sink for tests and inspection.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a sink that keeps the most recent `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events with the given action.
    pub fn with_action(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that forwards events to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::debug!(
            target: "synced_tasks::audit",
            action = %event.action,
            task_id = ?event.task_id,
            method = ?event.method,
            worker = %event.worker,
            detail = ?event.detail,
            "audit"
        );
    }
}

/// Helper to build an audit event stamped with the current time.
pub fn build_audit_event(
    task_id: Option<TaskId>,
    method: Option<&str>,
    worker: impl Into<String>,
    action: AuditAction,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        task_id,
        method: method.map(ToString::to_string),
        worker: worker.into(),
        action,
        created_at_ms: now_ms(),
        detail,
    }
}
