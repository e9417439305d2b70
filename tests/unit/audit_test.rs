//! Tests for audit sinks

use synced_tasks::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, TaskId, TracingAuditSink};

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let id = TaskId::generate();

    sink.record(build_audit_event(Some(id), Some("job"), "w1", AuditAction::Claimed, None));
    assert_eq!(sink.events().len(), 1);

    let events = sink.events();
    assert_eq!(events[0].task_id, Some(id));
    assert_eq!(events[0].method.as_deref(), Some("job"));
    assert_eq!(events[0].action, AuditAction::Claimed);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    for action in [AuditAction::Created, AuditAction::Claimed, AuditAction::Failed] {
        sink.record(build_audit_event(None, None, "w1", action, None));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, AuditAction::Claimed); // first one popped
    assert_eq!(sink.with_action(AuditAction::Failed).len(), 1);
}

#[test]
fn test_zero_capacity_sink_keeps_nothing() {
    let sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(None, None, "w1", AuditAction::Released, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_audit_event_serializes() {
    let event = build_audit_event(None, Some("job"), "w2", AuditAction::Rescheduled, Some("run_at_ms=5".into()));
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "rescheduled");
    assert_eq!(json["worker"], "w2");
    assert!(event.created_at_ms > 0);
}

#[test]
fn test_tracing_sink_accepts_events() {
    TracingAuditSink.record(build_audit_event(None, None, "w1", AuditAction::Completed, None));
}
