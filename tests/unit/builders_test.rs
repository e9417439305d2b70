//! Tests for builder modules

use std::time::{Duration, SystemTime};

use serde_json::json;
use synced_tasks::builders::{build_scheduler, build_store};
use synced_tasks::config::{SchedulerConfig, StoreBackendConfig};
use synced_tasks::core::{SchedulerError, Task, TaskContext};
use synced_tasks::task_args;

#[tokio::test]
async fn test_build_in_memory_store() {
    let store = build_store(&StoreBackendConfig::InMemory).unwrap();
    let task = Task {
        id: synced_tasks::TaskId::generate(),
        method: "job".into(),
        args: task_args![1],
        run_at_ms: 0,
        assigned_at_ms: None,
        meta: None,
    };
    store.insert(task.clone()).await.unwrap();
    assert_eq!(store.find_by_id(task.id).await.unwrap(), Some(task));
}

#[test]
fn test_build_scheduler_needs_runtime() {
    let err = build_scheduler(&SchedulerConfig::default()).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_task_builder_chain() {
    let scheduler = build_scheduler(&SchedulerConfig::default()).unwrap();
    scheduler.register("job", |_ctx: TaskContext, _args: Vec<serde_json::Value>| async {
        Ok::<(), anyhow::Error>(())
    });

    let task = scheduler
        .builder()
        .method("job", task_args![1])
        .args(task_args!["replaced"])
        .timeout(Duration::from_secs(30))
        .meta(json!({"tenant": "acme"}))
        .build()
        .await
        .unwrap();
    assert_eq!(task.args, vec![json!("replaced")]);
    assert_eq!(task.meta, Some(json!({"tenant": "acme"})));
    assert_eq!(scheduler.get_task(task.id).await.unwrap(), Some(task));
}

#[tokio::test]
async fn test_task_builder_errors() {
    let scheduler = build_scheduler(&SchedulerConfig::default()).unwrap();
    scheduler.register("job", |_ctx: TaskContext, _args: Vec<serde_json::Value>| async {
        Ok::<(), anyhow::Error>(())
    });

    let no_method = scheduler.builder().build().await.unwrap_err();
    assert!(matches!(no_method, SchedulerError::InvalidMethod(_)));

    let empty = scheduler.builder().method("", task_args![]).build().await.unwrap_err();
    assert!(matches!(empty, SchedulerError::InvalidMethod(_)));

    let before_epoch = SystemTime::UNIX_EPOCH - Duration::from_secs(1);
    let bad_time = scheduler
        .builder()
        .method("job", task_args![])
        .run_at(before_epoch)
        .build()
        .await
        .unwrap_err();
    assert!(matches!(bad_time, SchedulerError::InvalidRunAt(_)));

    // the last due-time setter wins
    let task = scheduler
        .builder()
        .method("job", task_args![])
        .run_at(before_epoch)
        .run_at_ms(5)
        .build()
        .await
        .unwrap();
    assert_eq!(task.run_at_ms, 5);
}
