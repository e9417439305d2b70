//! End-to-end runs against every store backend, built from configuration.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synced_tasks::core::{PollReport, TaskContext};
use synced_tasks::{build_scheduler, task_args, SchedulerConfig, StoreBackendConfig};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("synced-tasks-{name}-{}", uuid::Uuid::new_v4()))
}

fn config(store: StoreBackendConfig) -> SchedulerConfig {
    SchedulerConfig {
        poll_interval_ms: 10,
        store,
        ..SchedulerConfig::default()
    }
}

/// Schedule a task, reopen the store with a fresh scheduler, and run it there.
async fn survives_restart(store: StoreBackendConfig) {
    let cfg = config(store);
    let hits = Arc::new(AtomicUsize::new(0));
    let register = |scheduler: &synced_tasks::Scheduler| {
        let hits = Arc::clone(&hits);
        scheduler.register("persisted", move |ctx: TaskContext, args: Vec<Value>| {
            let hits = Arc::clone(&hits);
            async move {
                anyhow::ensure!(args == vec![json!("payload")], "bad args {args:?}");
                anyhow::ensure!(ctx.meta() == Some(&json!({"source": "first"})), "meta lost");
                hits.fetch_add(1, Ordering::SeqCst);
                Ok::<(), anyhow::Error>(())
            }
        });
    };

    let task = {
        let first = build_scheduler(&cfg).unwrap();
        register(&first);
        first
            .builder()
            .method("persisted", task_args!["payload"])
            .meta(json!({"source": "first"}))
            .build()
            .await
            .unwrap()
    };

    let second = build_scheduler(&cfg).unwrap();
    register(&second);
    let stored = second.get_task(task.id).await.unwrap().expect("task persisted");
    assert_eq!(stored, task);

    let report = second.poll_once().await.unwrap();
    assert_eq!(report, PollReport::Polled { candidates: 1, claimed: 1 });
    assert!(second.wait_idle(Duration::from_secs(2)).await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(second.get_task(task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = temp_path("file");
    survives_restart(StoreBackendConfig::File {
        dir: dir.clone(),
        collection: "jobs".into(),
    })
    .await;
    let _ = std::fs::remove_dir_all(dir);
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = temp_path("sqlite");
    survives_restart(StoreBackendConfig::Sqlite {
        path: dir.join("tasks.db"),
    })
    .await;
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_in_memory_store_runs_task() {
    let scheduler = build_scheduler(&config(StoreBackendConfig::InMemory)).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    scheduler.register("job", move |_ctx: TaskContext, _args: Vec<Value>| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), anyhow::Error>(())
        }
    });

    scheduler
        .run_at("job", std::time::SystemTime::now(), task_args![])
        .await
        .unwrap();
    scheduler.poll_once().await.unwrap();
    assert!(scheduler.wait_idle(Duration::from_secs(1)).await);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
