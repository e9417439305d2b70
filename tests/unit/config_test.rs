//! Tests for configuration validation

use std::collections::HashMap;
use std::path::PathBuf;

use synced_tasks::config::{SchedulerConfig, StoreBackendConfig};
use synced_tasks::core::SchedulerError;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = SchedulerConfig::default();
    assert_eq!(config.poll_interval_ms, 1_000);
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.concurrency_limit, 100);
    assert_eq!(config.store, StoreBackendConfig::InMemory);
    assert!(config.worker_id.starts_with("worker-"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_values_rejected() {
    for mutate in [
        (|c: &mut SchedulerConfig| c.poll_interval_ms = 0) as fn(&mut SchedulerConfig),
        |c: &mut SchedulerConfig| c.batch_size = 0,
        |c: &mut SchedulerConfig| c.concurrency_limit = 0,
        |c: &mut SchedulerConfig| c.worker_id = " ".into(),
    ] {
        let mut config = SchedulerConfig::default();
        mutate(&mut config);
        assert!(matches!(config.validate(), Err(SchedulerError::InvalidConfig(_))));
    }
}

#[test]
fn test_store_paths_required() {
    let config = SchedulerConfig {
        store: StoreBackendConfig::Sqlite { path: PathBuf::new() },
        ..SchedulerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_scheduler_config_from_json() {
    let json = r#"{
        "poll_interval_ms": 250,
        "concurrency_limit": 4,
        "worker_id": "billing-1",
        "store": { "kind": "file", "dir": "/var/lib/tasks" }
    }"#;

    let config = SchedulerConfig::from_json_str(json).unwrap();
    assert_eq!(config.poll_interval_ms, 250);
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.concurrency_limit, 4);
    assert_eq!(config.worker_id, "billing-1");
    assert_eq!(
        config.store,
        StoreBackendConfig::File {
            dir: PathBuf::from("/var/lib/tasks"),
            collection: "synced_tasks".into(),
        }
    );
}

#[test]
fn test_from_json_validates() {
    assert!(SchedulerConfig::from_json_str(r#"{"batch_size": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").is_err());
}

#[test]
fn test_from_lookup_reads_prefixed_vars() {
    let config = SchedulerConfig::from_lookup(lookup(&[
        ("SYNCED_TASKS_POLL_INTERVAL_MS", "20"),
        ("SYNCED_TASKS_BATCH_SIZE", " 5 "),
        ("SYNCED_TASKS_WORKER_ID", "w-7"),
        ("SYNCED_TASKS_STORE", "sqlite"),
        ("SYNCED_TASKS_STORE_PATH", "/tmp/tasks.db"),
    ]))
    .unwrap();
    assert_eq!(config.poll_interval_ms, 20);
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.concurrency_limit, 100);
    assert_eq!(config.worker_id, "w-7");
    assert_eq!(
        config.store,
        StoreBackendConfig::Sqlite {
            path: PathBuf::from("/tmp/tasks.db")
        }
    );
}

#[test]
fn test_from_lookup_rejects_bad_values() {
    assert!(SchedulerConfig::from_lookup(lookup(&[("SYNCED_TASKS_BATCH_SIZE", "many")])).is_err());
    assert!(SchedulerConfig::from_lookup(lookup(&[("SYNCED_TASKS_STORE", "redis")])).is_err());
    // file store without a path
    assert!(SchedulerConfig::from_lookup(lookup(&[("SYNCED_TASKS_STORE", "file")])).is_err());
}
