//! Benchmarks for the claim path.
//!
//! Benchmarks cover:
//! - Candidate queries over collections of different sizes
//! - Claiming every due task (in-memory and SQLite)
//! - Full poll ticks with dispatch on the tokio runtime

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use synced_tasks::core::{CandidateQuery, Scheduler, Task, TaskContext, TaskId, TaskStore};
use synced_tasks::infra::InMemoryTaskStore;
use synced_tasks::SchedulerConfig;

use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn build_task(method: &str, run_at_ms: u128) -> Task {
    Task {
        id: TaskId::generate(),
        method: method.into(),
        args: vec![json!(run_at_ms), json!({"foo": "bar"})],
        run_at_ms,
        assigned_at_ms: None,
        meta: None,
    }
}

async fn fill(store: &dyn TaskStore, size: u64) -> Vec<TaskId> {
    let tasks: Vec<Task> = {
        let mut rng = rand::rng();
        (0..size)
            .map(|i| {
                let method = if i % 4 == 0 { "other" } else { "job" };
                build_task(method, u128::from(rng.random_range(0..10_000u64)))
            })
            .collect()
    };
    let mut ids = Vec::with_capacity(tasks.len());
    for task in tasks {
        ids.push(store.insert(task).await.unwrap());
    }
    ids
}

async fn noop(_ctx: TaskContext, _args: Vec<Value>) -> anyhow::Result<()> {
    Ok(())
}

// ============================================================================
// Store Benchmarks
// ============================================================================

fn bench_find_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_candidates");

    for size in [100, 1_000, 10_000] {
        let rt = Runtime::new().unwrap();
        let store = InMemoryTaskStore::new();
        rt.block_on(fill(&store, size));
        let query = CandidateQuery {
            methods: vec!["job".into()],
            now_ms: 5_000,
            limit: 100,
        };

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.to_async(&rt).iter(|| async {
                black_box(store.find_candidates(&query).await.unwrap());
            });
        });
    }
    group.finish();
}

fn bench_claim_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("claim_all");

    for size in [100u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::new("memory", size), &size, |b, &size| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let store = InMemoryTaskStore::new();
                for id in fill(&store, size).await {
                    black_box(store.claim(id, 1).await.unwrap());
                }
            });
        });

        #[cfg(feature = "sqlite")]
        group.bench_with_input(BenchmarkId::new("sqlite", size), &size, |b, &size| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let store = synced_tasks::infra::SqliteTaskStore::open_in_memory().unwrap();
                for id in fill(&store, size).await {
                    black_box(store.claim(id, 1).await.unwrap());
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks (Async)
// ============================================================================

fn bench_poll_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("poll_tick");

    for batch in [10usize, 100] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.to_async(Runtime::new().unwrap()).iter(|| async move {
                let store = Arc::new(InMemoryTaskStore::new());
                let config = SchedulerConfig {
                    batch_size: batch,
                    ..SchedulerConfig::default()
                };
                let scheduler = Scheduler::with_store(store.clone(), config).unwrap();
                scheduler.register("job", noop);
                for _ in 0..batch {
                    store.insert(build_task("job", 0)).await.unwrap();
                }

                black_box(scheduler.poll_once().await.unwrap());
                scheduler.wait_idle(Duration::from_secs(5)).await;
            });
        });
    }
    group.finish();
}

criterion_group!(store_benches, bench_find_candidates, bench_claim_all);

criterion_group!(scheduler_benches, bench_poll_tick);

criterion_main!(store_benches, scheduler_benches);
