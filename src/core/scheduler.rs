//! Poll loop, claiming, and the public scheduler surface.
//!
//! Every process sharing a store runs its own `Scheduler`. Each tick asks the
//! store for due, unclaimed tasks of the registered methods, claims them one
//! by one with a conditional update, and hands each won claim to a spawned
//! dispatch future. Only the claim decides who runs a task; the candidate
//! query is advisory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerConfig;
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::dispatcher::{execute, settle, InFlight};
use crate::core::{
    CandidateQuery, MethodRegistry, SchedulerError, Spawn, Task, TaskBuilder, TaskHandler, TaskId, TaskOutcome,
    TaskStore,
};
use crate::runtime::TokioSpawner;
use crate::util::clock::now_ms;

/// What one poll tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollReport {
    /// Another tick was still running in this process.
    Skipped,
    /// The concurrency limit was reached; the store was not queried.
    Saturated,
    /// The store was queried.
    Polled {
        /// Candidates returned by the query.
        candidates: usize,
        /// Candidates this worker claimed and dispatched.
        claimed: usize,
    },
}

struct Shared<S> {
    store: Arc<dyn TaskStore>,
    registry: MethodRegistry,
    config: RwLock<SchedulerConfig>,
    audit: RwLock<Option<Arc<dyn AuditSink>>>,
    in_flight: Arc<InFlight>,
    is_processing: AtomicBool,
    spawner: S,
}

/// Resets the processing flag when a tick ends, including on error.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Store-backed deferred task scheduler.
///
/// Cheap operations (`register`, `configure`, `start`, `stop`) take `&self`;
/// share a scheduler behind an `Arc` if several owners need it.
pub struct Scheduler<S = TokioSpawner>
where
    S: Spawn + Send + Sync + 'static,
{
    shared: Arc<Shared<S>>,
    poller: Mutex<Option<watch::Sender<bool>>>,
}

impl<S> Scheduler<S>
where
    S: Spawn + Send + Sync + 'static,
{
    /// Create a stopped scheduler over `store` with an empty registry.
    pub fn new(store: Arc<dyn TaskStore>, config: SchedulerConfig, spawner: S) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                store,
                registry: MethodRegistry::new(),
                config: RwLock::new(config),
                audit: RwLock::new(None),
                in_flight: Arc::new(InFlight::default()),
                is_processing: AtomicBool::new(false),
                spawner,
            }),
            poller: Mutex::new(None),
        })
    }

    /// Attach an audit sink (builder style).
    #[must_use]
    pub fn with_audit(self, sink: Arc<dyn AuditSink>) -> Self {
        self.set_audit(sink);
        self
    }

    /// Attach or replace the audit sink.
    pub fn set_audit(&self, sink: Arc<dyn AuditSink>) {
        *self.shared.audit.write() = Some(sink);
    }

    /// Update the tunables. A new poll interval is picked up by the next
    /// [`Scheduler::start`]; batch size and concurrency limit apply from the
    /// next tick.
    pub fn configure(
        &self,
        poll_interval_ms: u64,
        batch_size: usize,
        concurrency_limit: usize,
    ) -> Result<(), SchedulerError> {
        let mut next = self.shared.config.read().clone();
        next.poll_interval_ms = poll_interval_ms;
        next.batch_size = batch_size;
        next.concurrency_limit = concurrency_limit;
        next.validate()?;
        *self.shared.config.write() = next;
        tracing::info!(poll_interval_ms, batch_size, concurrency_limit, "scheduler reconfigured");
        Ok(())
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> SchedulerConfig {
        self.shared.config.read().clone()
    }

    /// Start polling. Returns `false` if the loop was already running.
    ///
    /// The first tick fires immediately.
    pub fn start(&self) -> bool {
        let mut poller = self.poller.lock();
        if poller.is_some() {
            return false;
        }
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let (interval, worker) = {
            let cfg = shared.config.read();
            (cfg.poll_interval(), cfg.worker_id.clone())
        };

        self.shared.spawner.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = shared.poll_once().await {
                            tracing::error!("poll tick failed: {}", e);
                        }
                    }
                }
            }
            tracing::info!("poll loop for {} stopped", worker);
        });

        *poller = Some(stop_tx);
        tracing::info!(poll_interval_ms = interval.as_millis(), "scheduler started");
        true
    }

    /// Stop polling. Returns `false` if the loop was not running.
    ///
    /// In-flight handlers keep running; use [`Scheduler::wait_idle`] to wait
    /// for them.
    pub fn stop(&self) -> bool {
        let Some(stop_tx) = self.poller.lock().take() else {
            return false;
        };
        let _ = stop_tx.send(true);
        tracing::info!("scheduler stopped");
        true
    }

    /// Whether the poll loop is running.
    pub fn is_running(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Register several handlers at once. Existing names are replaced.
    pub fn register_methods<I, K>(&self, methods: I)
    where
        I: IntoIterator<Item = (K, Arc<dyn TaskHandler>)>,
        K: Into<String>,
    {
        self.shared.registry.register_methods(methods);
    }

    /// Register one handler, replacing any handler with the same name.
    pub fn register(&self, name: impl Into<String>, handler: impl TaskHandler + 'static) {
        self.shared.registry.register(name, handler);
    }

    /// The method registry.
    pub fn registry(&self) -> &MethodRegistry {
        &self.shared.registry
    }

    /// The task store.
    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.shared.store
    }

    /// Start building a task.
    pub fn builder(&self) -> TaskBuilder {
        let audit = self.shared.audit.read().clone();
        let worker = self.shared.config.read().worker_id.clone();
        TaskBuilder::new(self.shared.registry.clone(), Arc::clone(&self.shared.store)).with_audit(audit, &worker)
    }

    /// Schedule `method` to run at `at`.
    pub async fn run_at(&self, method: &str, at: SystemTime, args: Vec<Value>) -> Result<Task, SchedulerError> {
        self.builder().method(method, args).run_at(at).build().await
    }

    /// Schedule `method` to run `delay` from now.
    pub async fn set_timeout(&self, method: &str, delay: Duration, args: Vec<Value>) -> Result<Task, SchedulerError> {
        self.builder().method(method, args).timeout(delay).build().await
    }

    /// Fetch a task by id. `None` once it has completed or failed.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>, SchedulerError> {
        self.shared.store.find_by_id(id).await
    }

    /// Run one poll tick now, independent of the poll loop.
    pub async fn poll_once(&self) -> Result<PollReport, SchedulerError> {
        self.shared.poll_once().await
    }

    /// Number of handlers executing in this process.
    pub fn concurrent_tasks(&self) -> usize {
        self.shared.in_flight.current()
    }

    /// Wait until no handler is executing. Returns `false` on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.shared.in_flight.idle())
            .await
            .is_ok()
    }

    /// Clear claims older than `max_age` so other workers can pick the tasks
    /// up again. Meant for operators after a worker crashed mid-task; nothing
    /// calls it automatically.
    pub async fn release_stale_claims(&self, max_age: Duration) -> Result<usize, SchedulerError> {
        let cutoff = now_ms().saturating_sub(max_age.as_millis());
        let released = self.shared.store.release_stale(cutoff).await?;
        if released > 0 {
            tracing::warn!("released {} stale claims older than {:?}", released, max_age);
            self.shared
                .record(None, None, AuditAction::Released, Some(format!("{released} claims")));
        }
        Ok(released)
    }
}

impl<S> Shared<S>
where
    S: Spawn + Send + Sync + 'static,
{
    async fn poll_once(self: &Arc<Self>) -> Result<PollReport, SchedulerError> {
        if self
            .is_processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("previous tick still running, skipping");
            return Ok(PollReport::Skipped);
        }
        let _guard = TickGuard(&self.is_processing);

        let (batch_size, concurrency_limit) = {
            let cfg = self.config.read();
            (cfg.batch_size, cfg.concurrency_limit)
        };
        let available = concurrency_limit.saturating_sub(self.in_flight.current());
        if available == 0 {
            tracing::debug!("concurrency limit {} reached", concurrency_limit);
            return Ok(PollReport::Saturated);
        }

        let methods = self.registry.names();
        if methods.is_empty() {
            return Ok(PollReport::Polled { candidates: 0, claimed: 0 });
        }
        let query = CandidateQuery {
            methods,
            now_ms: now_ms(),
            limit: available.min(batch_size),
        };
        let candidates = self.store.find_candidates(&query).await?;
        let found = candidates.len();

        let mut claimed = 0;
        for mut task in candidates {
            let Some(handler) = self.registry.lookup(&task.method) else {
                continue;
            };
            let claimed_at = now_ms();
            if !self.store.claim(task.id, claimed_at).await? {
                tracing::debug!("task {} claimed by another worker", task.id);
                continue;
            }
            task.assigned_at_ms = Some(claimed_at);
            claimed += 1;
            self.record(Some(task.id), Some(&task.method), AuditAction::Claimed, None);
            self.dispatch(task, handler);
        }

        if found > 0 {
            tracing::debug!("tick claimed {} of {} candidates", claimed, found);
        }
        Ok(PollReport::Polled {
            candidates: found,
            claimed,
        })
    }

    fn dispatch(self: &Arc<Self>, task: Task, handler: Arc<dyn TaskHandler>) {
        let slot = self.in_flight.acquire();
        let shared = Arc::clone(self);

        self.spawner.spawn(async move {
            let _slot = slot;
            tracing::debug!("executing task {} ({})", task.id, task.method);
            let outcome = execute(Arc::clone(&shared.store), task.clone(), handler).await;

            let (action, detail) = match &outcome {
                TaskOutcome::Completed => {
                    tracing::info!("task {} completed", task.id);
                    (AuditAction::Completed, None)
                }
                TaskOutcome::Rescheduled { run_at_ms } => {
                    tracing::info!("task {} rescheduled to {}", task.id, run_at_ms);
                    (AuditAction::Rescheduled, Some(format!("run_at_ms={run_at_ms}")))
                }
                TaskOutcome::Failed(reason) => {
                    let err = SchedulerError::HandlerFailed(format!("{} ({}): {reason}", task.id, task.method));
                    tracing::error!("{}", err);
                    (AuditAction::Failed, Some(reason.clone()))
                }
            };

            if let Err(e) = settle(shared.store.as_ref(), &task, &outcome).await {
                tracing::error!("failed to remove task {}: {}", task.id, e);
            }
            shared.record(Some(task.id), Some(&task.method), action, detail);
        });
    }

    fn record(&self, task_id: Option<TaskId>, method: Option<&str>, action: AuditAction, detail: Option<String>) {
        let Some(sink) = self.audit.read().clone() else {
            return;
        };
        let worker = self.config.read().worker_id.clone();
        sink.record(build_audit_event(task_id, method, worker, action, detail));
    }
}

impl Scheduler<TokioSpawner> {
    /// Scheduler on the current tokio runtime.
    pub fn with_store(store: Arc<dyn TaskStore>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::new(store, config, TokioSpawner::current()?)
    }
}

impl<S> Drop for Scheduler<S>
where
    S: Spawn + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(stop_tx) = self.poller.get_mut().take() {
            let _ = stop_tx.send(true);
        }
    }
}

impl<S> std::fmt::Debug for Scheduler<S>
where
    S: Spawn + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &*self.shared.config.read())
            .field("methods", &self.shared.registry.names())
            .field("concurrent_tasks", &self.concurrent_tasks())
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}
