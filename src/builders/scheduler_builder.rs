//! Build a store backend and a scheduler from configuration.

use std::sync::Arc;

use crate::config::{SchedulerConfig, StoreBackendConfig};
use crate::core::{Scheduler, SchedulerError, TaskStore};
use crate::infra::{FileTaskStore, InMemoryTaskStore};
use crate::runtime::TokioSpawner;

/// Open the store backend described by `cfg`.
pub fn build_store(cfg: &StoreBackendConfig) -> Result<Arc<dyn TaskStore>, SchedulerError> {
    let store: Arc<dyn TaskStore> = match cfg {
        StoreBackendConfig::InMemory => Arc::new(InMemoryTaskStore::new()),
        StoreBackendConfig::File { dir, collection } => Arc::new(FileTaskStore::open(dir, collection)?),
        #[cfg(feature = "sqlite")]
        StoreBackendConfig::Sqlite { path } => Arc::new(crate::infra::SqliteTaskStore::open(path)?),
        #[cfg(not(feature = "sqlite"))]
        StoreBackendConfig::Sqlite { .. } => {
            return Err(SchedulerError::InvalidConfig(
                "sqlite store requested but the `sqlite` feature is disabled".into(),
            ));
        }
    };
    Ok(store)
}

/// Validate `cfg`, open its store, and create a stopped scheduler on the
/// current tokio runtime.
pub fn build_scheduler(cfg: &SchedulerConfig) -> Result<Scheduler<TokioSpawner>, SchedulerError> {
    cfg.validate()?;
    let store = build_store(&cfg.store)?;
    tracing::debug!(worker = %cfg.worker_id, store = ?cfg.store, "building scheduler");
    Scheduler::with_store(store, cfg.clone())
}
