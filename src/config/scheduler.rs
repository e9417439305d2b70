//! Scheduler and store backend configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::SchedulerError;

/// Environment variable prefix read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "SYNCED_TASKS_";

/// Store backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackendConfig {
    /// In-memory store, private to this process.
    InMemory,
    /// JSON-lines file store (single process).
    File {
        /// Directory holding the collection file.
        dir: PathBuf,
        /// Collection name; the file is `<dir>/<collection>.jsonl`.
        #[serde(default = "default_collection")]
        collection: String,
    },
    /// SQLite database shareable between processes.
    Sqlite {
        /// Database file.
        path: PathBuf,
    },
}

impl Default for StoreBackendConfig {
    fn default() -> Self {
        Self::InMemory
    }
}

fn default_collection() -> String {
    "synced_tasks".into()
}

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds between poll ticks.
    pub poll_interval_ms: u64,
    /// Maximum candidates fetched per tick.
    pub batch_size: usize,
    /// Maximum handlers executing at once in this process.
    pub concurrency_limit: usize,
    /// Identifier of this worker in logs and audit events.
    pub worker_id: String,
    /// Store backend.
    pub store: StoreBackendConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            batch_size: 100,
            concurrency_limit: 100,
            worker_id: default_worker_id(),
            store: StoreBackendConfig::default(),
        }
    }
}

fn default_worker_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("worker-{}", &id[..8])
}

impl SchedulerConfig {
    /// Poll interval as a `Duration`.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.poll_interval_ms == 0 {
            return Err(SchedulerError::InvalidConfig("poll_interval_ms must be greater than 0".into()));
        }
        if self.batch_size == 0 {
            return Err(SchedulerError::InvalidConfig("batch_size must be greater than 0".into()));
        }
        if self.concurrency_limit == 0 {
            return Err(SchedulerError::InvalidConfig("concurrency_limit must be greater than 0".into()));
        }
        if self.worker_id.trim().is_empty() {
            return Err(SchedulerError::InvalidConfig("worker_id must not be empty".into()));
        }
        match &self.store {
            StoreBackendConfig::InMemory => {}
            StoreBackendConfig::File { dir, collection } => {
                if dir.as_os_str().is_empty() || collection.is_empty() {
                    return Err(SchedulerError::InvalidConfig("file store needs a dir and a collection".into()));
                }
            }
            StoreBackendConfig::Sqlite { path } => {
                if path.as_os_str().is_empty() {
                    return Err(SchedulerError::InvalidConfig("sqlite store needs a path".into()));
                }
            }
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, SchedulerError> {
        let cfg: Self = serde_json::from_str(input)
            .map_err(|e| SchedulerError::InvalidConfig(format!("parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `SYNCED_TASKS_*` environment variables,
    /// loading a `.env` file first if one exists. Unset variables keep
    /// their defaults.
    ///
    /// | variable | field |
    /// |---|---|
    /// | `SYNCED_TASKS_POLL_INTERVAL_MS` | `poll_interval_ms` |
    /// | `SYNCED_TASKS_BATCH_SIZE` | `batch_size` |
    /// | `SYNCED_TASKS_CONCURRENCY_LIMIT` | `concurrency_limit` |
    /// | `SYNCED_TASKS_WORKER_ID` | `worker_id` |
    /// | `SYNCED_TASKS_STORE` (`in_memory`, `file`, `sqlite`) | `store` |
    /// | `SYNCED_TASKS_STORE_PATH` | file dir or sqlite path |
    pub fn from_env() -> Result<Self, SchedulerError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SchedulerConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SchedulerError> {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut cfg = Self::default();

        if let Some(v) = get("POLL_INTERVAL_MS") {
            cfg.poll_interval_ms = parse_var("POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("BATCH_SIZE") {
            cfg.batch_size = parse_var("BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("CONCURRENCY_LIMIT") {
            cfg.concurrency_limit = parse_var("CONCURRENCY_LIMIT", &v)?;
        }
        if let Some(v) = get("WORKER_ID") {
            cfg.worker_id = v;
        }
        let path = get("STORE_PATH").map(PathBuf::from);
        cfg.store = match get("STORE").as_deref() {
            None | Some("in_memory") => StoreBackendConfig::InMemory,
            Some("file") => StoreBackendConfig::File {
                dir: path.unwrap_or_default(),
                collection: default_collection(),
            },
            Some("sqlite") => StoreBackendConfig::Sqlite {
                path: path.unwrap_or_default(),
            },
            Some(other) => {
                return Err(SchedulerError::InvalidConfig(format!("unknown store backend `{other}`")));
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, SchedulerError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| SchedulerError::InvalidConfig(format!("{ENV_PREFIX}{name}={value}: {e}")))
}
