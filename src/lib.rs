//! # Synced Tasks
//!
//! Store-backed deferred task scheduling shared by any number of worker
//! processes.
//!
//! A task is a document in a shared store naming a registered method, its
//! positional arguments, and a due time. Every process runs a [`Scheduler`]
//! that polls the store for due tasks of the methods it knows, claims each
//! one with an atomic conditional update, and runs the handler. A task runs
//! in exactly one process per due time; the handler may push the due time
//! forward (`ctx.delay(..)`) instead of letting the task be deleted.
//!
//! ## Key Features
//!
//! - **Cross-process exclusivity**: the store's conditional update is the only arbiter
//! - **Bounded concurrency**: at most `concurrency_limit` handlers per process
//! - **Persistent rescheduling**: handlers can move their own task to a later time
//! - **Pluggable stores**: in-memory, JSON-lines file, and SQLite backends
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use synced_tasks::prelude::*;
//!
//! let scheduler = build_scheduler(&SchedulerConfig::from_env()?)?;
//! scheduler.register("send-reminder", |ctx: TaskContext, args: Vec<Value>| async move {
//!     tracing::info!("reminding {} ({:?})", args[0], ctx.meta());
//!     Ok(())
//! });
//! scheduler.start();
//!
//! scheduler
//!     .set_timeout("send-reminder", Duration::from_secs(5), task_args!["ada", {"channel": "email"}])
//!     .await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct stores and schedulers from configuration.
pub mod builders;
/// Configuration models for the scheduler and its store backend.
pub mod config;
/// Core scheduling abstractions.
pub mod core;
/// Store backends.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::{build_scheduler, build_store};
pub use crate::config::{SchedulerConfig, StoreBackendConfig};
pub use crate::core::{
    PollReport, Scheduler, SchedulerError, Task, TaskBuilder, TaskContext, TaskHandler, TaskId, TaskStore,
};

#[doc(hidden)]
pub use serde_json as __serde_json;

/// Common imports for handler authors.
pub mod prelude {
    pub use crate::builders::{build_scheduler, build_store};
    pub use crate::config::{SchedulerConfig, StoreBackendConfig};
    pub use crate::core::{
        AppResult, PollReport, Scheduler, SchedulerError, Task, TaskContext, TaskHandler, TaskId, TaskStore,
    };
    pub use crate::task_args;
    pub use serde_json::Value;
}

/// Build a task argument list, one JSON value per comma-separated item.
///
/// Items use [`serde_json::json!`] syntax, so object and array literals can be
/// written inline.
///
/// ```
/// let args = synced_tasks::task_args![42, {"foo": "bar"}, "x"];
/// assert_eq!(args.len(), 3);
/// assert_eq!(args[1]["foo"], "bar");
/// assert!(synced_tasks::task_args![].is_empty());
/// ```
#[macro_export]
macro_rules! task_args {
    () => {
        ::std::vec::Vec::<$crate::__serde_json::Value>::new()
    };
    ($($tt:tt)+) => {
        match $crate::__serde_json::json!([$($tt)+]) {
            $crate::__serde_json::Value::Array(args) => args,
            _ => ::std::vec::Vec::new(),
        }
    };
}
