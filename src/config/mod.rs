//! Configuration models for the scheduler and its store backend.

pub mod scheduler;

pub use scheduler::{SchedulerConfig, StoreBackendConfig};
