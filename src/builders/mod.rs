//! Builders to construct stores and schedulers from configuration.

pub mod scheduler_builder;

pub use scheduler_builder::{build_scheduler, build_store};
