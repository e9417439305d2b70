//! Error types for scheduling, claiming, and dispatch.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Method name is empty or not registered.
    #[error("invalid method: {0}")]
    InvalidMethod(String),
    /// Due time cannot be represented as a timestamp.
    #[error("invalid run_at: {0}")]
    InvalidRunAt(String),
    /// A registered handler returned an error or panicked.
    #[error("handler failed: {0}")]
    HandlerFailed(String),
    /// The task store could not complete an operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Configuration values are out of range or malformed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl SchedulerError {
    /// Wrap any displayable backend failure as [`SchedulerError::StoreUnavailable`].
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(err.to_string())
    }
}

/// Application-facing result using anyhow for handler bodies and host code.
pub type AppResult<T> = Result<T, anyhow::Error>;
