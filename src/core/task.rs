//! Task document stored in the shared collection.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::util::clock::from_epoch_ms;

/// Unique identifier of a task. Generated once at creation, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID.
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A scheduled unit of work as persisted in the store.
///
/// `assigned_at_ms` is the only claim marker: `None` means any worker may
/// claim the task once `run_at_ms` has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Primary key.
    pub id: TaskId,
    /// Registered method name to invoke.
    pub method: String,
    /// Positional arguments handed to the handler.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Due time in milliseconds since the Unix epoch.
    pub run_at_ms: u128,
    /// Claim time in milliseconds since the Unix epoch, if claimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at_ms: Option<u128>,
    /// Opaque payload for external inspection; never read by the scheduler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Task {
    /// Whether a worker currently holds the claim.
    pub const fn is_claimed(&self) -> bool {
        self.assigned_at_ms.is_some()
    }

    /// Whether the task may be claimed at `now_ms`.
    pub const fn is_eligible(&self, now_ms: u128) -> bool {
        self.assigned_at_ms.is_none() && self.run_at_ms <= now_ms
    }

    /// Due time as a `SystemTime`.
    pub fn run_at(&self) -> Option<SystemTime> {
        from_epoch_ms(self.run_at_ms)
    }
}
