//! Millisecond wall-clock helpers.
//!
//! Every timestamp persisted by the scheduler is milliseconds since the Unix
//! epoch. The helpers here are the only place `SystemTime` is converted.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::core::SchedulerError;

/// Current time in milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// Convert an absolute time into milliseconds since the epoch.
///
/// Times before the epoch have no representation in the store and are
/// rejected with [`SchedulerError::InvalidRunAt`].
pub fn to_epoch_ms(at: SystemTime) -> Result<u128, SchedulerError> {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .map_err(|e| SchedulerError::InvalidRunAt(format!("time precedes unix epoch by {:?}", e.duration())))
}

/// Milliseconds since the epoch for `now + delay`.
pub fn after_ms(delay: Duration) -> Result<u128, SchedulerError> {
    let at = SystemTime::now()
        .checked_add(delay)
        .ok_or_else(|| SchedulerError::InvalidRunAt(format!("delay of {delay:?} overflows")))?;
    to_epoch_ms(at)
}

/// Convert stored milliseconds back into a `SystemTime`, if representable.
pub fn from_epoch_ms(ms: u128) -> Option<SystemTime> {
    let ms = u64::try_from(ms).ok()?;
    UNIX_EPOCH.checked_add(Duration::from_millis(ms))
}
