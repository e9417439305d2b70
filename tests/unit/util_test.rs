//! Tests for utility functions

use std::time::{Duration, SystemTime};

use synced_tasks::core::SchedulerError;
use synced_tasks::util::{after_ms, from_epoch_ms, init_tracing, now_ms, to_epoch_ms};

#[test]
fn test_epoch_round_trip_is_millisecond_exact() {
    let at = SystemTime::UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
    let ms = to_epoch_ms(at).unwrap();
    assert_eq!(ms, 1_700_000_000_123);
    assert_eq!(from_epoch_ms(ms), Some(at));
}

#[test]
fn test_after_ms_is_in_the_future() {
    let before = now_ms();
    let due = after_ms(Duration::from_secs(2)).unwrap();
    assert!(due >= before + 2_000);
}

#[test]
fn test_unrepresentable_times_rejected() {
    let before_epoch = SystemTime::UNIX_EPOCH - Duration::from_millis(1);
    assert!(matches!(to_epoch_ms(before_epoch), Err(SchedulerError::InvalidRunAt(_))));
    assert!(matches!(after_ms(Duration::MAX), Err(SchedulerError::InvalidRunAt(_))));
    assert_eq!(from_epoch_ms(u128::MAX), None);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
