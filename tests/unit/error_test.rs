//! Tests for error types

use synced_tasks::core::SchedulerError;

#[test]
fn test_invalid_method_error() {
    let err = SchedulerError::InvalidMethod("`send` is not registered".to_string());
    assert_eq!(format!("{}", err), "invalid method: `send` is not registered");
}

#[test]
fn test_invalid_run_at_error() {
    let err = SchedulerError::InvalidRunAt("before the unix epoch".to_string());
    assert_eq!(format!("{}", err), "invalid run_at: before the unix epoch");
}

#[test]
fn test_handler_failed_error() {
    let err = SchedulerError::HandlerFailed("boom".to_string());
    assert_eq!(format!("{}", err), "handler failed: boom");
}

#[test]
fn test_store_helper_wraps_display() {
    let err = SchedulerError::store(std::io::Error::other("disk full"));
    assert!(matches!(err, SchedulerError::StoreUnavailable(_)));
    assert_eq!(format!("{}", err), "store unavailable: disk full");
}

#[test]
fn test_errors_convert_into_anyhow() {
    fn handler_body() -> synced_tasks::core::AppResult<()> {
        Err::<(), _>(SchedulerError::InvalidConfig("batch_size".into()))?;
        Ok(())
    }
    let err = handler_body().unwrap_err();
    assert!(err.downcast_ref::<SchedulerError>().is_some());
}
