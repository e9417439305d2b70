//! Clock and telemetry helpers.

pub mod clock;
pub mod telemetry;

pub use clock::{after_ms, from_epoch_ms, now_ms, to_epoch_ms};
pub use telemetry::{init_tracing, init_tracing_with};
