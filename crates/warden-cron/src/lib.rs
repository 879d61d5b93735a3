//! Clock and cron scheduling: current time in a fixed zone,
//! `is_triggered`, `time_until_next`, and `time_since`.

pub mod clock;
pub mod error;
pub mod schedule;

pub use clock::Clock;
pub use error::{CronError, Result};
pub use schedule::{is_triggered, time_until_next, validate_expression, validate_timezone};
pub use warden_core::time::time_since;
