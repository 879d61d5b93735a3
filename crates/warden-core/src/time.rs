//! Small time helpers shared by the cron clock, the controller and the
//! routine engine.

use chrono::{DateTime, Utc};

/// Seconds elapsed since `t`, or the `-1` sentinel when `t` is `None`.
/// Used by diagnostics and stuck-monitor detection, where "never ran"
/// and "ran a long time ago" need to be distinguishable at a glance.
pub fn time_since(t: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
	match t {
		None => -1,
		Some(t) => (now - t).num_seconds(),
	}
}
