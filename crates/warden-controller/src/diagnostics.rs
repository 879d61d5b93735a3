//! `diagnostics()`: a small health-check surface reporting staleness of
//! the controller's own loop, supplementing the scan/procedures pair
//! with something `warden-server` can expose.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

#[derive(Debug, Default)]
pub struct Diagnostics {
	last_loop_at: AtomicI64,
	last_monitor_processed_at: AtomicI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
	pub last_loop_epoch_secs: Option<i64>,
	pub last_monitor_processed_epoch_secs: Option<i64>,
}

impl Diagnostics {
	pub fn record_loop_tick(&self) {
		self.last_loop_at.store(Utc::now().timestamp(), Ordering::Relaxed);
	}

	pub fn record_monitor_processed(&self) {
		self.last_monitor_processed_at.store(Utc::now().timestamp(), Ordering::Relaxed);
	}

	pub fn snapshot(&self) -> DiagnosticsSnapshot {
		DiagnosticsSnapshot {
			last_loop_epoch_secs: non_zero(self.last_loop_at.load(Ordering::Relaxed)),
			last_monitor_processed_epoch_secs: non_zero(self.last_monitor_processed_at.load(Ordering::Relaxed)),
		}
	}
}

fn non_zero(value: i64) -> Option<i64> {
	if value == 0 {
		None
	} else {
		Some(value)
	}
}
