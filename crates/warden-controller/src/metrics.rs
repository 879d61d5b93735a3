//! Plain atomic counters standing in for the Prometheus-style summaries
//! the error-handling design calls for; no `prometheus` crate is pulled
//! in since none of the reference repos uses one.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ControllerMetrics {
	pub monitors_processed: AtomicU64,
	pub monitors_not_registered: AtomicU64,
	pub dispatch_errors: AtomicU64,
	pub loop_errors: AtomicU64,
}

impl ControllerMetrics {
	pub fn snapshot(&self) -> ControllerMetricsSnapshot {
		ControllerMetricsSnapshot {
			monitors_processed: self.monitors_processed.load(Ordering::Relaxed),
			monitors_not_registered: self.monitors_not_registered.load(Ordering::Relaxed),
			dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
			loop_errors: self.loop_errors.load(Ordering::Relaxed),
		}
	}

	pub(crate) fn inc(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerMetricsSnapshot {
	pub monitors_processed: u64,
	pub monitors_not_registered: u64,
	pub dispatch_errors: u64,
	pub loop_errors: u64,
}
