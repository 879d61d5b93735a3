//! Plain atomic counters tracking what the runner loop, reaction
//! handler, and request handler each do: messages processed/errored,
//! reactions run/errored/timed out, requests run/errored/timed out.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ExecutorMetrics {
	pub messages_processed: AtomicU64,
	pub messages_errored: AtomicU64,
	pub reaction_timeouts: AtomicU64,
	pub reaction_errors: AtomicU64,
	pub request_timeouts: AtomicU64,
	pub request_errors: AtomicU64,
}

impl ExecutorMetrics {
	pub fn snapshot(&self) -> ExecutorMetricsSnapshot {
		ExecutorMetricsSnapshot {
			messages_processed: self.messages_processed.load(Ordering::Relaxed),
			messages_errored: self.messages_errored.load(Ordering::Relaxed),
			reaction_timeouts: self.reaction_timeouts.load(Ordering::Relaxed),
			reaction_errors: self.reaction_errors.load(Ordering::Relaxed),
			request_timeouts: self.request_timeouts.load(Ordering::Relaxed),
			request_errors: self.request_errors.load(Ordering::Relaxed),
		}
	}

	pub(crate) fn inc(counter: &AtomicU64) {
		counter.fetch_add(1, Ordering::Relaxed);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutorMetricsSnapshot {
	pub messages_processed: u64,
	pub messages_errored: u64,
	pub reaction_timeouts: u64,
	pub reaction_errors: u64,
	pub request_timeouts: u64,
	pub request_errors: u64,
}
