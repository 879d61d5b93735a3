//! The `Queue` trait and an in-process implementation.
//!
//! The concrete SQS-backed driver lives outside this crate; here we ship
//! the trait plus an in-memory backend good enough to drive the executor
//! and tests with genuine at-least-once semantics (invisible until the
//! visibility window elapses, heartbeat extension, redelivery on crash).
//! A received message's invisibility window is `2 * visibility_time`,
//! refreshed by the same factor on every heartbeat.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{QueueError, Result};
use crate::message::{Message, MessageType};

/// Opaque handle returned by `receive`; becomes invalid after `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(u64);

#[async_trait]
pub trait Queue: Send + Sync {
	async fn send(&self, message_type: MessageType, payload: Value) -> Result<()>;
	async fn receive(&self, wait: Duration) -> Result<Option<(MessageHandle, Message)>>;
	async fn heartbeat(&self, handle: MessageHandle) -> Result<()>;
	async fn delete(&self, handle: MessageHandle) -> Result<()>;
}

struct InFlight {
	message: Message,
	deadline: Instant,
}

struct Inner {
	next_id: u64,
	ready: VecDeque<(u64, Message)>,
	in_flight: HashMap<u64, InFlight>,
}

/// In-process, `tokio::sync`-backed implementation of [`Queue`].
pub struct InMemoryQueue {
	inner: Mutex<Inner>,
	notify: Notify,
	visibility_time: Duration,
}

impl InMemoryQueue {
	pub fn new(visibility_time: Duration) -> Arc<Self> {
		Arc::new(Self {
			inner: Mutex::new(Inner {
				next_id: 0,
				ready: VecDeque::new(),
				in_flight: HashMap::new(),
			}),
			notify: Notify::new(),
			visibility_time,
		})
	}

	/// Move any in-flight messages whose invisibility window has elapsed
	/// back onto the ready queue. Lazy sweep, run on every `receive`.
	fn requeue_expired(inner: &mut Inner, now: Instant) {
		let expired: Vec<u64> = inner
			.in_flight
			.iter()
			.filter(|(_, entry)| entry.deadline <= now)
			.map(|(id, _)| *id)
			.collect();

		for id in expired {
			if let Some(entry) = inner.in_flight.remove(&id) {
				debug!(message_id = id, "visibility window elapsed, redelivering");
				inner.ready.push_back((id, entry.message));
			}
		}
	}
}

#[async_trait]
impl Queue for InMemoryQueue {
	async fn send(&self, message_type: MessageType, payload: Value) -> Result<()> {
		let message = Message::new(message_type, payload);
		let mut inner = self.inner.lock().await;
		let id = inner.next_id;
		inner.next_id += 1;
		inner.ready.push_back((id, message));
		drop(inner);
		self.notify.notify_one();
		Ok(())
	}

	async fn receive(&self, wait: Duration) -> Result<Option<(MessageHandle, Message)>> {
		let deadline = Instant::now() + wait;

		loop {
			{
				let mut inner = self.inner.lock().await;
				Self::requeue_expired(&mut inner, Instant::now());

				if let Some((id, message)) = inner.ready.pop_front() {
					inner.in_flight.insert(
						id,
						InFlight {
							message: message.clone(),
							deadline: Instant::now() + self.visibility_time * 2,
						},
					);
					trace!(message_id = id, "message received");
					return Ok(Some((MessageHandle(id), message)));
				}
			}

			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				return Ok(None);
			}

			let notified = self.notify.notified();
			tokio::select! {
				_ = notified => {}
				_ = tokio::time::sleep(remaining) => return Ok(None),
			}
		}
	}

	async fn heartbeat(&self, handle: MessageHandle) -> Result<()> {
		let mut inner = self.inner.lock().await;
		let entry = inner
			.in_flight
			.get_mut(&handle.0)
			.ok_or(QueueError::InvalidHandle)?;
		entry.deadline = Instant::now() + self.visibility_time * 2;
		Ok(())
	}

	async fn delete(&self, handle: MessageHandle) -> Result<()> {
		let mut inner = self.inner.lock().await;
		inner
			.in_flight
			.remove(&handle.0)
			.ok_or(QueueError::InvalidHandle)?;
		Ok(())
	}
}
