//! Builds and publishes reaction events. An event is only put on the
//! queue if the monitor has at least one reaction callback registered
//! for it; otherwise it is logged (if `log_all_events`) or dropped.

use serde_json::{json, Value};
use warden_core::MonitorId;
use warden_module::{EventName, ReactionOptions};
use warden_queue::{MessageType, Queue};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
	Alert,
	Issue,
	Monitor,
	Notification,
}

impl EventSource {
	fn as_str(&self) -> &'static str {
		match self {
			EventSource::Alert => "alert",
			EventSource::Issue => "issue",
			EventSource::Monitor => "monitor",
			EventSource::Notification => "notification",
		}
	}
}

pub async fn publish_event(
	queue: &dyn Queue,
	reaction_options: &ReactionOptions,
	log_all_events: bool,
	source: EventSource,
	source_id: i64,
	source_monitor_id: MonitorId,
	name: EventName,
	event_data: Value,
	extra_payload: Option<Value>,
) -> Result<()> {
	let callbacks = reaction_options.callbacks_for(name);
	if callbacks.is_empty() {
		if log_all_events {
			tracing::info!(
				event_source = source.as_str(),
				event_source_id = source_id,
				monitor_id = source_monitor_id.0,
				event_name = name.as_str(),
				"event"
			);
		}
		return Ok(());
	}

	let payload = json!({
		"event_source": source.as_str(),
		"event_source_id": source_id,
		"event_source_monitor_id": source_monitor_id.0,
		"event_name": name.as_str(),
		"event_data": event_data,
		"extra_payload": extra_payload,
	});

	queue.send(MessageType::Event, payload).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;
	use std::collections::HashMap;
	use warden_queue::InMemoryQueue;

	fn reactions_with(event: EventName, callback: &str) -> ReactionOptions {
		let mut reactions = HashMap::new();
		reactions.insert(event, vec![callback.to_string()]);
		ReactionOptions { reactions }
	}

	#[tokio::test]
	async fn enqueues_when_a_reaction_is_registered() {
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));
		let reactions = reactions_with(EventName::IssueCreated, "notify");

		publish_event(
			queue.as_ref(),
			&reactions,
			false,
			EventSource::Issue,
			1,
			MonitorId::new(1),
			EventName::IssueCreated,
			json!({"model_id": "x"}),
			None,
		)
		.await
		.unwrap();

		let (_, message) = queue.receive(std::time::Duration::from_millis(10)).await.unwrap().unwrap();
		assert_eq!(message.payload["event_name"], "issue_created");
	}

	#[tokio::test]
	async fn drops_silently_with_no_reaction_and_no_logging() {
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));
		let reactions = ReactionOptions::default();

		publish_event(
			queue.as_ref(),
			&reactions,
			false,
			EventSource::Issue,
			1,
			MonitorId::new(1),
			EventName::IssueCreated,
			json!({}),
			None,
		)
		.await
		.unwrap();

		assert!(queue.receive(std::time::Duration::from_millis(10)).await.unwrap().is_none());
	}
}
