//! Queue wire format: `{type, payload}` envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
	ProcessMonitor,
	Event,
	Request,
}

impl MessageType {
	pub fn as_str(&self) -> &'static str {
		match self {
			MessageType::ProcessMonitor => "process_monitor",
			MessageType::Event => "event",
			MessageType::Request => "request",
		}
	}
}

/// A queue envelope: exactly two fields, `type` and `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
	#[serde(rename = "type")]
	pub message_type: MessageType,
	pub payload: Value,
}

impl Message {
	pub fn new(message_type: MessageType, payload: Value) -> Self {
		Self {
			message_type,
			payload,
		}
	}
}

/// `process_monitor.payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMonitorPayload {
	pub monitor_id: i64,
	pub tasks: Vec<String>,
}

/// `request.payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
	pub action: String,
	pub params: Value,
}
