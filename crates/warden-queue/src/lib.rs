//! At-least-once delivery of `process_monitor` / `event` / `request`
//! envelopes between the controller and the executor.

pub mod error;
pub mod message;
pub mod queue;

pub use error::{QueueError, Result};
pub use message::{Message, MessageType, ProcessMonitorPayload, RequestPayload};
pub use queue::{InMemoryQueue, MessageHandle, Queue};
