#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("message handle is no longer valid (already deleted or never existed)")]
	InvalidHandle,

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("queue is closed")]
	Closed,
}

pub type Result<T> = std::result::Result<T, QueueError>;
