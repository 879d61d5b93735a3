//! Error taxonomy for the runner pool. Most failures are swallowed at
//! the runner boundary and only logged; `BaseCoreException` is the one
//! class that is not — it propagates out of a runner cycle to the
//! supervisor loop, which exits the process non-zero.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
	#[error(transparent)]
	Db(#[from] warden_db::DbError),
	#[error(transparent)]
	Queue(#[from] warden_queue::QueueError),
	#[error(transparent)]
	Registry(#[from] warden_registry::RegistryError),
	#[error(transparent)]
	Routine(#[from] warden_routines::RoutineError),
	#[error(transparent)]
	Fatal(#[from] BaseCoreException),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Marks a bug severe enough that swallowing it and continuing the
/// runner loop would be worse than crashing. Handlers return this
/// (wrapped in `anyhow::Error::downcast`) instead of letting it fall
/// into the catch-all "log and continue" path.
#[derive(Debug, Error)]
#[error("fatal handler error: {0}")]
pub struct BaseCoreException(pub String);

impl BaseCoreException {
	pub fn new(message: impl Into<String>) -> Self {
		Self(message.into())
	}
}
