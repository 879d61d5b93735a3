use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutineError {
	#[error(transparent)]
	Db(#[from] warden_db::DbError),
	#[error(transparent)]
	Queue(#[from] warden_queue::QueueError),
	#[error("{routine} returned a non-list value, dropping the result")]
	NonListReturn { routine: &'static str },
	#[error("monitor execution timed out after {0:?}")]
	Timeout(std::time::Duration),
	#[error("{routine}() raised: {source}")]
	MonitorCode {
		routine: &'static str,
		#[source]
		source: anyhow::Error,
	},
}

pub type Result<T> = std::result::Result<T, RoutineError>;
