use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
	#[error(transparent)]
	Db(#[from] warden_db::DbError),
	#[error(transparent)]
	Queue(#[from] warden_queue::QueueError),
	#[error(transparent)]
	Registry(#[from] warden_registry::RegistryError),
	#[error(transparent)]
	Cron(#[from] warden_cron::CronError),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
