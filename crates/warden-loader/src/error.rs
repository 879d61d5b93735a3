use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
	#[error("monitor module failed validation: {0}")]
	Validation(#[from] warden_module::ModuleValidationError),
	#[error("no module factory registered for monitor {0:?}")]
	UnknownFactory(String),
	#[error(transparent)]
	Db(#[from] warden_db::DbError),
	#[error(transparent)]
	Cron(#[from] warden_cron::CronError),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
