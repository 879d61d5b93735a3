use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("registry did not become ready within the timeout")]
	MonitorsLoadError,
	#[error("monitor {0} was not loaded within the timeout")]
	MonitorNotLoaded(i64),
}

pub type Result<T> = std::result::Result<T, RegistryError>;
