//! Configuration sources: built-in defaults, a TOML file, and
//! environment variables, applied in that precedence order.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ConfigLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Hard-coded defaults, the same values spec.md's knobs default to.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ConfigLayer {
			controller_process_schedule: Some("* * * * *".to_string()),
			monitors_load_schedule: Some("*/5 * * * *".to_string()),
			controller_concurrency: Some(8),
			executor_concurrency: Some(8),
			executor_sleep_secs: Some(5),
			executor_monitor_timeout_secs: Some(300),
			executor_monitor_heartbeat_time_secs: Some(15),
			executor_reaction_timeout_secs: Some(30),
			executor_request_timeout_secs: Some(30),
			database_default_acquire_timeout_secs: Some(10),
			database_default_query_timeout_secs: Some(30),
			database_close_timeout_secs: Some(10),
			queue_wait_message_time_secs: Some(20),
			queue_visibility_time_secs: Some(30),
			internal_monitors_path: None,
			sample_monitors_path: None,
			load_sample_monitors: Some(false),
			max_issues_creation: Some(100),
			log_all_events: Some(false),
			time_zone: Some("UTC".to_string()),
			database_url: Some("sqlite::memory:".to_string()),
			databases_pools_configs: None,
			controller_procedures: None,
		})
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source. Convention: `WARDEN_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ConfigLayer {
			controller_process_schedule: env_var("WARDEN_CONTROLLER_PROCESS_SCHEDULE"),
			monitors_load_schedule: env_var("WARDEN_MONITORS_LOAD_SCHEDULE"),
			controller_concurrency: env_parsed("WARDEN_CONTROLLER_CONCURRENCY")?,
			executor_concurrency: env_parsed("WARDEN_EXECUTOR_CONCURRENCY")?,
			executor_sleep_secs: env_parsed("WARDEN_EXECUTOR_SLEEP_SECS")?,
			executor_monitor_timeout_secs: env_parsed("WARDEN_EXECUTOR_MONITOR_TIMEOUT_SECS")?,
			executor_monitor_heartbeat_time_secs: env_parsed("WARDEN_EXECUTOR_MONITOR_HEARTBEAT_TIME_SECS")?,
			executor_reaction_timeout_secs: env_parsed("WARDEN_EXECUTOR_REACTION_TIMEOUT_SECS")?,
			executor_request_timeout_secs: env_parsed("WARDEN_EXECUTOR_REQUEST_TIMEOUT_SECS")?,
			database_default_acquire_timeout_secs: env_parsed("WARDEN_DATABASE_DEFAULT_ACQUIRE_TIMEOUT_SECS")?,
			database_default_query_timeout_secs: env_parsed("WARDEN_DATABASE_DEFAULT_QUERY_TIMEOUT_SECS")?,
			database_close_timeout_secs: env_parsed("WARDEN_DATABASE_CLOSE_TIMEOUT_SECS")?,
			queue_wait_message_time_secs: env_parsed("WARDEN_QUEUE_WAIT_MESSAGE_TIME_SECS")?,
			queue_visibility_time_secs: env_parsed("WARDEN_QUEUE_VISIBILITY_TIME_SECS")?,
			internal_monitors_path: env_var("WARDEN_INTERNAL_MONITORS_PATH"),
			sample_monitors_path: env_var("WARDEN_SAMPLE_MONITORS_PATH"),
			load_sample_monitors: env_bool("WARDEN_LOAD_SAMPLE_MONITORS"),
			max_issues_creation: env_parsed("WARDEN_MAX_ISSUES_CREATION")?,
			log_all_events: env_bool("WARDEN_LOG_ALL_EVENTS"),
			time_zone: env_var("WARDEN_TIME_ZONE"),
			database_url: env_var("WARDEN_DATABASE_URL"),
			databases_pools_configs: None,
			controller_procedures: None,
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid value '{v}'"),
		}),
		None => Ok(None),
	}
}
