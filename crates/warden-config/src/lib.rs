//! Layered configuration for the monitor execution platform: built-in
//! defaults, then an optional TOML file, then environment variables,
//! each layer overriding only the fields it actually sets.

pub mod error;
pub mod layer;
pub mod sources;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub use error::ConfigError;
pub use layer::{ConfigLayer, ProcedureConfigLayer};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureConfig {
	pub schedule: String,
	pub params: serde_json::Value,
}

/// Fully resolved configuration; every field is populated (by a default
/// if nothing else set it).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	pub controller_process_schedule: String,
	pub monitors_load_schedule: String,
	pub controller_concurrency: usize,
	pub executor_concurrency: usize,
	pub executor_sleep: Duration,
	pub executor_monitor_timeout: Duration,
	pub executor_monitor_heartbeat_time: Duration,
	pub executor_reaction_timeout: Duration,
	pub executor_request_timeout: Duration,
	pub database_default_acquire_timeout: Duration,
	pub database_default_query_timeout: Duration,
	pub database_close_timeout: Duration,
	pub queue_wait_message_time: Duration,
	pub queue_visibility_time: Duration,
	pub internal_monitors_path: Option<String>,
	pub sample_monitors_path: Option<String>,
	pub load_sample_monitors: bool,
	pub max_issues_creation: u32,
	pub log_all_events: bool,
	pub time_zone: String,
	pub database_url: String,
	pub databases_pools_configs: HashMap<String, String>,
	pub controller_procedures: HashMap<String, ProcedureConfig>,
}

impl TryFrom<ConfigLayer> for Config {
	type Error = ConfigError;

	fn try_from(layer: ConfigLayer) -> Result<Self, ConfigError> {
		macro_rules! require {
			($field:ident) => {
				layer.$field.ok_or_else(|| ConfigError::InvalidValue {
					key: stringify!($field).to_string(),
					message: "no default and no source provided a value".to_string(),
				})?
			};
		}

		let controller_procedures = layer
			.controller_procedures
			.unwrap_or_default()
			.into_iter()
			.map(|(name, p)| {
				let schedule = p.schedule.ok_or_else(|| ConfigError::InvalidValue {
					key: format!("controller_procedures.{name}.schedule"),
					message: "procedure entries require a schedule".to_string(),
				})?;
				Ok((
					name,
					ProcedureConfig {
						schedule,
						params: p.params.unwrap_or(serde_json::Value::Null),
					},
				))
			})
			.collect::<Result<HashMap<_, _>, ConfigError>>()?;

		Ok(Config {
			controller_process_schedule: require!(controller_process_schedule),
			monitors_load_schedule: require!(monitors_load_schedule),
			controller_concurrency: require!(controller_concurrency),
			executor_concurrency: require!(executor_concurrency),
			executor_sleep: Duration::from_secs(require!(executor_sleep_secs)),
			executor_monitor_timeout: Duration::from_secs(require!(executor_monitor_timeout_secs)),
			executor_monitor_heartbeat_time: Duration::from_secs(require!(executor_monitor_heartbeat_time_secs)),
			executor_reaction_timeout: Duration::from_secs(require!(executor_reaction_timeout_secs)),
			executor_request_timeout: Duration::from_secs(require!(executor_request_timeout_secs)),
			database_default_acquire_timeout: Duration::from_secs(require!(database_default_acquire_timeout_secs)),
			database_default_query_timeout: Duration::from_secs(require!(database_default_query_timeout_secs)),
			database_close_timeout: Duration::from_secs(require!(database_close_timeout_secs)),
			queue_wait_message_time: Duration::from_secs(require!(queue_wait_message_time_secs)),
			queue_visibility_time: Duration::from_secs(require!(queue_visibility_time_secs)),
			internal_monitors_path: layer.internal_monitors_path,
			sample_monitors_path: layer.sample_monitors_path,
			load_sample_monitors: require!(load_sample_monitors),
			max_issues_creation: require!(max_issues_creation),
			log_all_events: require!(log_all_events),
			time_zone: require!(time_zone),
			database_url: require!(database_url),
			databases_pools_configs: layer.databases_pools_configs.unwrap_or_default(),
			controller_procedures,
		})
	}
}

/// Loads configuration with standard precedence: defaults, then
/// `toml_path` (if it exists), then environment variables.
pub fn load_config(toml_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(toml_path.as_ref().to_path_buf())),
		Box::new(EnvSource),
	];

	let mut merged = ConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = Config::try_from(merged)?;
	info!(
		controller_concurrency = config.controller_concurrency,
		executor_concurrency = config.executor_concurrency,
		time_zone = %config.time_zone,
		"configuration loaded"
	);
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_alone_resolve_to_a_complete_config() {
		let config = load_config("/nonexistent/warden.toml").unwrap();
		assert_eq!(config.controller_concurrency, 8);
		assert_eq!(config.time_zone, "UTC");
		assert!(!config.log_all_events);
	}

	#[test]
	fn env_vars_override_defaults() {
		std::env::set_var("WARDEN_CONTROLLER_CONCURRENCY", "32");
		let config = load_config("/nonexistent/warden.toml").unwrap();
		std::env::remove_var("WARDEN_CONTROLLER_CONCURRENCY");
		assert_eq!(config.controller_concurrency, 32);
	}
}
