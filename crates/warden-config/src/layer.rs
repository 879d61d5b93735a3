//! A partially-specified configuration layer. Every field is optional so
//! a layer can represent "whatever this source actually set"; layers are
//! merged in precedence order, each field overriding the one below it.

use std::collections::HashMap;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProcedureConfigLayer {
	pub schedule: Option<String>,
	pub params: Option<serde_json::Value>,
}

impl ProcedureConfigLayer {
	fn merge(&mut self, other: ProcedureConfigLayer) {
		if other.schedule.is_some() {
			self.schedule = other.schedule;
		}
		if other.params.is_some() {
			self.params = other.params;
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ConfigLayer {
	pub controller_process_schedule: Option<String>,
	pub monitors_load_schedule: Option<String>,
	pub controller_concurrency: Option<usize>,
	pub executor_concurrency: Option<usize>,
	pub executor_sleep_secs: Option<u64>,
	pub executor_monitor_timeout_secs: Option<u64>,
	pub executor_monitor_heartbeat_time_secs: Option<u64>,
	pub executor_reaction_timeout_secs: Option<u64>,
	pub executor_request_timeout_secs: Option<u64>,
	pub database_default_acquire_timeout_secs: Option<u64>,
	pub database_default_query_timeout_secs: Option<u64>,
	pub database_close_timeout_secs: Option<u64>,
	pub queue_wait_message_time_secs: Option<u64>,
	pub queue_visibility_time_secs: Option<u64>,
	pub internal_monitors_path: Option<String>,
	pub sample_monitors_path: Option<String>,
	pub load_sample_monitors: Option<bool>,
	pub max_issues_creation: Option<u32>,
	pub log_all_events: Option<bool>,
	pub time_zone: Option<String>,
	pub database_url: Option<String>,
	pub databases_pools_configs: Option<HashMap<String, String>>,
	pub controller_procedures: Option<HashMap<String, ProcedureConfigLayer>>,
}

impl ConfigLayer {
	pub fn merge(&mut self, other: ConfigLayer) {
		macro_rules! take_if_some {
			($field:ident) => {
				if other.$field.is_some() {
					self.$field = other.$field;
				}
			};
		}
		take_if_some!(controller_process_schedule);
		take_if_some!(monitors_load_schedule);
		take_if_some!(controller_concurrency);
		take_if_some!(executor_concurrency);
		take_if_some!(executor_sleep_secs);
		take_if_some!(executor_monitor_timeout_secs);
		take_if_some!(executor_monitor_heartbeat_time_secs);
		take_if_some!(executor_reaction_timeout_secs);
		take_if_some!(executor_request_timeout_secs);
		take_if_some!(database_default_acquire_timeout_secs);
		take_if_some!(database_default_query_timeout_secs);
		take_if_some!(database_close_timeout_secs);
		take_if_some!(queue_wait_message_time_secs);
		take_if_some!(queue_visibility_time_secs);
		take_if_some!(internal_monitors_path);
		take_if_some!(sample_monitors_path);
		take_if_some!(load_sample_monitors);
		take_if_some!(max_issues_creation);
		take_if_some!(log_all_events);
		take_if_some!(time_zone);
		take_if_some!(database_url);

		if let Some(other_pools) = other.databases_pools_configs {
			self.databases_pools_configs.get_or_insert_with(HashMap::new).extend(other_pools);
		}
		if let Some(other_procs) = other.controller_procedures {
			let mine = self.controller_procedures.get_or_insert_with(HashMap::new);
			for (name, layer) in other_procs {
				mine.entry(name).or_default().merge(layer);
			}
		}
	}
}
