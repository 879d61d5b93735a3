//! Per-monitor triggering decision: is this monitor due for `search`,
//! `update`, both, or neither, right now?

use chrono::{DateTime, Utc};
use warden_cron::is_triggered;
use warden_db::Monitor;
use warden_module::MonitorOptions;

use crate::error::Result;

/// Tasks coalesced in the stable order the wire format requires.
pub fn decide_tasks(monitor: &Monitor, options: &MonitorOptions, timezone: &str, now: DateTime<Utc>) -> Result<Vec<&'static str>> {
	if !monitor.enabled || monitor.queued || monitor.running {
		return Ok(Vec::new());
	}

	let mut tasks = Vec::new();

	if let Some(cron) = &options.search_cron {
		if is_search_triggered(cron, timezone, monitor.search_executed_at, now)? {
			tasks.push("search");
		}
	}
	if let Some(cron) = &options.update_cron {
		if is_search_triggered(cron, timezone, monitor.update_executed_at, now)? {
			tasks.push("update");
		}
	}

	Ok(tasks)
}

fn is_search_triggered(cron: &str, timezone: &str, last_executed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<bool> {
	match last_executed_at {
		None => Ok(true),
		Some(last) => Ok(is_triggered(cron, timezone, last, now)?),
	}
}
