//! Step 3 of the per-monitor sequence: solve any active issue whose
//! `is_solved` predicate now returns true.

use chrono::Utc;
use serde_json::json;
use warden_db::Monitor;
use warden_module::{EventName, MonitorModule};

use crate::error::Result;
use crate::events::{publish_event, EventSource};
use crate::monitor_handler::Services;

pub async fn run_solve(services: &Services<'_>, monitor: &Monitor, module: &MonitorModule) -> Result<()> {
	let Some(is_solved) = &module.is_solved else {
		return Ok(());
	};

	let active = services.issues.get_active_by_monitor(monitor.id).await?;
	let now = Utc::now();

	for issue in active {
		if !is_solved(&issue.data) {
			continue;
		}
		services.issues.solve(issue.id, now).await?;
		publish_event(
			services.queue,
			&module.reaction_options,
			services.log_all_events,
			EventSource::Issue,
			issue.id.0,
			monitor.id,
			EventName::IssueSolved,
			json!({"model_id": issue.model_id}),
			None,
		)
		.await?;
	}

	Ok(())
}
