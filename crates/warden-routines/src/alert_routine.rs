//! Step 5 of the per-monitor sequence: attach unlinked active issues to
//! an alert (creating one if warranted), then refresh every active
//! alert's priority and solved state.

use chrono::Utc;
use warden_core::{IssueId, MonitorId};
use warden_module::{calculate_priority, AlertOptions, IssueSnapshot, EventName};

use crate::alert_lifecycle::{link_issues, update, update_priority, AlertContext};
use crate::error::Result;
use crate::events::EventSource;

pub async fn run_alert_routine(ctx: &AlertContext<'_>, monitor_id: MonitorId, alert_options: &AlertOptions) -> Result<()> {
	let unlinked = ctx.issues.get_unlinked_active_by_monitor(monitor_id).await?;

	if !unlinked.is_empty() {
		let alert = match ctx.alerts.get_active_unlocked_by_monitor(monitor_id).await? {
			Some(existing) => Some(existing),
			None => {
				let now = Utc::now();
				let snapshots: Vec<IssueSnapshot> = unlinked
					.iter()
					.map(|issue| IssueSnapshot {
						age_secs: (now - issue.created_at).num_seconds(),
						data: issue.data.clone(),
					})
					.collect();

				match calculate_priority(&alert_options.rule, &snapshots) {
					Some(priority) => {
						let created = ctx.alerts.create(monitor_id, priority).await?;
						crate::events::publish_event(
							ctx.queue,
							ctx.reaction_options,
							ctx.log_all_events,
							EventSource::Alert,
							created.id.0,
							monitor_id,
							EventName::AlertCreated,
							serde_json::json!({"priority": created.priority}),
							None,
						)
						.await?;
						Some(created)
					}
					None => None,
				}
			}
		};

		if let Some(alert) = alert {
			let ids: Vec<IssueId> = unlinked.iter().map(|issue| issue.id).collect();
			link_issues(ctx, &alert, &ids, alert_options.dismiss_acknowledge_on_new_issues).await?;
		}
	}

	for alert in ctx.alerts.get_active_by_monitor(monitor_id).await? {
		let alert = update_priority(ctx, &alert, &alert_options.rule).await?;
		update(ctx, &alert).await?;
	}

	Ok(())
}
