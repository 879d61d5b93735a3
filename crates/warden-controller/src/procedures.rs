//! Housekeeping procedures run by the controller's side loop, each on
//! its own cron schedule, each isolated so one failing procedure never
//! stops the others.

use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};
use warden_db::{MonitorRepository, NotificationRepository};

use crate::error::Result;

/// Clears `queued`/`running` for monitors whose heartbeat is older than
/// `time_tolerance_secs`. Returns how many were reset.
pub async fn monitors_stuck(monitors: &MonitorRepository, time_tolerance_secs: i64) -> Result<usize> {
	let stuck = monitors.get_stuck(ChronoDuration::seconds(time_tolerance_secs)).await?;
	for monitor in &stuck {
		warn!(monitor = %monitor.name, last_heartbeat = ?monitor.last_heartbeat, "resetting stuck monitor");
		monitors.clear_queued_and_running(monitor.id).await?;
	}
	Ok(stuck.len())
}

/// Closes active notifications whose alert has since solved. Returns how
/// many were closed.
pub async fn notifications_alert_solved(notifications: &NotificationRepository) -> Result<usize> {
	let surfaced = notifications.get_active_for_solved_alerts().await?;
	let now = Utc::now();
	for notification in &surfaced {
		notifications.close(notification.id, now).await?;
	}
	if !surfaced.is_empty() {
		info!(count = surfaced.len(), "closed notifications for solved alerts");
	}
	Ok(surfaced.len())
}

/// No persisted event log exists in this architecture (events are
/// transient queue messages, not a Store table), so there is nothing to
/// prune; kept as a named procedure so its schedule slot and failure
/// isolation match the housekeeping trio the controller runs.
pub async fn clean_events() -> Result<usize> {
	Ok(0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_db::testing::create_test_pool;
	use warden_db::AlertRepository;

	#[tokio::test]
	async fn monitors_stuck_resets_only_monitors_past_the_tolerance() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		monitors.set_running(monitor.id, true).await.unwrap();
		monitors.set_heartbeat(monitor.id, Utc::now() - ChronoDuration::minutes(10)).await.unwrap();

		let reset = monitors_stuck(&monitors, 300).await.unwrap();
		assert_eq!(reset, 1);

		let reloaded = monitors.get_by_id(monitor.id).await.unwrap().unwrap();
		assert!(!reloaded.running && !reloaded.queued);
	}

	#[tokio::test]
	async fn notifications_alert_solved_closes_notifications_of_solved_alerts() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let notifications = NotificationRepository::new(pool);

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let alert = alerts.create(monitor.id, 3).await.unwrap();
		notifications.create(alert.id, &serde_json::Map::new()).await.unwrap();
		alerts.solve(alert.id, Utc::now()).await.unwrap();

		let closed = notifications_alert_solved(&notifications).await.unwrap();
		assert_eq!(closed, 1);
		assert!(notifications.get_active_for_solved_alerts().await.unwrap().is_empty());
	}
}
