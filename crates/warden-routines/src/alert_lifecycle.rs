//! Alert state machine: `active -> solved` plus the acknowledge/lock
//! side states. Every mutation is followed by the event its guard table
//! prescribes; an unmet guard is a silent no-op.

use chrono::Utc;
use serde_json::json;
use warden_core::IssueId;
use warden_db::{Alert, AlertRepository, AlertStatus, IssueRepository};
use warden_module::{calculate_priority, IssueSnapshot, ReactionOptions, Rule};
use warden_queue::Queue;

use crate::error::Result;
use crate::events::{publish_event, EventSource};
use warden_module::EventName;

pub struct AlertContext<'a> {
	pub alerts: &'a AlertRepository,
	pub issues: &'a IssueRepository,
	pub queue: &'a dyn Queue,
	pub reaction_options: &'a ReactionOptions,
	pub log_all_events: bool,
}

impl AlertContext<'_> {
	pub async fn emit(&self, alert: &Alert, name: EventName, extra: Option<serde_json::Value>) -> Result<()> {
		publish_event(
			self.queue,
			self.reaction_options,
			self.log_all_events,
			EventSource::Alert,
			alert.id.0,
			alert.monitor_id,
			name,
			json!({
				"status": alert.status.as_str(),
				"priority": alert.priority,
				"acknowledged": alert.acknowledged,
				"locked": alert.locked,
			}),
			extra,
		)
		.await
	}
}

pub async fn link_issues(
	ctx: &AlertContext<'_>,
	alert: &Alert,
	issue_ids: &[IssueId],
	dismiss_acknowledge_on_new_issues: bool,
) -> Result<()> {
	if alert.status != AlertStatus::Active || alert.locked || issue_ids.is_empty() {
		return Ok(());
	}

	ctx.issues.link_to_alert(issue_ids, alert.id).await?;
	ctx.emit(alert, EventName::AlertIssuesLinked, None).await?;

	if dismiss_acknowledge_on_new_issues && alert.acknowledged {
		ctx.alerts.set_acknowledged(alert.id, false, None).await?;
		ctx.emit(alert, EventName::AlertAcknowledgeDismissed, None).await?;
	}
	Ok(())
}

pub async fn acknowledge(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active || alert.is_priority_acknowledged() {
		return Ok(());
	}
	ctx.alerts.set_acknowledged(alert.id, true, Some(alert.priority)).await?;
	ctx.emit(alert, EventName::AlertAcknowledged, None).await
}

pub async fn dismiss_acknowledge(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active || !alert.acknowledged {
		return Ok(());
	}
	ctx.alerts.set_acknowledged(alert.id, false, None).await?;
	ctx.emit(alert, EventName::AlertAcknowledgeDismissed, None).await
}

pub async fn lock(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active || alert.locked {
		return Ok(());
	}
	ctx.alerts.set_locked(alert.id, true).await?;
	ctx.emit(alert, EventName::AlertLocked, None).await
}

pub async fn unlock(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active || !alert.locked {
		return Ok(());
	}
	ctx.alerts.set_locked(alert.id, false).await?;
	ctx.emit(alert, EventName::AlertUnlocked, None).await
}

/// Recomputes `alert.priority` from its currently-linked active issues.
/// Emits `alert_priority_increased`/`decreased` exactly when the value
/// changes; a numerically lower priority is a more severe increase.
pub async fn update_priority(ctx: &AlertContext<'_>, alert: &Alert, rule: &Rule) -> Result<Alert> {
	if alert.status != AlertStatus::Active {
		return Ok(alert.clone());
	}

	let issues = ctx.issues.get_active_by_alert(alert.id).await?;
	let now = Utc::now();
	let snapshots: Vec<IssueSnapshot> = issues
		.iter()
		.map(|issue| IssueSnapshot {
			age_secs: (now - issue.created_at).num_seconds(),
			data: issue.data.clone(),
		})
		.collect();

	let new_priority = calculate_priority(rule, &snapshots).unwrap_or(warden_module::AlertPriority::Low.as_i32());
	if new_priority == alert.priority {
		return Ok(alert.clone());
	}

	ctx.alerts.set_priority(alert.id, new_priority).await?;
	let mut updated = alert.clone();
	updated.priority = new_priority;

	let event = if new_priority < alert.priority {
		EventName::AlertPriorityIncreased
	} else {
		EventName::AlertPriorityDecreased
	};
	ctx.emit(&updated, event, Some(json!({"previous_priority": alert.priority}))).await?;

	Ok(updated)
}

/// Forces every active issue on the alert to `solved`, silently
/// acknowledges it, then runs `update()` (which solves the alert once
/// no active issues remain). Used when `issue_options.solvable` is
/// false, so issues can only be cleared by an operator action.
pub async fn solve_issues(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active {
		return Ok(());
	}

	let issues = ctx.issues.get_active_by_alert(alert.id).await?;
	let now = Utc::now();
	for issue in &issues {
		ctx.issues.solve(issue.id, now).await?;
		publish_event(
			ctx.queue,
			ctx.reaction_options,
			ctx.log_all_events,
			EventSource::Issue,
			issue.id.0,
			issue.monitor_id,
			EventName::IssueSolved,
			json!({"model_id": issue.model_id}),
			None,
		)
		.await?;
	}

	ctx.alerts.set_acknowledged(alert.id, true, Some(alert.priority)).await?;
	update(ctx, alert).await
}

/// Solves the alert if it has no active issues left; otherwise emits
/// `alert_updated`.
pub async fn update(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active {
		return Ok(());
	}

	let active_count = ctx.issues.count_active_by_alert(alert.id).await?;
	if active_count == 0 {
		solve(ctx, alert).await
	} else {
		ctx.emit(alert, EventName::AlertUpdated, None).await
	}
}

pub async fn solve(ctx: &AlertContext<'_>, alert: &Alert) -> Result<()> {
	if alert.status != AlertStatus::Active {
		return Ok(());
	}
	ctx.alerts.solve(alert.id, Utc::now()).await?;
	let mut solved = alert.clone();
	solved.status = AlertStatus::Solved;
	ctx.emit(&solved, EventName::AlertSolved, None).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use warden_db::testing::create_test_pool;
	use warden_db::{IssueRepository, MonitorRepository};
	use warden_module::PriorityLevels;
	use warden_queue::InMemoryQueue;

	fn reactions_for_all() -> ReactionOptions {
		let mut reactions = HashMap::new();
		for event in EventName::ALL {
			reactions.insert(event, vec!["notify".to_string()]);
		}
		ReactionOptions { reactions }
	}

	#[tokio::test]
	async fn link_issues_respects_locked_guard() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));
		let reactions = reactions_for_all();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let alert = alerts.create(monitor.id, 3).await.unwrap();
		alerts.set_locked(alert.id, true).await.unwrap();
		let locked_alert = alerts.get_by_id(alert.id).await.unwrap().unwrap();

		let created = issues
			.create_batch(monitor.id, vec![("1".to_string(), serde_json::Map::new())])
			.await
			.unwrap();

		let ctx = AlertContext {
			alerts: &alerts,
			issues: &issues,
			queue: queue.as_ref(),
			reaction_options: &reactions,
			log_all_events: false,
		};
		link_issues(&ctx, &locked_alert, &[created[0].id], false).await.unwrap();

		let reloaded = issues.get_unlinked_active_by_monitor(monitor.id).await.unwrap();
		assert_eq!(reloaded.len(), 1, "locked alert must not accept new links");
	}

	#[tokio::test]
	async fn update_solves_the_alert_once_no_active_issues_remain() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));
		let reactions = reactions_for_all();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let alert = alerts.create(monitor.id, 3).await.unwrap();

		let ctx = AlertContext {
			alerts: &alerts,
			issues: &issues,
			queue: queue.as_ref(),
			reaction_options: &reactions,
			log_all_events: false,
		};
		update(&ctx, &alert).await.unwrap();

		let reloaded = alerts.get_by_id(alert.id).await.unwrap().unwrap();
		assert_eq!(reloaded.status, AlertStatus::Solved);
	}

	#[tokio::test]
	async fn update_priority_emits_increased_when_severity_rises() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));
		let reactions = reactions_for_all();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let alert = alerts.create(monitor.id, 4).await.unwrap();
		let created = issues
			.create_batch(
				monitor.id,
				(1..=5).map(|i| (i.to_string(), serde_json::Map::new())).collect(),
			)
			.await
			.unwrap();
		issues
			.link_to_alert(&created.iter().map(|i| i.id).collect::<Vec<_>>(), alert.id)
			.await
			.unwrap();

		let ctx = AlertContext {
			alerts: &alerts,
			issues: &issues,
			queue: queue.as_ref(),
			reaction_options: &reactions,
			log_all_events: false,
		};

		let rule = Rule::Count {
			priority_levels: PriorityLevels {
				critical: Some(3),
				..Default::default()
			},
		};
		let updated = update_priority(&ctx, &alert, &rule).await.unwrap();
		assert_eq!(updated.priority, 1);

		let (_, message) = queue.receive(std::time::Duration::from_millis(10)).await.unwrap().unwrap();
		assert_eq!(message.payload["event_name"], "alert_priority_increased");
	}
}
