//! Self-check: flags monitors carrying an unusually large number of
//! active issues, which usually means a monitor's search routine is
//! producing more issues than anyone is working through. Mirrors
//! `monitor_high_active_issues_count` from the reference implementation.

use std::sync::Arc;

use futures::future::FutureExt;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;

use warden_db::{IssueRepository, MonitorRepository, VariableRepository};
use warden_loader::ModuleFactory;
use warden_module::{
	AlertOptions, IssueOptions, ModuleBuilder, MonitorModule, MonitorOptions, NotificationOptions, PriorityLevels, RoutineContext, Rule,
	ValueOperation,
};

/// Active-issue count past which a monitor is considered to be at its
/// "moderate" threshold; `high`/`critical` scale from here. An operator
/// can override this per-deployment by setting this monitor's
/// `threshold_override` variable, read back at the top of `search()`.
const TRIGGER_THRESHOLD: i64 = 50;
const THRESHOLD_OVERRIDE_KEY: &str = "threshold_override";
const LAST_SEARCH_AT_KEY: &str = "last_search_at";

fn issue_entry(monitor: &warden_db::Monitor, active_issues_count: i64) -> Map<String, Value> {
	let mut item = Map::new();
	item.insert("monitor_id".to_string(), json!(monitor.id.0));
	item.insert("monitor_name".to_string(), json!(monitor.name));
	item.insert("active_issues_count".to_string(), json!(active_issues_count));
	item
}

fn build(pool: SqlitePool) -> MonitorModule {
	let search_pool = pool.clone();

	let search = Arc::new(move |ctx: RoutineContext| {
		let pool = search_pool.clone();
		async move {
			let monitors = MonitorRepository::new(pool.clone());
			let issues = IssueRepository::new(pool.clone());
			let variables = VariableRepository::new(pool);

			let threshold = ctx
				.variables
				.get(THRESHOLD_OVERRIDE_KEY)
				.and_then(|v| v.parse::<i64>().ok())
				.unwrap_or(TRIGGER_THRESHOLD);

			let mut items = Vec::new();
			for monitor in monitors.get_all_enabled().await? {
				let active_issues_count = issues.get_active_by_monitor(monitor.id).await?.len() as i64;
				if active_issues_count > threshold {
					items.push(issue_entry(&monitor, active_issues_count));
				}
			}

			variables
				.set(ctx.monitor_id, LAST_SEARCH_AT_KEY, Some(&chrono::Utc::now().to_rfc3339()))
				.await?;

			Ok(items)
		}
		.boxed()
	});

	let update = Arc::new(move |ctx: RoutineContext| {
		let pool = pool.clone();
		async move {
			let monitors = MonitorRepository::new(pool.clone());
			let issues = IssueRepository::new(pool);
			let mut items = Vec::new();
			for issue_data in ctx.issues_data {
				let Some(monitor_id) = issue_data.get("monitor_id").and_then(Value::as_i64) else {
					continue;
				};
				let monitor_id = warden_core::MonitorId::new(monitor_id);
				let Some(monitor) = monitors.get_by_id(monitor_id).await? else {
					continue;
				};
				let active_issues_count = issues.get_active_by_monitor(monitor_id).await?.len() as i64;
				items.push(issue_entry(&monitor, active_issues_count));
			}
			Ok(items)
		}
		.boxed()
	});

	let is_solved = Arc::new(|data: &Map<String, Value>| {
		let active_issues_count = data.get("active_issues_count").and_then(Value::as_i64).unwrap_or(0);
		active_issues_count < TRIGGER_THRESHOLD / 2
	});

	ModuleBuilder::new(
		MonitorOptions {
			search_cron: Some("*/5 * * * *".to_string()),
			update_cron: Some("*/2 * * * *".to_string()),
			max_issues_creation: 50,
			execution_timeout_secs: 30,
		},
		IssueOptions {
			model_id_key: "monitor_id".to_string(),
			solvable: true,
			unique: false,
		},
		AlertOptions {
			rule: Rule::Value {
				value_key: "active_issues_count".to_string(),
				operation: ValueOperation::GreaterThan,
				priority_levels: PriorityLevels {
					moderate: Some(TRIGGER_THRESHOLD),
					high: Some(2 * TRIGGER_THRESHOLD),
					critical: Some(3 * TRIGGER_THRESHOLD),
					..Default::default()
				},
			},
			dismiss_acknowledge_on_new_issues: true,
		},
		search,
	)
	.with_update(update)
	.with_is_solved(is_solved)
	.with_notification_options(NotificationOptions::from(["slack".to_string()]))
	.build()
}

pub fn factory(pool: SqlitePool) -> Arc<dyn ModuleFactory> {
	Arc::new(move || build(pool.clone()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_db::testing::create_test_pool;

	#[tokio::test]
	async fn search_surfaces_a_monitor_past_the_active_issue_threshold() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());

		let noisy = monitors.get_or_create_by_name("noisy").await.unwrap();
		let entries = (0..(TRIGGER_THRESHOLD + 1)).map(|i| (i.to_string(), Map::new())).collect();
		issues.create_batch(noisy.id, entries).await.unwrap();

		let module = build(pool);
		let found = (module.search)(RoutineContext::default()).await.unwrap();

		assert_eq!(found.len(), 1);
		assert_eq!(found[0]["monitor_id"], json!(noisy.id.0));
	}

	#[tokio::test]
	async fn search_ignores_a_monitor_under_the_threshold() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());

		let quiet = monitors.get_or_create_by_name("quiet").await.unwrap();
		issues.create_batch(quiet.id, vec![("1".to_string(), Map::new())]).await.unwrap();

		let module = build(pool);
		let found = (module.search)(RoutineContext::default()).await.unwrap();

		assert!(found.is_empty());
	}

	#[tokio::test]
	async fn is_solved_once_the_count_drops_below_half_the_threshold() {
		let module = build(sqlx::SqlitePool::connect_lazy("sqlite::memory:").unwrap());
		let is_solved = module.is_solved.unwrap();

		let mut data = Map::new();
		data.insert("active_issues_count".to_string(), json!(TRIGGER_THRESHOLD / 2 - 1));
		assert!(is_solved(&data));

		data.insert("active_issues_count".to_string(), json!(TRIGGER_THRESHOLD));
		assert!(!is_solved(&data));
	}
}
