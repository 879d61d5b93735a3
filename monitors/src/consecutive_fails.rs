//! Self-check: flags monitors whose last few executions all failed.
//! Mirrors `monitor_consecutive_fails` from the reference implementation,
//! adapted to read the platform's own execution history instead of a
//! separate application database.

use std::sync::Arc;

use futures::future::FutureExt;
use serde_json::{json, Map, Value};
use sqlx::SqlitePool;

use warden_db::{ExecutionStatus, MonitorExecutionRepository, MonitorRepository};
use warden_loader::ModuleFactory;
use warden_module::{
	AlertOptions, IssueOptions, ModuleBuilder, MonitorModule, MonitorOptions, PriorityLevels, RoutineContext, Rule,
	ValueOperation,
};

/// How many of a monitor's most recent executions to look back over.
const LOOKBACK: i64 = 20;

async fn consecutive_fail_count(executions: &MonitorExecutionRepository, monitor_id: warden_core::MonitorId) -> anyhow::Result<i64> {
	let recent = executions.get_recent_by_monitor(monitor_id, LOOKBACK).await?;
	let mut failed_count = 0;
	for execution in &recent {
		if execution.status == ExecutionStatus::Failed {
			failed_count += 1;
		} else {
			break;
		}
	}
	Ok(failed_count)
}

fn issue_entry(monitor: &warden_db::Monitor, failed_count: i64) -> Map<String, Value> {
	let mut item = Map::new();
	item.insert("monitor_id".to_string(), json!(monitor.id.0));
	item.insert("monitor_name".to_string(), json!(monitor.name));
	item.insert("monitor_enabled".to_string(), json!(monitor.enabled));
	item.insert("failed_count".to_string(), json!(failed_count));
	item
}

fn build(pool: SqlitePool) -> MonitorModule {
	let search_pool = pool.clone();
	let update_pool = pool;

	let search = Arc::new(move |_ctx: RoutineContext| {
		let pool = search_pool.clone();
		async move {
			let monitors = MonitorRepository::new(pool.clone());
			let executions = MonitorExecutionRepository::new(pool);
			let mut items = Vec::new();
			for monitor in monitors.get_all_enabled().await? {
				let failed_count = consecutive_fail_count(&executions, monitor.id).await?;
				if failed_count > 0 {
					items.push(issue_entry(&monitor, failed_count));
				}
			}
			Ok(items)
		}
		.boxed()
	});

	let update = Arc::new(move |ctx: RoutineContext| {
		let pool = update_pool.clone();
		async move {
			let monitors = MonitorRepository::new(pool.clone());
			let executions = MonitorExecutionRepository::new(pool);
			let mut items = Vec::new();
			for issue_data in ctx.issues_data {
				let Some(monitor_id) = issue_data.get("monitor_id").and_then(Value::as_i64) else {
					continue;
				};
				let monitor_id = warden_core::MonitorId::new(monitor_id);
				let Some(monitor) = monitors.get_by_id(monitor_id).await? else {
					continue;
				};
				let failed_count = consecutive_fail_count(&executions, monitor_id).await?;
				items.push(issue_entry(&monitor, failed_count));
			}
			Ok(items)
		}
		.boxed()
	});

	let is_solved = Arc::new(|data: &Map<String, Value>| {
		let enabled = data.get("monitor_enabled").and_then(Value::as_bool).unwrap_or(true);
		let failed_count = data.get("failed_count").and_then(Value::as_i64).unwrap_or(0);
		!enabled || failed_count == 0
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
				value_key: "failed_count".to_string(),
				operation: ValueOperation::GreaterThan,
				priority_levels: PriorityLevels {
					moderate: Some(3),
					high: Some(5),
					critical: Some(10),
					..Default::default()
				},
			},
			dismiss_acknowledge_on_new_issues: true,
		},
		search,
	)
	.with_update(update)
	.with_is_solved(is_solved)
	.build()
}

pub fn factory(pool: SqlitePool) -> Arc<dyn ModuleFactory> {
	Arc::new(move || build(pool.clone()))
}
