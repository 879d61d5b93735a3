//! Step 2 of the per-monitor sequence: refresh every active issue's data
//! through the monitor's `update()` callable, if it has one.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use warden_db::{Issue, Monitor};
use warden_module::{EventName, MonitorModule, RoutineContext};

use crate::error::{Result, RoutineError};
use crate::events::{publish_event, EventSource};
use crate::monitor_handler::Services;
use crate::variables::load_variables;

pub async fn run_update(services: &Services<'_>, monitor: &Monitor, module: &MonitorModule) -> Result<()> {
	let Some(update) = &module.update else {
		return Ok(());
	};

	let active = services.issues.get_active_by_monitor(monitor.id).await?;
	if active.is_empty() {
		return Ok(());
	}

	let model_key = module.issue_options.model_id_key.as_str();
	let ctx = RoutineContext {
		monitor_id: monitor.id,
		variables: load_variables(services.variables, monitor.id).await?,
		issues_data: active.iter().map(|issue| issue.data.clone()).collect(),
	};

	let updated = update(ctx)
		.await
		.map_err(|source| RoutineError::MonitorCode { routine: "update", source })?;

	let mut seen_in_batch = HashSet::new();
	for item in updated {
		let Some(model_id) = item.get(model_key).and_then(Value::as_str).map(str::to_string) else {
			warn!(monitor = %monitor.name, "update result missing model id key, skipping");
			continue;
		};
		if !seen_in_batch.insert(model_id.clone()) {
			continue;
		}

		let Some(issue) = find_by_model_id(&active, &model_id) else {
			warn!(monitor = %monitor.name, model_id, "update returned a model id with no matching active issue, skipping");
			continue;
		};

		services.issues.update_data(issue.id, &item).await?;

		let (event, label) = match &module.is_solved {
			Some(is_solved) if is_solved(&item) => (EventName::IssueUpdatedSolved, "solved"),
			_ => (EventName::IssueUpdatedNotSolved, "not_solved"),
		};
		publish_event(
			services.queue,
			&module.reaction_options,
			services.log_all_events,
			EventSource::Issue,
			issue.id.0,
			monitor.id,
			event,
			json!({"model_id": model_id, "data": item, "resolution": label}),
			None,
		)
		.await?;
	}

	services.monitors.set_update_executed_at(monitor.id, Utc::now()).await?;
	Ok(())
}

fn find_by_model_id<'a>(issues: &'a [Issue], model_id: &str) -> Option<&'a Issue> {
	issues.iter().find(|issue| issue.model_id == model_id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use serde_json::json;
	use std::sync::Arc;
	use warden_db::testing::create_test_pool;
	use warden_db::{AlertRepository, IssueRepository, MonitorExecutionRepository, MonitorRepository, VariableRepository};
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, Rule};
	use warden_queue::{InMemoryQueue, Queue};

	fn module_with_update(update_result: Vec<Value>) -> MonitorModule {
		ModuleBuilder::new(
			MonitorOptions {
				search_cron: None,
				update_cron: Some("* * * * *".to_string()),
				max_issues_creation: 10,
				execution_timeout_secs: 30,
			},
			IssueOptions {
				model_id_key: "id".to_string(),
				solvable: true,
				unique: false,
			},
			AlertOptions {
				rule: Rule::Count {
					priority_levels: PriorityLevels::default(),
				},
				dismiss_acknowledge_on_new_issues: false,
			},
			Arc::new(|_| async { Ok(Vec::new()) }.boxed()),
		)
		.with_update(Arc::new(move |_| {
			let update_result = update_result.clone();
			async move {
				Ok(update_result
					.into_iter()
					.map(|v| match v {
						Value::Object(m) => m,
						_ => serde_json::Map::new(),
					})
					.collect())
			}
			.boxed()
		}))
		.with_is_solved(Arc::new(|data| data.get("solved").and_then(Value::as_bool).unwrap_or(false)))
		.build()
	}

	#[tokio::test]
	async fn applies_matching_updates_and_emits_not_solved_event() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		issues
			.create_batch(monitor.id, vec![("1".to_string(), serde_json::Map::new())])
			.await
			.unwrap();

		let module = module_with_update(vec![json!({"id": "1", "solved": false})]);
		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		run_update(&services, &monitor, &module).await.unwrap();

		let active = issues.get_active_by_monitor(monitor.id).await.unwrap();
		assert_eq!(active[0].data["solved"], Value::Bool(false));

		let (_, message) = queue.receive(std::time::Duration::from_millis(10)).await.unwrap().unwrap();
		assert_eq!(message.payload["event_name"], "issue_updated_not_solved");
	}

	#[tokio::test]
	async fn skips_update_results_with_no_matching_active_issue() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		issues
			.create_batch(monitor.id, vec![("1".to_string(), serde_json::Map::new())])
			.await
			.unwrap();

		let module = module_with_update(vec![json!({"id": "does-not-exist"})]);
		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		run_update(&services, &monitor, &module).await.unwrap();
		assert!(queue.receive(std::time::Duration::from_millis(10)).await.unwrap().is_none());
	}
}
