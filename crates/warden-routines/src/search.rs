//! Step 4 of the per-monitor sequence: run `search()`, dedupe and
//! filter its results, and batch-create the survivors as active issues.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use warden_db::{Issue, Monitor};
use warden_module::{EventName, MonitorModule, RoutineContext};

use crate::alert_lifecycle::AlertContext;
use crate::error::{Result, RoutineError};
use crate::events::{publish_event, EventSource};
use crate::monitor_handler::Services;
use crate::variables::load_variables;

pub async fn run_search(services: &Services<'_>, monitor: &Monitor, module: &MonitorModule) -> Result<Vec<Issue>> {
	let existing_active = services.issues.get_active_by_monitor(monitor.id).await?;

	let ctx = RoutineContext {
		monitor_id: monitor.id,
		variables: load_variables(services.variables, monitor.id).await?,
		issues_data: Vec::new(),
	};
	let found = (module.search)(ctx)
		.await
		.map_err(|source| RoutineError::MonitorCode { routine: "search", source })?;

	let model_key = module.issue_options.model_id_key.as_str();
	let mut seen_in_batch = HashSet::new();
	let mut to_create = Vec::new();

	for item in found {
		let Some(model_id) = item.get(model_key).and_then(Value::as_str).map(str::to_string) else {
			warn!(monitor = %monitor.name, "search result missing model id key, skipping");
			continue;
		};

		if !seen_in_batch.insert(model_id.clone()) {
			continue;
		}
		if existing_active.iter().any(|issue| issue.model_id == model_id) {
			continue;
		}
		if module.issue_options.unique && services.issues.exists_any_by_model_id(monitor.id, &model_id).await? {
			continue;
		}
		if let Some(is_solved) = &module.is_solved {
			if is_solved(&item) {
				continue;
			}
		}

		to_create.push((model_id, item));
	}

	let max = module.options.max_issues_creation as usize;
	if to_create.len() > max {
		warn!(monitor = %monitor.name, found = to_create.len(), max, "truncating search results to max_issues_creation");
		to_create.truncate(max);
	}

	let created = services.issues.create_batch(monitor.id, to_create).await?;

	let alert_ctx = AlertContext {
		alerts: services.alerts,
		issues: services.issues,
		queue: services.queue,
		reaction_options: &module.reaction_options,
		log_all_events: services.log_all_events,
	};
	for issue in &created {
		publish_event(
			alert_ctx.queue,
			alert_ctx.reaction_options,
			alert_ctx.log_all_events,
			EventSource::Issue,
			issue.id.0,
			monitor.id,
			EventName::IssueCreated,
			json!({"model_id": issue.model_id, "data": issue.data}),
			None,
		)
		.await?;
	}

	services.monitors.set_search_executed_at(monitor.id, Utc::now()).await?;
	Ok(created)
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
	use warden_queue::InMemoryQueue;

	fn module_returning(items: Vec<Value>) -> MonitorModule {
		ModuleBuilder::new(
			MonitorOptions {
				search_cron: Some("* * * * *".to_string()),
				update_cron: None,
				max_issues_creation: 2,
				execution_timeout_secs: 30,
			},
			IssueOptions {
				model_id_key: "id".to_string(),
				solvable: false,
				unique: false,
			},
			AlertOptions {
				rule: Rule::Count {
					priority_levels: PriorityLevels::default(),
				},
				dismiss_acknowledge_on_new_issues: false,
			},
			Arc::new(move |_| {
				let items = items.clone();
				async move {
					Ok(items
						.into_iter()
						.map(|v| match v {
							Value::Object(m) => m,
							_ => serde_json::Map::new(),
						})
						.collect())
				}
				.boxed()
			}),
		)
		.build()
	}

	#[tokio::test]
	async fn creates_issues_and_truncates_to_max_issues_creation() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let module = module_returning(vec![json!({"id": "1"}), json!({"id": "2"}), json!({"id": "3"})]);

		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		let created = run_search(&services, &monitor, &module).await.unwrap();
		assert_eq!(created.len(), 2, "should truncate to max_issues_creation");
	}

	#[tokio::test]
	async fn skips_results_missing_the_model_id_key() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let module = module_returning(vec![json!({"other": "x"})]);

		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		let created = run_search(&services, &monitor, &module).await.unwrap();
		assert!(created.is_empty());
	}

	#[tokio::test]
	async fn unique_option_skips_previously_solved_model_ids() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let created = issues
			.create_batch(monitor.id, vec![("1".to_string(), serde_json::Map::new())])
			.await
			.unwrap();
		issues.solve(created[0].id, Utc::now()).await.unwrap();

		let mut module = module_returning(vec![json!({"id": "1"})]);
		module.issue_options.unique = true;

		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		let created = run_search(&services, &monitor, &module).await.unwrap();
		assert!(created.is_empty(), "unique option must prevent re-creating a solved issue's model_id");
	}
}
