//! Orchestrates one executor-triggered run of a monitor's routine
//! sequence: update, solve, search, then the alert routine, wrapped in
//! an execution-timeout budget and a heartbeat sibling task.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, warn};
use warden_db::{AlertRepository, ExecutionStatus, IssueRepository, MonitorExecutionRepository, MonitorRepository, VariableRepository};
use warden_module::MonitorModule;
use warden_queue::Queue;

use crate::alert_lifecycle::AlertContext;
use crate::alert_routine::run_alert_routine;
use crate::error::Result;
use crate::search::run_search;
use crate::solve::run_solve;
use crate::update::run_update;

/// The repository/queue handles a monitor run needs. Borrowed for the
/// duration of one run; the caller owns the underlying pools.
pub struct Services<'a> {
	pub monitors: &'a MonitorRepository,
	pub issues: &'a IssueRepository,
	pub alerts: &'a AlertRepository,
	pub variables: &'a VariableRepository,
	pub executions: &'a MonitorExecutionRepository,
	pub queue: &'a dyn Queue,
	pub log_all_events: bool,
}

/// How often the heartbeat sibling task refreshes `last_heartbeat`
/// while a monitor run is in flight.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Runs one full pass of `monitor_id`'s routine sequence against
/// `module`. Returns `Ok(())` whether the pass succeeded or failed
/// gracefully (timeout, panic-free routine error) — failures are
/// recorded as a `MonitorExecution` row and logged, not propagated,
/// since one monitor's misbehavior must not stop the others.
pub async fn run_monitor(services: &Services<'_>, monitor_id: warden_core::MonitorId, module: &MonitorModule) -> Result<()> {
	let Some(monitor) = services.monitors.get_by_id(monitor_id).await? else {
		warn!(?monitor_id, "monitor vanished before its run could start");
		return Ok(());
	};

	if monitor.running {
		warn!(monitor = %monitor.name, "skipping run, a previous execution is still marked running");
		return Ok(());
	}

	services.monitors.set_running(monitor_id, true).await?;
	let execution_id = services.executions.record_start(monitor_id).await?;

	let timeout = Duration::from_secs(module.options.execution_timeout_secs.max(1) as u64);
	let heartbeat_interval = DEFAULT_HEARTBEAT_INTERVAL.min(timeout);

	let heartbeat = {
		let monitors = services.monitors.clone();
		tokio::spawn(async move {
			loop {
				tokio::time::sleep(heartbeat_interval).await;
				if monitors.set_heartbeat(monitor_id, chrono::Utc::now()).await.is_err() {
					break;
				}
			}
		})
	};

	let deadline = Instant::now() + timeout;
	let outcome = tokio::time::timeout_at(deadline, run_sequence(services, &monitor, module)).await;

	heartbeat.abort();

	match outcome {
		Ok(Ok(())) => {
			services.executions.record_finish(execution_id, ExecutionStatus::Success, None).await?;
		}
		Ok(Err(e)) => {
			error!(monitor = %monitor.name, error = %e, "monitor run failed");
			services
				.executions
				.record_finish(execution_id, ExecutionStatus::Failed, Some(&e.to_string()))
				.await?;
		}
		Err(_) => {
			error!(monitor = %monitor.name, timeout_secs = timeout.as_secs(), "monitor run timed out");
			services
				.executions
				.record_finish(execution_id, ExecutionStatus::Failed, Some("timeout"))
				.await?;
		}
	}

	services.monitors.clear_queued_and_running(monitor_id).await?;
	Ok(())
}

async fn run_sequence(services: &Services<'_>, monitor: &warden_db::Monitor, module: &MonitorModule) -> Result<()> {
	run_update(services, monitor, module).await?;
	run_solve(services, monitor, module).await?;
	if module.options.search_cron.is_some() {
		run_search(services, monitor, module).await?;
	}

	let alert_ctx = AlertContext {
		alerts: services.alerts,
		issues: services.issues,
		queue: services.queue,
		reaction_options: &module.reaction_options,
		log_all_events: services.log_all_events,
	};
	run_alert_routine(&alert_ctx, monitor.id, &module.alert_options).await?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use serde_json::json;
	use std::sync::Arc;
	use warden_db::testing::create_test_pool;
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, Rule};
	use warden_queue::InMemoryQueue;

	fn module_always_finds_one() -> MonitorModule {
		ModuleBuilder::new(
			MonitorOptions {
				search_cron: Some("* * * * *".to_string()),
				update_cron: None,
				max_issues_creation: 5,
				execution_timeout_secs: 5,
			},
			IssueOptions {
				model_id_key: "id".to_string(),
				solvable: false,
				unique: false,
			},
			AlertOptions {
				rule: Rule::Count {
					priority_levels: PriorityLevels {
						low: Some(0),
						..Default::default()
					},
				},
				dismiss_acknowledge_on_new_issues: false,
			},
			Arc::new(|_| async { Ok(vec![json!({"id": "1"}).as_object().unwrap().clone()]) }.boxed()),
		)
		.build()
	}

	#[tokio::test]
	async fn a_full_run_creates_an_issue_and_an_alert_and_records_success() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let module = module_always_finds_one();

		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		run_monitor(&services, monitor.id, &module).await.unwrap();

		assert_eq!(issues.get_active_by_monitor(monitor.id).await.unwrap().len(), 1);
		assert_eq!(alerts.get_active_by_monitor(monitor.id).await.unwrap().len(), 1);

		let recent = executions.get_recent_by_monitor(monitor.id, 1).await.unwrap();
		assert_eq!(recent[0].status, ExecutionStatus::Success);

		let reloaded = monitors.get_by_id(monitor.id).await.unwrap().unwrap();
		assert!(!reloaded.running && !reloaded.queued);
	}

	#[tokio::test]
	async fn a_run_already_marked_running_is_skipped() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool.clone());
		let variables = VariableRepository::new(pool.clone());
		let executions = MonitorExecutionRepository::new(pool.clone());
		let queue = InMemoryQueue::new(std::time::Duration::from_secs(30));

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		monitors.set_running(monitor.id, true).await.unwrap();
		let module = module_always_finds_one();

		let services = Services {
			monitors: &monitors,
			issues: &issues,
			alerts: &alerts,
			variables: &variables,
			executions: &executions,
			queue: queue.as_ref(),
			log_all_events: false,
		};

		run_monitor(&services, monitor.id, &module).await.unwrap();
		assert!(executions.get_recent_by_monitor(monitor.id, 10).await.unwrap().is_empty());
	}
}
