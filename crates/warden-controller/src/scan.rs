//! One controller tick: wait for the registry, enumerate enabled
//! monitors, decide triggering, and dispatch `process_monitor` messages
//! under a bounded concurrency fan-out.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{error, warn};
use warden_db::MonitorRepository;
use warden_queue::{MessageType, Queue};
use warden_registry::Registry;

use crate::error::Result;
use crate::metrics::ControllerMetrics;
use crate::trigger::decide_tasks;

/// Runs one scan tick. Returns the number of monitors dispatched.
pub async fn run_tick(
	monitors: &MonitorRepository,
	registry: &Registry,
	queue: &dyn Queue,
	metrics: &ControllerMetrics,
	concurrency: usize,
	timezone: &str,
	registry_ready_timeout: Duration,
) -> Result<usize> {
	if registry.wait_ready(registry_ready_timeout).await.is_err() {
		warn!("registry not ready, skipping this controller tick");
		return Ok(0);
	}

	let enabled = monitors.get_all_enabled().await?;
	let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
	let now = Utc::now();

	let mut handles = Vec::with_capacity(enabled.len());
	for monitor in enabled {
		let Some(module) = registry.get_module(monitor.id) else {
			ControllerMetrics::inc(&metrics.monitors_not_registered);
			continue;
		};

		let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
		let monitors = monitors.clone();
		let metrics_monitors_processed = &metrics.monitors_processed;
		let metrics_dispatch_errors = &metrics.dispatch_errors;
		let timezone = timezone.to_string();

		let dispatched = async move {
			let _permit = permit;
			let tasks = match decide_tasks(&monitor, &module.options, &timezone, now) {
				Ok(tasks) => tasks,
				Err(e) => {
					error!(monitor = %monitor.name, error = %e, "failed to evaluate trigger");
					return false;
				}
			};
			if tasks.is_empty() {
				return false;
			}

			if let Err(e) = monitors.set_queued(monitor.id, true).await {
				error!(monitor = %monitor.name, error = %e, "failed to mark monitor queued");
				return false;
			}

			let payload = json!({"monitor_id": monitor.id.0, "tasks": tasks});
			match queue.send(MessageType::ProcessMonitor, payload).await {
				Ok(()) => {
					ControllerMetrics::inc(metrics_monitors_processed);
					true
				}
				Err(e) => {
					error!(monitor = %monitor.name, error = %e, "dispatch failed, reverting queued flag");
					ControllerMetrics::inc(metrics_dispatch_errors);
					let _ = monitors.set_queued(monitor.id, false).await;
					false
				}
			}
		};

		handles.push(dispatched);
	}

	let results = futures::future::join_all(handles).await;
	let dispatched = results.into_iter().filter(|d| *d).count();
	Ok(dispatched)
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use serde_json::json as json_macro;
	use std::sync::Arc as StdArc;
	use warden_db::testing::create_test_pool;
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, Rule};
	use warden_queue::InMemoryQueue;

	fn always_due_module() -> warden_module::MonitorModule {
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
					priority_levels: PriorityLevels { low: Some(0), ..Default::default() },
				},
				dismiss_acknowledge_on_new_issues: false,
			},
			StdArc::new(|_| async { Ok(vec![]) }.boxed()),
		)
		.build()
	}

	#[tokio::test]
	async fn a_registered_due_monitor_is_queued_and_dispatched() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let queue = InMemoryQueue::new(Duration::from_secs(30));
		let metrics = ControllerMetrics::default();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		registry.add(monitor.id, "m", always_due_module());
		registry.set_ready();

		let dispatched = run_tick(&monitors, &registry, queue.as_ref(), &metrics, 4, "UTC", Duration::from_millis(100))
			.await
			.unwrap();

		assert_eq!(dispatched, 1);
		let reloaded = monitors.get_by_id(monitor.id).await.unwrap().unwrap();
		assert!(reloaded.queued);
		assert_eq!(metrics.snapshot().monitors_processed, 1);

		let (_, message) = queue.receive(Duration::from_millis(50)).await.unwrap().unwrap();
		assert_eq!(message.payload["monitor_id"], json_macro!(monitor.id.0));
	}

	#[tokio::test]
	async fn a_monitor_missing_from_the_registry_is_counted_not_dispatched() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let queue = InMemoryQueue::new(Duration::from_secs(30));
		let metrics = ControllerMetrics::default();

		monitors.get_or_create_by_name("m").await.unwrap();
		registry.set_ready();

		let dispatched = run_tick(&monitors, &registry, queue.as_ref(), &metrics, 4, "UTC", Duration::from_millis(100))
			.await
			.unwrap();

		assert_eq!(dispatched, 0);
		assert_eq!(metrics.snapshot().monitors_not_registered, 1);
	}

	#[tokio::test]
	async fn registry_never_ready_skips_the_tick_without_error() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let queue = InMemoryQueue::new(Duration::from_secs(30));
		let metrics = ControllerMetrics::default();

		let dispatched = run_tick(&monitors, &registry, queue.as_ref(), &metrics, 4, "UTC", Duration::from_millis(20))
			.await
			.unwrap();

		assert_eq!(dispatched, 0);
	}
}
