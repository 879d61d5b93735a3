//! One runner's message-processing cycle: receive, dispatch by message
//! type, keep the message invisible via a heartbeat sibling task for
//! the duration, delete only on success.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use warden_db::{AlertRepository, IssueRepository, MonitorExecutionRepository, MonitorRepository, VariableRepository};
use warden_module::MonitorModule;
use warden_queue::{Message, MessageHandle, MessageType, Queue};
use warden_registry::Registry;
use warden_routines::Services as RoutineServices;

use crate::error::{ExecutorError, Result};
use crate::metrics::ExecutorMetrics;
use crate::reaction_handler::handle_event;
use crate::request_handler::handle_request;

/// The repository handles every runner needs; shared (cloned cheaply,
/// each wraps a `SqlitePool`) across the whole pool.
#[derive(Clone)]
pub struct ExecutorRepos {
	pub monitors: MonitorRepository,
	pub issues: IssueRepository,
	pub alerts: AlertRepository,
	pub variables: VariableRepository,
	pub executions: MonitorExecutionRepository,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
	pub reaction_timeout: Duration,
	pub request_timeout: Duration,
	pub registry_ready_timeout: Duration,
	pub heartbeat_interval: Duration,
	pub log_all_events: bool,
}

/// Runs `queue.heartbeat(handle)` on a fixed cadence until aborted from
/// outside; there is no other exit from this loop.
async fn heartbeat_loop(queue: Arc<dyn Queue>, handle: MessageHandle, interval: Duration) {
	loop {
		tokio::time::sleep(interval).await;
		if let Err(e) = queue.heartbeat(handle).await {
			warn!(error = %e, "failed to extend message visibility, stopping heartbeat");
			return;
		}
	}
}

/// Processes one received message, wrapping the dispatch in a
/// heartbeat sibling task that is always aborted on exit. Deletes the
/// message on success; leaves it in flight (for at-least-once
/// redelivery) on any other outcome.
pub async fn process_message(
	repos: &ExecutorRepos,
	registry: &Registry,
	queue: Arc<dyn Queue>,
	metrics: &ExecutorMetrics,
	config: &ExecutorConfig,
	handle: MessageHandle,
	message: Message,
) -> Result<()> {
	info!(message_type = message.message_type.as_str(), "processing message");

	let heartbeat = tokio::spawn(heartbeat_loop(queue.clone(), handle, config.heartbeat_interval));

	let outcome = dispatch(repos, registry, queue.as_ref(), metrics, config, &message).await;

	heartbeat.abort();

	match outcome {
		Ok(()) => {
			queue.delete(handle).await?;
			ExecutorMetrics::inc(&metrics.messages_processed);
			Ok(())
		}
		Err(ExecutorError::Fatal(e)) => {
			error!(message_type = message.message_type.as_str(), %e, "fatal error processing message, not deleting");
			Err(ExecutorError::Fatal(e))
		}
		Err(e) => {
			ExecutorMetrics::inc(&metrics.messages_errored);
			error!(message_type = message.message_type.as_str(), error = %e, "error processing message, not deleting");
			Ok(())
		}
	}
}

async fn dispatch(
	repos: &ExecutorRepos,
	registry: &Registry,
	queue: &dyn Queue,
	metrics: &ExecutorMetrics,
	config: &ExecutorConfig,
	message: &Message,
) -> Result<()> {
	if registry.wait_ready(config.registry_ready_timeout).await.is_err() {
		warn!("registry not ready, leaving message in flight for redelivery");
		return Err(ExecutorError::Registry(warden_registry::RegistryError::MonitorsLoadError));
	}

	match message.message_type {
		MessageType::ProcessMonitor => process_monitor(repos, registry, queue, config, message).await,
		MessageType::Event => {
			handle_event(&repos.monitors, registry, metrics, config.reaction_timeout, config.registry_ready_timeout, message.payload.clone()).await
		}
		MessageType::Request => {
			handle_request(
				&repos.alerts,
				&repos.issues,
				registry,
				queue,
				metrics,
				config.request_timeout,
				config.registry_ready_timeout,
				message.payload.clone(),
			)
			.await
		}
	}
}

async fn process_monitor(repos: &ExecutorRepos, registry: &Registry, queue: &dyn Queue, config: &ExecutorConfig, message: &Message) -> Result<()> {
	let Some(monitor_id) = message.payload.get("monitor_id").and_then(|v| v.as_i64()) else {
		warn!(payload = ?message.payload, "process_monitor message missing monitor_id, dropping");
		return Ok(());
	};
	let monitor_id = warden_core::MonitorId::new(monitor_id);

	let module: MonitorModule = match registry.get_module(monitor_id) {
		Some(m) => m,
		None => {
			warn!(?monitor_id, "monitor not registered, leaving message in flight for redelivery");
			return Err(ExecutorError::Registry(warden_registry::RegistryError::MonitorNotLoaded(monitor_id.0)));
		}
	};

	let services = RoutineServices {
		monitors: &repos.monitors,
		issues: &repos.issues,
		alerts: &repos.alerts,
		variables: &repos.variables,
		executions: &repos.executions,
		queue,
		log_all_events: config.log_all_events,
	};

	warden_routines::run_monitor(&services, monitor_id, &module).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use serde_json::json;
	use warden_db::testing::create_test_pool;
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, Rule};
	use warden_queue::InMemoryQueue;

	fn config() -> ExecutorConfig {
		ExecutorConfig {
			reaction_timeout: Duration::from_millis(200),
			request_timeout: Duration::from_millis(200),
			registry_ready_timeout: Duration::from_millis(200),
			heartbeat_interval: Duration::from_millis(20),
			log_all_events: false,
		}
	}

	async fn repos() -> ExecutorRepos {
		let pool = create_test_pool().await;
		ExecutorRepos {
			monitors: MonitorRepository::new(pool.clone()),
			issues: IssueRepository::new(pool.clone()),
			alerts: AlertRepository::new(pool.clone()),
			variables: VariableRepository::new(pool.clone()),
			executions: MonitorExecutionRepository::new(pool),
		}
	}

	fn empty_search_module() -> MonitorModule {
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
					priority_levels: PriorityLevels::default(),
				},
				dismiss_acknowledge_on_new_issues: false,
			},
			Arc::new(|_| async { Ok(vec![]) }.boxed()),
		)
		.build()
	}

	#[tokio::test]
	async fn a_process_monitor_message_for_a_registered_monitor_is_deleted_on_success() {
		let repos = repos().await;
		let registry = Registry::new();
		let queue = InMemoryQueue::new(Duration::from_secs(30));
		let metrics = ExecutorMetrics::default();

		let monitor = repos.monitors.get_or_create_by_name("m").await.unwrap();
		registry.add(monitor.id, "m", empty_search_module());
		registry.set_ready();

		let payload = json!({"monitor_id": monitor.id.0, "tasks": ["search"]});
		queue.send(MessageType::ProcessMonitor, payload.clone()).await.unwrap();
		let (handle, message) = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();

		process_message(&repos, &registry, queue.clone(), &metrics, &config(), handle, message).await.unwrap();

		assert_eq!(metrics.snapshot().messages_processed, 1);
		assert!(queue.receive(Duration::from_millis(10)).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn a_process_monitor_message_for_an_unregistered_monitor_is_left_in_flight() {
		let repos = repos().await;
		let registry = Registry::new();
		let queue = InMemoryQueue::new(Duration::from_secs(30));
		let metrics = ExecutorMetrics::default();

		let monitor = repos.monitors.get_or_create_by_name("m").await.unwrap();
		registry.set_ready();

		let payload = json!({"monitor_id": monitor.id.0, "tasks": ["search"]});
		queue.send(MessageType::ProcessMonitor, payload.clone()).await.unwrap();
		let (handle, message) = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();

		process_message(&repos, &registry, queue.clone(), &metrics, &config(), handle, message).await.unwrap();

		assert_eq!(metrics.snapshot().messages_processed, 0);
		assert_eq!(metrics.snapshot().messages_errored, 1);
	}

	#[tokio::test]
	async fn a_message_received_before_the_registry_is_ready_is_left_in_flight() {
		let repos = repos().await;
		let registry = Registry::new();
		let queue = InMemoryQueue::new(Duration::from_secs(30));
		let metrics = ExecutorMetrics::default();

		let monitor = repos.monitors.get_or_create_by_name("m").await.unwrap();
		let payload = json!({"monitor_id": monitor.id.0, "tasks": ["search"]});
		queue.send(MessageType::ProcessMonitor, payload.clone()).await.unwrap();
		let (handle, message) = queue.receive(Duration::from_millis(10)).await.unwrap().unwrap();

		process_message(&repos, &registry, queue.clone(), &metrics, &config(), handle, message).await.unwrap();

		assert_eq!(metrics.snapshot().messages_processed, 0);
	}
}
