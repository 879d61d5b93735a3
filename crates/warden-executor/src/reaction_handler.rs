//! Handles a `event` message: runs every reaction callback the target
//! monitor has registered for the event, each under its own timeout,
//! independent of the others' outcome.

use std::time::Duration;

use tracing::{error, warn};
use warden_core::MonitorId;
use warden_db::MonitorRepository;
use warden_module::EventName;
use warden_registry::Registry;

use crate::error::{BaseCoreException, Result};
use crate::metrics::ExecutorMetrics;

pub async fn handle_event(
	monitors: &MonitorRepository,
	registry: &Registry,
	metrics: &ExecutorMetrics,
	reaction_timeout: Duration,
	registry_wait_timeout: Duration,
	payload: serde_json::Value,
) -> Result<()> {
	let monitor_id = match payload.get("event_source_monitor_id").and_then(|v| v.as_i64()) {
		Some(id) => MonitorId::new(id),
		None => {
			warn!(?payload, "event message missing event_source_monitor_id, dropping");
			return Ok(());
		}
	};
	let Some(event_name) = payload.get("event_name").and_then(|v| v.as_str()).and_then(EventName::parse) else {
		warn!(?payload, "event message has an unrecognised event_name, dropping");
		return Ok(());
	};

	if monitors.get_by_id(monitor_id).await?.is_none() {
		warn!(?monitor_id, "monitor not found, skipping event");
		return Ok(());
	}

	registry.wait_monitor_loaded(monitor_id, registry_wait_timeout).await?;
	let Some(module) = registry.get_module(monitor_id) else {
		warn!(?monitor_id, "monitor loaded signal fired but module is absent, skipping event");
		return Ok(());
	};

	for callback_name in module.reaction_options.callbacks_for(event_name) {
		let Some(callback) = module.reaction_callbacks.get(callback_name) else {
			warn!(?monitor_id, callback_name, "no reaction callback registered under this name, skipping");
			continue;
		};

		match tokio::time::timeout(reaction_timeout, callback(payload.clone())).await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => {
				if let Some(fatal) = e.downcast_ref::<BaseCoreException>() {
					error!(?monitor_id, callback_name, %fatal, "fatal error in reaction callback");
					return Err(BaseCoreException::new(fatal.0.clone()).into());
				}
				ExecutorMetrics::inc(&metrics.reaction_errors);
				error!(?monitor_id, callback_name, error = %e, "reaction callback failed");
			}
			Err(_) => {
				ExecutorMetrics::inc(&metrics.reaction_timeouts);
				error!(?monitor_id, callback_name, timeout_secs = reaction_timeout.as_secs(), "reaction callback timed out");
			}
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use warden_db::testing::create_test_pool;
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, ReactionOptions, Rule};

	fn base_module(reaction_options: ReactionOptions, callback: warden_module::ReactionFn) -> warden_module::MonitorModule {
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
		.with_reaction_options(reaction_options)
		.with_reaction_callback("notify", callback)
		.build()
	}

	#[tokio::test]
	async fn runs_the_registered_callback_for_the_event() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let metrics = ExecutorMetrics::default();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let calls = Arc::new(AtomicUsize::new(0));
		let calls_clone = calls.clone();
		let callback: warden_module::ReactionFn = Arc::new(move |_payload| {
			let calls = calls_clone.clone();
			async move {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}
			.boxed()
		});

		let mut reactions = std::collections::HashMap::new();
		reactions.insert(EventName::AlertCreated, vec!["notify".to_string()]);
		registry.add(monitor.id, "m", base_module(ReactionOptions { reactions }, callback));
		registry.set_ready();

		let payload = json!({"event_source_monitor_id": monitor.id.0, "event_name": "alert_created"});
		handle_event(&monitors, &registry, &metrics, Duration::from_millis(200), Duration::from_millis(200), payload)
			.await
			.unwrap();

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(metrics.snapshot().reaction_errors, 0);
	}

	#[tokio::test]
	async fn a_callback_error_is_counted_but_does_not_fail_the_handler() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let metrics = ExecutorMetrics::default();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let callback: warden_module::ReactionFn = Arc::new(|_payload| async { Err(anyhow::anyhow!("boom")) }.boxed());

		let mut reactions = std::collections::HashMap::new();
		reactions.insert(EventName::AlertCreated, vec!["notify".to_string()]);
		registry.add(monitor.id, "m", base_module(ReactionOptions { reactions }, callback));
		registry.set_ready();

		let payload = json!({"event_source_monitor_id": monitor.id.0, "event_name": "alert_created"});
		handle_event(&monitors, &registry, &metrics, Duration::from_millis(200), Duration::from_millis(200), payload)
			.await
			.unwrap();

		assert_eq!(metrics.snapshot().reaction_errors, 1);
	}

	#[tokio::test]
	async fn a_callback_that_exceeds_its_timeout_is_counted_and_skipped() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let metrics = ExecutorMetrics::default();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let callback: warden_module::ReactionFn = Arc::new(|_payload| {
			async {
				tokio::time::sleep(Duration::from_secs(5)).await;
				Ok(())
			}
			.boxed()
		});

		let mut reactions = std::collections::HashMap::new();
		reactions.insert(EventName::AlertCreated, vec!["notify".to_string()]);
		registry.add(monitor.id, "m", base_module(ReactionOptions { reactions }, callback));
		registry.set_ready();

		let payload = json!({"event_source_monitor_id": monitor.id.0, "event_name": "alert_created"});
		handle_event(&monitors, &registry, &metrics, Duration::from_millis(20), Duration::from_millis(200), payload)
			.await
			.unwrap();

		assert_eq!(metrics.snapshot().reaction_timeouts, 1);
	}

	#[tokio::test]
	async fn an_event_for_an_unknown_monitor_is_dropped_without_error() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let metrics = ExecutorMetrics::default();

		let payload = json!({"event_source_monitor_id": 999, "event_name": "alert_created"});
		handle_event(&monitors, &registry, &metrics, Duration::from_millis(200), Duration::from_millis(20), payload)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn an_unparseable_event_name_is_dropped_without_error() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool);
		let registry = Registry::new();
		let metrics = ExecutorMetrics::default();

		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let payload = json!({"event_source_monitor_id": monitor.id.0, "event_name": "not_a_real_event"});
		handle_event(&monitors, &registry, &metrics, Duration::from_millis(200), Duration::from_millis(20), payload)
			.await
			.unwrap();
	}
}
