//! Handles a `request` message: dispatches `payload.action` to a
//! static action table. Each action waits for its target monitor to be
//! loaded in the registry before mutating anything, so a request that
//! arrives just after startup does not race the loader.

use std::time::Duration;

use serde_json::Value;
use tracing::{error, warn};
use warden_core::{AlertId, IssueId, MonitorId};
use warden_db::{AlertRepository, IssueRepository};
use warden_module::ReactionOptions;
use warden_queue::{Queue, RequestPayload};
use warden_registry::Registry;
use warden_routines::AlertContext;

use crate::error::{BaseCoreException, Result};
use crate::metrics::ExecutorMetrics;

struct Services<'a> {
	alerts: &'a AlertRepository,
	issues: &'a IssueRepository,
	registry: &'a Registry,
	queue: &'a dyn Queue,
	registry_wait_timeout: Duration,
}

#[allow(clippy::too_many_arguments)]
pub async fn handle_request(
	alerts: &AlertRepository,
	issues: &IssueRepository,
	registry: &Registry,
	queue: &dyn Queue,
	metrics: &ExecutorMetrics,
	request_timeout: Duration,
	registry_wait_timeout: Duration,
	payload: Value,
) -> Result<()> {
	let request: RequestPayload = match serde_json::from_value(payload.clone()) {
		Ok(r) => r,
		Err(e) => {
			warn!(?payload, error = %e, "request message missing or malformed payload, dropping");
			return Ok(());
		}
	};

	let services = Services { alerts, issues, registry, queue, registry_wait_timeout };

	let outcome = tokio::time::timeout(request_timeout, dispatch(&services, &request)).await;
	match outcome {
		Ok(Ok(())) => Ok(()),
		Ok(Err(e)) => {
			if let Some(fatal) = e.downcast_ref::<BaseCoreException>() {
				error!(action = %request.action, %fatal, "fatal error executing request");
				return Err(BaseCoreException::new(fatal.0.clone()).into());
			}
			ExecutorMetrics::inc(&metrics.request_errors);
			error!(action = %request.action, error = %e, "request execution failed");
			Ok(())
		}
		Err(_) => {
			ExecutorMetrics::inc(&metrics.request_timeouts);
			error!(action = %request.action, timeout_secs = request_timeout.as_secs(), "request timed out");
			Ok(())
		}
	}
}

async fn dispatch(services: &Services<'_>, request: &RequestPayload) -> anyhow::Result<()> {
	match request.action.as_str() {
		"alert_acknowledge" => alert_acknowledge(services, request).await,
		"alert_lock" => alert_lock(services, request).await,
		"alert_solve" => alert_solve(services, request).await,
		"issue_drop" => issue_drop(services, request).await,
		action if action.starts_with("plugin.") => {
			warn!(action, "plugin actions are not supported by this build, dropping request");
			Ok(())
		}
		action => {
			warn!(action, "unknown request action, dropping");
			Ok(())
		}
	}
}

fn target_id(request: &RequestPayload) -> anyhow::Result<i64> {
	request
		.params
		.get("target_id")
		.and_then(|v| v.as_i64())
		.ok_or_else(|| anyhow::anyhow!("request params missing target_id"))
}

fn reaction_options_for(registry: &Registry, monitor_id: MonitorId) -> ReactionOptions {
	registry.get_module(monitor_id).map(|m| m.reaction_options).unwrap_or_default()
}

async fn alert_acknowledge(services: &Services<'_>, request: &RequestPayload) -> anyhow::Result<()> {
	let alert_id = AlertId::new(target_id(request)?);
	let Some(alert) = services.alerts.get_by_id(alert_id).await? else {
		warn!(?alert_id, "alert not found, skipping request");
		return Ok(());
	};
	services.registry.wait_monitor_loaded(alert.monitor_id, services.registry_wait_timeout).await?;
	let reaction_options = reaction_options_for(services.registry, alert.monitor_id);
	let ctx = AlertContext {
		alerts: services.alerts,
		issues: services.issues,
		queue: services.queue,
		reaction_options: &reaction_options,
		log_all_events: false,
	};
	warden_routines::acknowledge(&ctx, &alert).await?;
	Ok(())
}

async fn alert_lock(services: &Services<'_>, request: &RequestPayload) -> anyhow::Result<()> {
	let alert_id = AlertId::new(target_id(request)?);
	let Some(alert) = services.alerts.get_by_id(alert_id).await? else {
		warn!(?alert_id, "alert not found, skipping request");
		return Ok(());
	};
	services.registry.wait_monitor_loaded(alert.monitor_id, services.registry_wait_timeout).await?;
	let reaction_options = reaction_options_for(services.registry, alert.monitor_id);
	let ctx = AlertContext {
		alerts: services.alerts,
		issues: services.issues,
		queue: services.queue,
		reaction_options: &reaction_options,
		log_all_events: false,
	};
	warden_routines::lock(&ctx, &alert).await?;
	Ok(())
}

async fn alert_solve(services: &Services<'_>, request: &RequestPayload) -> anyhow::Result<()> {
	let alert_id = AlertId::new(target_id(request)?);
	let Some(alert) = services.alerts.get_by_id(alert_id).await? else {
		warn!(?alert_id, "alert not found, skipping request");
		return Ok(());
	};
	services.registry.wait_monitor_loaded(alert.monitor_id, services.registry_wait_timeout).await?;
	let reaction_options = reaction_options_for(services.registry, alert.monitor_id);
	let ctx = AlertContext {
		alerts: services.alerts,
		issues: services.issues,
		queue: services.queue,
		reaction_options: &reaction_options,
		log_all_events: false,
	};
	warden_routines::solve_issues(&ctx, &alert).await?;
	Ok(())
}

async fn issue_drop(services: &Services<'_>, request: &RequestPayload) -> anyhow::Result<()> {
	let issue_id = IssueId::new(target_id(request)?);
	let Some(issue) = services.issues.get_by_id(issue_id).await? else {
		warn!(?issue_id, "issue not found, skipping request");
		return Ok(());
	};
	services.registry.wait_monitor_loaded(issue.monitor_id, services.registry_wait_timeout).await?;
	services.issues.drop_issue(issue_id, chrono::Utc::now()).await?;
	Ok(())
}
