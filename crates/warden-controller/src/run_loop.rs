//! The controller's two long-lived loops: the scan/dispatch loop on
//! `controller_process_schedule`, and the procedures loop, each
//! procedure on its own cron, run independently so a slow or failing
//! procedure never blocks dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};
use warden_db::{MonitorRepository, NotificationRepository};
use warden_queue::Queue;
use warden_registry::Registry;

use crate::diagnostics::Diagnostics;
use crate::metrics::ControllerMetrics;
use crate::procedures;
use crate::scan::run_tick;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
	pub process_schedule: String,
	pub timezone: String,
	pub concurrency: usize,
	pub registry_ready_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ProcedureSchedule {
	pub name: String,
	pub schedule: String,
	pub time_tolerance_secs: i64,
}

/// The scan/dispatch loop: one tick per firing of `config.process_schedule`.
pub async fn run_controller_loop(
	monitors: MonitorRepository,
	registry: Arc<Registry>,
	queue: Arc<dyn Queue>,
	metrics: Arc<ControllerMetrics>,
	diagnostics: Arc<Diagnostics>,
	config: ControllerConfig,
	mut shutdown: broadcast::Receiver<()>,
) {
	loop {
		let next_tick_secs =
			warden_cron::time_until_next(&config.process_schedule, &config.timezone, chrono::Utc::now()).unwrap_or(60);

		tokio::select! {
			_ = tokio::time::sleep(Duration::from_secs(next_tick_secs.max(1) as u64)) => {}
			_ = shutdown.recv() => {
				info!("stopping controller scan loop");
				return;
			}
		}

		diagnostics.record_loop_tick();
		match run_tick(
			&monitors,
			&registry,
			queue.as_ref(),
			&metrics,
			config.concurrency,
			&config.timezone,
			config.registry_ready_timeout,
		)
		.await
		{
			Ok(dispatched) => {
				if dispatched > 0 {
					diagnostics.record_monitor_processed();
					info!(dispatched, "controller tick dispatched monitors");
				}
			}
			Err(e) => {
				error!(error = %e, "controller tick failed, continuing on next tick");
				crate::metrics::ControllerMetrics::inc(&metrics.loop_errors);
			}
		}
	}
}

/// The procedures loop: each named procedure fires independently on its
/// own schedule; a failure in one never blocks the others.
pub async fn run_procedures_loop(
	monitors: MonitorRepository,
	notifications: NotificationRepository,
	schedules: Vec<ProcedureSchedule>,
	timezone: String,
	mut shutdown: broadcast::Receiver<()>,
) {
	let mut last_run = vec![chrono::Utc::now(); schedules.len()];

	loop {
		let sleep_secs = schedules
			.iter()
			.filter_map(|s| warden_cron::time_until_next(&s.schedule, &timezone, chrono::Utc::now()).ok())
			.min()
			.unwrap_or(60)
			.clamp(1, 60);

		tokio::select! {
			_ = tokio::time::sleep(Duration::from_secs(sleep_secs as u64)) => {}
			_ = shutdown.recv() => {
				info!("stopping controller procedures loop");
				return;
			}
		}

		let now = chrono::Utc::now();
		for (i, schedule) in schedules.iter().enumerate() {
			if !warden_cron::is_triggered(&schedule.schedule, &timezone, last_run[i], now).unwrap_or(false) {
				continue;
			}
			last_run[i] = now;

			let result = match schedule.name.as_str() {
				"monitors_stuck" => procedures::monitors_stuck(&monitors, schedule.time_tolerance_secs).await.map(|_| ()),
				"notifications_alert_solved" => procedures::notifications_alert_solved(&notifications).await.map(|_| ()),
				"clean_events" => procedures::clean_events().await.map(|_| ()),
				other => {
					error!(procedure = other, "unknown procedure name, skipping");
					continue;
				}
			};

			if let Err(e) = result {
				error!(procedure = %schedule.name, error = %e, "procedure failed, continuing");
			}
		}
	}
}
