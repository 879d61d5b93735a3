//! The periodic load loop: refreshes the Registry to match enabled,
//! validated monitors in the Store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{info, warn};

use warden_db::{CodeModuleRepository, MonitorRepository};
use warden_registry::Registry;

use crate::configure::configure_monitor;
use crate::factory::ModuleFactoryTable;

/// Overlap subtracted from `last_load_time` when computing the delta,
/// so a code module written right at the boundary of the previous load
/// is never missed.
const DELTA_OVERLAP: chrono::Duration = chrono::Duration::seconds(15);

#[derive(Debug, Clone)]
pub struct LoaderConfig {
	/// Cron expression driving the periodic load tick.
	pub load_schedule: String,
	pub timezone: String,
	/// How much earlier than the schedule's firing to start loading, so
	/// the refresh finishes before the next controller tick.
	pub early_load_time: Duration,
	/// Minimum spacing enforced between successive loads even when
	/// `monitors_pending` keeps firing.
	pub cool_down_time: Duration,
}

impl Default for LoaderConfig {
	fn default() -> Self {
		Self {
			load_schedule: "*/1 * * * *".to_string(),
			timezone: "UTC".to_string(),
			early_load_time: Duration::from_secs(2),
			cool_down_time: Duration::from_secs(5),
		}
	}
}

/// Disables monitors whose CodeModule row is missing, then publishes
/// every enabled monitor whose module changed since `since` (or that
/// the registry doesn't know about yet) under its configured factory.
/// Returns the number of monitors published and the number skipped for
/// lacking a factory.
pub async fn run_one_pass(
	pool: &SqlitePool,
	registry: &Registry,
	factories: &ModuleFactoryTable,
	since: chrono::DateTime<Utc>,
) -> crate::error::Result<(usize, usize)> {
	let monitors = MonitorRepository::new(pool.clone());
	let code_modules = CodeModuleRepository::new(pool.clone());

	registry.clear_ready();

	for monitor in monitors.get_all_enabled().await? {
		if !code_modules.exists(monitor.id).await? {
			warn!(monitor = %monitor.name, "disabling monitor with no registered code module");
			monitors.set_enabled(monitor.id, false).await?;
		}
	}

	let changed = code_modules.get_monitor_ids_changed_since(since - DELTA_OVERLAP).await?;
	let mut delta: Vec<_> = changed.into_iter().filter(|id| !registry.is_registered(*id)).collect();
	for monitor in monitors.get_all_enabled().await? {
		if registry.is_registered(monitor.id) {
			continue;
		}
		if !delta.contains(&monitor.id) {
			delta.push(monitor.id);
		}
	}

	let mut published = 0;
	let mut skipped = 0;
	for monitor_id in delta {
		let monitor = match monitors.get_by_id(monitor_id).await? {
			Some(m) => m,
			None => continue,
		};
		if !monitor.enabled {
			continue;
		}

		let factory = match factories.get(&monitor.name) {
			Some(f) => f,
			None => {
				warn!(monitor = %monitor.name, "no module factory registered, skipping");
				skipped += 1;
				continue;
			}
		};

		let module = factory.create();
		if let Err(e) = warden_module::validate(&module) {
			warn!(monitor = %monitor.name, error = %e, "module failed validation, skipping");
			skipped += 1;
			continue;
		}

		let module = configure_monitor(module);
		registry.add(monitor.id, monitor.name.clone(), module);
		published += 1;
	}

	registry.clear_pending();
	registry.set_ready();

	Ok((published, skipped))
}

/// Runs `run_one_pass` on every trigger of `config.load_schedule`, early
/// by `early_load_time`, or whenever `monitors_pending` is set, subject
/// to `cool_down_time` between passes. Returns when `shutdown` fires.
pub async fn run_load_loop(
	pool: SqlitePool,
	registry: Arc<Registry>,
	factories: Arc<ModuleFactoryTable>,
	config: LoaderConfig,
	mut shutdown: broadcast::Receiver<()>,
) {
	let mut last_load_time = Utc::now();

	loop {
		let next_tick_secs =
			warden_cron::time_until_next(&config.load_schedule, &config.timezone, Utc::now()).unwrap_or(60);
		let next_tick = Duration::from_secs(next_tick_secs as u64).saturating_sub(config.early_load_time);

		tokio::select! {
			_ = tokio::time::sleep(next_tick) => {}
			_ = registry.changed() => {
				if !registry.is_pending() {
					continue;
				}
			}
			_ = shutdown.recv() => {
				info!("stopping monitor load loop");
				return;
			}
		}

		let elapsed = Utc::now() - last_load_time;
		if elapsed < chrono::Duration::from_std(config.cool_down_time).unwrap_or_default() {
			continue;
		}

		match run_one_pass(&pool, &registry, &factories, last_load_time).await {
			Ok((published, skipped)) => {
				info!(published, skipped, "monitor registry refreshed");
			}
			Err(e) => {
				warn!(error = %e, "monitor load pass failed");
			}
		}
		last_load_time = Utc::now();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use futures::future::FutureExt;
	use std::collections::HashMap;
	use std::sync::Arc as StdArc;
	use warden_db::testing::create_test_pool;
	use warden_module::{AlertOptions, IssueOptions, ModuleBuilder, MonitorOptions, PriorityLevels, Rule};

	fn factory() -> StdArc<dyn crate::factory::ModuleFactory> {
		StdArc::new(|| {
			ModuleBuilder::new(
				MonitorOptions {
					search_cron: Some("* * * * *".to_string()),
					update_cron: None,
					max_issues_creation: 1,
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
					dismiss_acknowledge_on_new_issues: true,
				},
				StdArc::new(|_| async { Ok(vec![]) }.boxed()),
			)
			.build()
		})
	}

	#[tokio::test]
	async fn publishes_newly_registered_monitors() {
		let pool = create_test_pool().await;
		let registry = Registry::new();
		let mut table = ModuleFactoryTable::new();
		table.register("disk_usage", factory());

		crate::register::register(&pool, factory().as_ref(), "disk_usage", "v1", HashMap::new())
			.await
			.unwrap();

		let (published, skipped) = run_one_pass(&pool, &registry, &table, Utc::now() - chrono::Duration::minutes(1))
			.await
			.unwrap();

		assert_eq!(published, 1);
		assert_eq!(skipped, 0);
		assert!(registry.is_ready());
	}

	#[tokio::test]
	async fn skips_monitors_with_no_factory() {
		let pool = create_test_pool().await;
		let registry = Registry::new();
		let table = ModuleFactoryTable::new();

		crate::register::register(&pool, factory().as_ref(), "orphaned", "v1", HashMap::new())
			.await
			.unwrap();

		let (published, skipped) = run_one_pass(&pool, &registry, &table, Utc::now() - chrono::Duration::minutes(1))
			.await
			.unwrap();

		assert_eq!(published, 0);
		assert_eq!(skipped, 1);
	}

	#[tokio::test]
	async fn disables_monitors_with_missing_code_module() {
		let pool = create_test_pool().await;
		let registry = Registry::new();
		let table = ModuleFactoryTable::new();
		let monitors = MonitorRepository::new(pool.clone());
		monitors.get_or_create_by_name("ghost").await.unwrap();

		run_one_pass(&pool, &registry, &table, Utc::now() - chrono::Duration::minutes(1))
			.await
			.unwrap();

		let ghost = monitors.get_by_name("ghost").await.unwrap().unwrap();
		assert!(!ghost.enabled);
	}
}
