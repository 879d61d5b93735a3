//! Process entry point: loads configuration, opens the store, seeds the
//! built-in monitors, and runs the loader/controller/executor loops
//! side by side until told to stop.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use warden_controller::{ControllerConfig, ProcedureSchedule};
use warden_db::{AlertRepository, IssueRepository, MonitorExecutionRepository, MonitorRepository, NotificationRepository, VariableRepository};
use warden_executor::{ExecutorConfig, ExecutorRepos, PoolConfig};
use warden_loader::LoaderConfig;
use warden_queue::InMemoryQueue;
use warden_registry::Registry;

/// How long the controller and executor will wait for the first loader
/// pass to mark the registry ready before giving up on a tick.
const REGISTRY_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// How often an executor worker renews a message's visibility while a
/// monitor run is in flight.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "warden-server", about = "Monitor execution platform server", version)]
struct Args {}

fn procedure_schedules(config: &warden_config::Config) -> Vec<ProcedureSchedule> {
	config
		.controller_procedures
		.iter()
		.map(|(name, procedure)| ProcedureSchedule {
			name: name.clone(),
			schedule: procedure.schedule.clone(),
			time_tolerance_secs: procedure
				.params
				.get("time_tolerance")
				.and_then(serde_json::Value::as_i64)
				.unwrap_or(300),
		})
		.collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let _args = Args::parse();

	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let toml_path = std::env::var("WARDEN_CONFIG_PATH").unwrap_or_else(|_| "warden.toml".to_string());
	let config = warden_config::load_config(&toml_path)?;

	tracing::info!(database = %config.database_url, time_zone = %config.time_zone, "starting warden-server");

	let pool = warden_db::create_pool(&config.database_url).await?;
	warden_db::run_migrations(&pool).await?;

	let mut factories = warden_loader::ModuleFactoryTable::new();
	warden_monitors::register_internal_monitors(&mut factories, pool.clone());

	for name in [warden_monitors::MONITOR_CONSECUTIVE_FAILS, warden_monitors::MONITOR_HIGH_ACTIVE_ISSUES_COUNT] {
		let factory = factories.get(name).expect("built-in monitor just registered");
		warden_loader::register(&pool, factory.as_ref(), name, env!("CARGO_PKG_VERSION"), Default::default()).await?;
	}
	let factories = Arc::new(factories);

	let registry = Arc::new(Registry::new());
	let queue: Arc<dyn warden_queue::Queue> = InMemoryQueue::new(config.queue_visibility_time);

	let (shutdown_tx, _) = broadcast::channel::<()>(1);

	let loader_config = LoaderConfig {
		load_schedule: config.monitors_load_schedule.clone(),
		timezone: config.time_zone.clone(),
		..LoaderConfig::default()
	};
	let loader_task = tokio::spawn(warden_loader::run_load_loop(
		pool.clone(),
		registry.clone(),
		factories.clone(),
		loader_config,
		shutdown_tx.subscribe(),
	));

	let controller_config = ControllerConfig {
		process_schedule: config.controller_process_schedule.clone(),
		timezone: config.time_zone.clone(),
		concurrency: config.controller_concurrency,
		registry_ready_timeout: REGISTRY_READY_TIMEOUT,
	};
	let controller_task = tokio::spawn(warden_controller::run_controller_loop(
		MonitorRepository::new(pool.clone()),
		registry.clone(),
		queue.clone(),
		Arc::new(warden_controller::ControllerMetrics::default()),
		Arc::new(warden_controller::Diagnostics::default()),
		controller_config,
		shutdown_tx.subscribe(),
	));

	let procedures_task = tokio::spawn(warden_controller::run_procedures_loop(
		MonitorRepository::new(pool.clone()),
		NotificationRepository::new(pool.clone()),
		procedure_schedules(&config),
		config.time_zone.clone(),
		shutdown_tx.subscribe(),
	));

	let executor_repos = ExecutorRepos {
		monitors: MonitorRepository::new(pool.clone()),
		issues: IssueRepository::new(pool.clone()),
		alerts: AlertRepository::new(pool.clone()),
		variables: VariableRepository::new(pool.clone()),
		executions: MonitorExecutionRepository::new(pool.clone()),
	};
	let executor_config = PoolConfig {
		concurrency: config.executor_concurrency,
		sleep: config.executor_sleep,
		runner: ExecutorConfig {
			reaction_timeout: config.executor_reaction_timeout,
			request_timeout: config.executor_request_timeout,
			registry_ready_timeout: REGISTRY_READY_TIMEOUT,
			heartbeat_interval: HEARTBEAT_INTERVAL,
			log_all_events: config.log_all_events,
		},
	};
	let mut executor_task = tokio::spawn(warden_executor::run_executor_loop(
		executor_repos,
		registry.clone(),
		queue.clone(),
		Arc::new(warden_executor::ExecutorMetrics::default()),
		executor_config,
		shutdown_tx.clone(),
	));

	let mut executor_still_running = false;
	let fatal = tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
			executor_still_running = true;
			None
		}
		result = &mut executor_task => {
			match result {
				Ok(Ok(())) => {
					tracing::info!("executor pool stopped cleanly");
					None
				}
				Ok(Err(e)) => {
					tracing::error!(error = %e, "executor pool exited with a fatal error");
					Some(e)
				}
				Err(e) => {
					tracing::error!(error = %e, "executor task panicked");
					None
				}
			}
		}
	};

	let _ = shutdown_tx.send(());
	if executor_still_running {
		let _ = executor_task.await;
	}
	let _ = loader_task.await;
	let _ = controller_task.await;
	let _ = procedures_task.await;
	pool.close().await;

	if let Some(e) = fatal {
		return Err(e.into());
	}

	tracing::info!("warden-server shutdown complete");
	Ok(())
}
