//! The bounded runner pool: `executor_concurrency` long-lived workers,
//! each independently receiving and processing one message at a time.
//! A `BaseCoreException` surfacing from any worker tears down the
//! whole pool and is returned to the caller, which exits the process
//! non-zero; every other error is swallowed at the worker boundary.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;
use warden_queue::Queue;
use warden_registry::Registry;

use crate::error::{BaseCoreException, ExecutorError, Result};
use crate::metrics::ExecutorMetrics;
use crate::runner::{process_message, ExecutorConfig, ExecutorRepos};

#[derive(Debug, Clone)]
pub struct PoolConfig {
	pub concurrency: usize,
	pub sleep: Duration,
	pub runner: ExecutorConfig,
}

/// Runs the pool until `shutdown` fires or a worker surfaces a fatal
/// error. Returns `Ok(())` on clean shutdown, `Err(Fatal)` otherwise.
pub async fn run_executor_loop(
	repos: ExecutorRepos,
	registry: Arc<Registry>,
	queue: Arc<dyn Queue>,
	metrics: Arc<ExecutorMetrics>,
	config: PoolConfig,
	shutdown: broadcast::Sender<()>,
) -> Result<()> {
	let mut workers = Vec::with_capacity(config.concurrency);

	for worker_id in 0..config.concurrency.max(1) {
		let repos = repos.clone();
		let registry = registry.clone();
		let queue = queue.clone();
		let metrics = metrics.clone();
		let config = config.clone();
		let mut shutdown_rx = shutdown.subscribe();
		let fatal_tx = shutdown.clone();

		workers.push(tokio::spawn(async move {
			loop {
				let received = tokio::select! {
					received = queue.receive(config.sleep) => received,
					_ = shutdown_rx.recv() => {
						info!(worker_id, "worker stopping");
						return Ok(());
					}
				};

				let (handle, message) = match received {
					Ok(Some(pair)) => pair,
					Ok(None) => continue,
					Err(e) => {
						tracing::error!(worker_id, error = %e, "failed to receive from queue, continuing");
						continue;
					}
				};

				match process_message(&repos, &registry, queue.clone(), &metrics, &config.runner, handle, message).await {
					Ok(()) => {}
					Err(ExecutorError::Fatal(e)) => {
						let _ = fatal_tx.send(());
						return Err(BaseCoreException::new(e.0));
					}
					Err(_) => {}
				}
			}
		}));
	}

	let mut fatal = None;
	for worker in workers {
		match worker.await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => fatal = Some(e),
			Err(join_error) => {
				tracing::error!(error = %join_error, "worker task panicked");
			}
		}
	}

	match fatal {
		Some(e) => Err(ExecutorError::Fatal(e)),
		None => Ok(()),
	}
}
