//! Bounded pool of runners pulling `process_monitor`, `event`, and
//! `request` messages off the queue and dispatching each to the
//! matching handler.

mod error;
mod metrics;
mod pool;
mod reaction_handler;
mod request_handler;
mod runner;

pub use error::{BaseCoreException, ExecutorError, Result};
pub use metrics::{ExecutorMetrics, ExecutorMetricsSnapshot};
pub use pool::{run_executor_loop, PoolConfig};
pub use runner::{process_message, ExecutorConfig, ExecutorRepos};
