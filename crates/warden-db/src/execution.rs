use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use warden_core::MonitorId;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
	Success,
	Failed,
}

impl ExecutionStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			ExecutionStatus::Success => "success",
			ExecutionStatus::Failed => "failed",
		}
	}
}

impl std::str::FromStr for ExecutionStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"success" => Ok(ExecutionStatus::Success),
			"failed" => Ok(ExecutionStatus::Failed),
			_ => Err(format!("unknown execution status: {s}")),
		}
	}
}

/// An audit row per executor invocation of a monitor's routine sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorExecution {
	pub id: i64,
	pub monitor_id: MonitorId,
	pub status: ExecutionStatus,
	pub error_type: Option<String>,
	pub started_at: DateTime<Utc>,
	pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MonitorExecutionRepository {
	pool: SqlitePool,
}

impl MonitorExecutionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn record_start(&self, monitor_id: MonitorId) -> Result<i64> {
		let now = Utc::now();
		let result = sqlx::query(
			"INSERT INTO monitor_executions (monitor_id, status, started_at) VALUES (?, 'success', ?)",
		)
		.bind(i64::from(monitor_id))
		.bind(now)
		.execute(&self.pool)
		.await?;
		Ok(result.last_insert_rowid())
	}

	#[tracing::instrument(skip(self))]
	pub async fn record_finish(
		&self,
		id: i64,
		status: ExecutionStatus,
		error_type: Option<&str>,
	) -> Result<()> {
		let now = Utc::now();
		sqlx::query("UPDATE monitor_executions SET status = ?, error_type = ?, finished_at = ? WHERE id = ?")
			.bind(status.as_str())
			.bind(error_type)
			.bind(now)
			.bind(id)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_recent_by_monitor(&self, monitor_id: MonitorId, limit: i64) -> Result<Vec<MonitorExecution>> {
		let rows: Vec<(i64, i64, String, Option<String>, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
			r#"
            SELECT id, monitor_id, status, error_type, started_at, finished_at
            FROM monitor_executions
            WHERE monitor_id = ?
            ORDER BY started_at DESC
            LIMIT ?
            "#,
		)
		.bind(i64::from(monitor_id))
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;

		rows
			.into_iter()
			.map(|(id, monitor_id, status, error_type, started_at, finished_at)| {
				Ok(MonitorExecution {
					id,
					monitor_id: MonitorId::new(monitor_id),
					status: status.parse().map_err(DbError::Internal)?,
					error_type,
					started_at,
					finished_at,
				})
			})
			.collect()
	}
}

#[async_trait]
pub trait MonitorExecutionStore: Send + Sync {
	async fn record_start(&self, monitor_id: MonitorId) -> Result<i64>;
	async fn record_finish(&self, id: i64, status: ExecutionStatus, error_type: Option<&str>) -> Result<()>;
	async fn get_recent_by_monitor(&self, monitor_id: MonitorId, limit: i64) -> Result<Vec<MonitorExecution>>;
}

#[async_trait]
impl MonitorExecutionStore for MonitorExecutionRepository {
	async fn record_start(&self, monitor_id: MonitorId) -> Result<i64> {
		self.record_start(monitor_id).await
	}
	async fn record_finish(&self, id: i64, status: ExecutionStatus, error_type: Option<&str>) -> Result<()> {
		self.record_finish(id, status, error_type).await
	}
	async fn get_recent_by_monitor(&self, monitor_id: MonitorId, limit: i64) -> Result<Vec<MonitorExecution>> {
		self.get_recent_by_monitor(monitor_id, limit).await
	}
}
