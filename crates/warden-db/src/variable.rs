use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use warden_core::MonitorId;

use crate::error::Result;

/// A monitor-scoped key/value used for monitor-local bookkeeping between
/// executions (e.g. cursors, last-seen markers).
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
	pub monitor_id: MonitorId,
	pub key: String,
	pub value: Option<String>,
	pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct VariableRepository {
	pool: SqlitePool,
}

impl VariableRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn get(&self, monitor_id: MonitorId, key: &str) -> Result<Option<Variable>> {
		let row: Option<(i64, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
			"SELECT monitor_id, key, value, updated_at FROM variables WHERE monitor_id = ? AND key = ?",
		)
		.bind(i64::from(monitor_id))
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(|(monitor_id, key, value, updated_at)| Variable {
			monitor_id: MonitorId::new(monitor_id),
			key,
			value,
			updated_at,
		}))
	}

	#[tracing::instrument(skip(self, value))]
	pub async fn set(&self, monitor_id: MonitorId, key: &str, value: Option<&str>) -> Result<()> {
		let now = Utc::now();
		sqlx::query(
			r#"
            INSERT INTO variables (monitor_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(monitor_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
		)
		.bind(i64::from(monitor_id))
		.bind(key)
		.bind(value)
		.bind(now)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	/// Every variable currently stored for `monitor_id`, used to
	/// populate the read-only snapshot handed to a monitor's
	/// `search`/`update` callable.
	#[tracing::instrument(skip(self))]
	pub async fn get_all(&self, monitor_id: MonitorId) -> Result<Vec<Variable>> {
		let rows: Vec<(i64, String, Option<String>, DateTime<Utc>)> =
			sqlx::query_as("SELECT monitor_id, key, value, updated_at FROM variables WHERE monitor_id = ?")
				.bind(i64::from(monitor_id))
				.fetch_all(&self.pool)
				.await?;

		Ok(rows
			.into_iter()
			.map(|(monitor_id, key, value, updated_at)| Variable {
				monitor_id: MonitorId::new(monitor_id),
				key,
				value,
				updated_at,
			})
			.collect())
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete(&self, monitor_id: MonitorId, key: &str) -> Result<()> {
		sqlx::query("DELETE FROM variables WHERE monitor_id = ? AND key = ?")
			.bind(i64::from(monitor_id))
			.bind(key)
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
pub trait VariableStore: Send + Sync {
	async fn get(&self, monitor_id: MonitorId, key: &str) -> Result<Option<Variable>>;
	async fn get_all(&self, monitor_id: MonitorId) -> Result<Vec<Variable>>;
	async fn set(&self, monitor_id: MonitorId, key: &str, value: Option<&str>) -> Result<()>;
	async fn delete(&self, monitor_id: MonitorId, key: &str) -> Result<()>;
}

#[async_trait]
impl VariableStore for VariableRepository {
	async fn get(&self, monitor_id: MonitorId, key: &str) -> Result<Option<Variable>> {
		self.get(monitor_id, key).await
	}
	async fn get_all(&self, monitor_id: MonitorId) -> Result<Vec<Variable>> {
		self.get_all(monitor_id).await
	}
	async fn set(&self, monitor_id: MonitorId, key: &str, value: Option<&str>) -> Result<()> {
		self.set(monitor_id, key, value).await
	}
	async fn delete(&self, monitor_id: MonitorId, key: &str) -> Result<()> {
		self.delete(monitor_id, key).await
	}
}
