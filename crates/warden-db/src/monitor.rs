use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use warden_core::MonitorId;

use crate::error::{DbError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Monitor {
	pub id: MonitorId,
	pub name: String,
	pub enabled: bool,
	pub search_executed_at: Option<DateTime<Utc>>,
	pub update_executed_at: Option<DateTime<Utc>>,
	pub queued: bool,
	pub running: bool,
	pub last_heartbeat: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

type Row = (
	i64,
	String,
	bool,
	Option<DateTime<Utc>>,
	Option<DateTime<Utc>>,
	bool,
	bool,
	Option<DateTime<Utc>>,
	DateTime<Utc>,
);

fn from_row(row: Row) -> Monitor {
	Monitor {
		id: MonitorId::new(row.0),
		name: row.1,
		enabled: row.2,
		search_executed_at: row.3,
		update_executed_at: row.4,
		queued: row.5,
		running: row.6,
		last_heartbeat: row.7,
		created_at: row.8,
	}
}

const SELECT_COLUMNS: &str = "id, name, enabled, search_executed_at, update_executed_at, queued, running, last_heartbeat, created_at";

#[derive(Clone)]
pub struct MonitorRepository {
	pool: SqlitePool,
}

impl MonitorRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Fetch the Monitor named `name`, creating it disabled-by-default if
	/// it has never been seen before. Does not reset existing state.
	#[tracing::instrument(skip(self))]
	pub async fn get_or_create_by_name(&self, name: &str) -> Result<Monitor> {
		if let Some(monitor) = self.get_by_name(name).await? {
			return Ok(monitor);
		}

		let now = Utc::now();
		let result = sqlx::query("INSERT INTO monitors (name, enabled, queued, running, created_at) VALUES (?, 1, 0, 0, ?)")
			.bind(name)
			.bind(now)
			.execute(&self.pool)
			.await?;

		self
			.get_by_id(MonitorId::new(result.last_insert_rowid()))
			.await?
			.ok_or_else(|| DbError::Internal("monitor vanished after insert".to_string()))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_id(&self, id: MonitorId) -> Result<Option<Monitor>> {
		let row = sqlx::query_as::<_, Row>(&format!("SELECT {SELECT_COLUMNS} FROM monitors WHERE id = ?"))
			.bind(i64::from(id))
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(from_row))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_name(&self, name: &str) -> Result<Option<Monitor>> {
		let row = sqlx::query_as::<_, Row>(&format!("SELECT {SELECT_COLUMNS} FROM monitors WHERE name = ?"))
			.bind(name)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.map(from_row))
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_all_enabled(&self) -> Result<Vec<Monitor>> {
		let rows = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM monitors WHERE enabled = 1 ORDER BY id"
		))
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(from_row).collect())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_enabled(&self, id: MonitorId, enabled: bool) -> Result<()> {
		sqlx::query("UPDATE monitors SET enabled = ? WHERE id = ?")
			.bind(enabled)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_queued(&self, id: MonitorId, queued: bool) -> Result<()> {
		sqlx::query("UPDATE monitors SET queued = ? WHERE id = ?")
			.bind(queued)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_running(&self, id: MonitorId, running: bool) -> Result<()> {
		sqlx::query("UPDATE monitors SET running = ? WHERE id = ?")
			.bind(running)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Clear `queued`/`running` in one statement, used by handler cleanup
	/// and by the `monitors_stuck` procedure.
	#[tracing::instrument(skip(self))]
	pub async fn clear_queued_and_running(&self, id: MonitorId) -> Result<()> {
		sqlx::query("UPDATE monitors SET queued = 0, running = 0 WHERE id = ?")
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_heartbeat(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE monitors SET last_heartbeat = ? WHERE id = ?")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_search_executed_at(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE monitors SET search_executed_at = ? WHERE id = ?")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_update_executed_at(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE monitors SET update_executed_at = ? WHERE id = ?")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Monitors whose `last_heartbeat` is older than `tolerance`, while
	/// still marked `running` or `queued`. Feeds the stuck-monitor
	/// recovery procedure.
	#[tracing::instrument(skip(self))]
	pub async fn get_stuck(&self, tolerance: chrono::Duration) -> Result<Vec<Monitor>> {
		let cutoff = Utc::now() - tolerance;
		let rows = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM monitors
             WHERE (running = 1 OR queued = 1)
               AND (last_heartbeat IS NULL OR last_heartbeat < ?)"
		))
		.bind(cutoff)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(from_row).collect())
	}
}

#[async_trait]
pub trait MonitorStore: Send + Sync {
	async fn get_or_create_by_name(&self, name: &str) -> Result<Monitor>;
	async fn get_by_id(&self, id: MonitorId) -> Result<Option<Monitor>>;
	async fn get_by_name(&self, name: &str) -> Result<Option<Monitor>>;
	async fn get_all_enabled(&self) -> Result<Vec<Monitor>>;
	async fn set_enabled(&self, id: MonitorId, enabled: bool) -> Result<()>;
	async fn set_queued(&self, id: MonitorId, queued: bool) -> Result<()>;
	async fn set_running(&self, id: MonitorId, running: bool) -> Result<()>;
	async fn clear_queued_and_running(&self, id: MonitorId) -> Result<()>;
	async fn set_heartbeat(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()>;
	async fn set_search_executed_at(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()>;
	async fn set_update_executed_at(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()>;
	async fn get_stuck(&self, tolerance: chrono::Duration) -> Result<Vec<Monitor>>;
}

#[async_trait]
impl MonitorStore for MonitorRepository {
	async fn get_or_create_by_name(&self, name: &str) -> Result<Monitor> {
		self.get_or_create_by_name(name).await
	}
	async fn get_by_id(&self, id: MonitorId) -> Result<Option<Monitor>> {
		self.get_by_id(id).await
	}
	async fn get_by_name(&self, name: &str) -> Result<Option<Monitor>> {
		self.get_by_name(name).await
	}
	async fn get_all_enabled(&self) -> Result<Vec<Monitor>> {
		self.get_all_enabled().await
	}
	async fn set_enabled(&self, id: MonitorId, enabled: bool) -> Result<()> {
		self.set_enabled(id, enabled).await
	}
	async fn set_queued(&self, id: MonitorId, queued: bool) -> Result<()> {
		self.set_queued(id, queued).await
	}
	async fn set_running(&self, id: MonitorId, running: bool) -> Result<()> {
		self.set_running(id, running).await
	}
	async fn clear_queued_and_running(&self, id: MonitorId) -> Result<()> {
		self.clear_queued_and_running(id).await
	}
	async fn set_heartbeat(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()> {
		self.set_heartbeat(id, at).await
	}
	async fn set_search_executed_at(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()> {
		self.set_search_executed_at(id, at).await
	}
	async fn set_update_executed_at(&self, id: MonitorId, at: DateTime<Utc>) -> Result<()> {
		self.set_update_executed_at(id, at).await
	}
	async fn get_stuck(&self, tolerance: chrono::Duration) -> Result<Vec<Monitor>> {
		self.get_stuck(tolerance).await
	}
}
