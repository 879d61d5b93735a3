use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use warden_core::{AlertId, MonitorId};

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertStatus {
	Active,
	Solved,
}

impl AlertStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			AlertStatus::Active => "active",
			AlertStatus::Solved => "solved",
		}
	}
}

impl std::str::FromStr for AlertStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"active" => Ok(AlertStatus::Active),
			"solved" => Ok(AlertStatus::Solved),
			_ => Err(format!("unknown alert status: {s}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
	pub id: AlertId,
	pub monitor_id: MonitorId,
	pub status: AlertStatus,
	pub acknowledged: bool,
	pub acknowledge_priority: Option<i32>,
	pub locked: bool,
	pub priority: i32,
	pub created_at: DateTime<Utc>,
	pub solved_at: Option<DateTime<Utc>>,
}

impl Alert {
	/// "Priority-acknowledged": acknowledged and the ack was taken at a
	/// priority at least as severe as the current one.
	pub fn is_priority_acknowledged(&self) -> bool {
		self.acknowledged && self.acknowledge_priority.is_some_and(|p| p <= self.priority)
	}
}

type Row = (i64, i64, String, bool, Option<i32>, bool, i32, DateTime<Utc>, Option<DateTime<Utc>>);

fn from_row(row: Row) -> Result<Alert> {
	Ok(Alert {
		id: AlertId::new(row.0),
		monitor_id: MonitorId::new(row.1),
		status: row.2.parse().map_err(DbError::Internal)?,
		acknowledged: row.3,
		acknowledge_priority: row.4,
		locked: row.5,
		priority: row.6,
		created_at: row.7,
		solved_at: row.8,
	})
}

const SELECT_COLUMNS: &str =
	"id, monitor_id, status, acknowledged, acknowledge_priority, locked, priority, created_at, solved_at";

#[derive(Clone)]
pub struct AlertRepository {
	pool: SqlitePool,
}

impl AlertRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn create(&self, monitor_id: MonitorId, priority: i32) -> Result<Alert> {
		let now = Utc::now();
		let result = sqlx::query("INSERT INTO alerts (monitor_id, status, priority, created_at) VALUES (?, 'active', ?, ?)")
			.bind(i64::from(monitor_id))
			.bind(priority)
			.bind(now)
			.execute(&self.pool)
			.await?;

		Ok(Alert {
			id: AlertId::new(result.last_insert_rowid()),
			monitor_id,
			status: AlertStatus::Active,
			acknowledged: false,
			acknowledge_priority: None,
			locked: false,
			priority,
			created_at: now,
			solved_at: None,
		})
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_id(&self, id: AlertId) -> Result<Option<Alert>> {
		let row = sqlx::query_as::<_, Row>(&format!("SELECT {SELECT_COLUMNS} FROM alerts WHERE id = ?"))
			.bind(i64::from(id))
			.fetch_optional(&self.pool)
			.await?;
		row.map(from_row).transpose()
	}

	/// First active, unlocked alert for this monitor, if any. New
	/// unlinked issues attach here.
	#[tracing::instrument(skip(self))]
	pub async fn get_active_unlocked_by_monitor(&self, monitor_id: MonitorId) -> Result<Option<Alert>> {
		let row = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM alerts WHERE monitor_id = ? AND status = 'active' AND locked = 0 ORDER BY id LIMIT 1"
		))
		.bind(i64::from(monitor_id))
		.fetch_optional(&self.pool)
		.await?;
		row.map(from_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Alert>> {
		let rows = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM alerts WHERE monitor_id = ? AND status = 'active' ORDER BY id"
		))
		.bind(i64::from(monitor_id))
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(from_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_acknowledged(&self, id: AlertId, acknowledged: bool, priority: Option<i32>) -> Result<()> {
		sqlx::query("UPDATE alerts SET acknowledged = ?, acknowledge_priority = ? WHERE id = ?")
			.bind(acknowledged)
			.bind(priority)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_locked(&self, id: AlertId, locked: bool) -> Result<()> {
		sqlx::query("UPDATE alerts SET locked = ? WHERE id = ?")
			.bind(locked)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_priority(&self, id: AlertId, priority: i32) -> Result<()> {
		sqlx::query("UPDATE alerts SET priority = ? WHERE id = ?")
			.bind(priority)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn solve(&self, id: AlertId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE alerts SET status = 'solved', solved_at = ? WHERE id = ? AND status = 'active'")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
pub trait AlertStore: Send + Sync {
	async fn create(&self, monitor_id: MonitorId, priority: i32) -> Result<Alert>;
	async fn get_by_id(&self, id: AlertId) -> Result<Option<Alert>>;
	async fn get_active_unlocked_by_monitor(&self, monitor_id: MonitorId) -> Result<Option<Alert>>;
	async fn get_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Alert>>;
	async fn set_acknowledged(&self, id: AlertId, acknowledged: bool, priority: Option<i32>) -> Result<()>;
	async fn set_locked(&self, id: AlertId, locked: bool) -> Result<()>;
	async fn set_priority(&self, id: AlertId, priority: i32) -> Result<()>;
	async fn solve(&self, id: AlertId, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
impl AlertStore for AlertRepository {
	async fn create(&self, monitor_id: MonitorId, priority: i32) -> Result<Alert> {
		self.create(monitor_id, priority).await
	}
	async fn get_by_id(&self, id: AlertId) -> Result<Option<Alert>> {
		self.get_by_id(id).await
	}
	async fn get_active_unlocked_by_monitor(&self, monitor_id: MonitorId) -> Result<Option<Alert>> {
		self.get_active_unlocked_by_monitor(monitor_id).await
	}
	async fn get_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Alert>> {
		self.get_active_by_monitor(monitor_id).await
	}
	async fn set_acknowledged(&self, id: AlertId, acknowledged: bool, priority: Option<i32>) -> Result<()> {
		self.set_acknowledged(id, acknowledged, priority).await
	}
	async fn set_locked(&self, id: AlertId, locked: bool) -> Result<()> {
		self.set_locked(id, locked).await
	}
	async fn set_priority(&self, id: AlertId, priority: i32) -> Result<()> {
		self.set_priority(id, priority).await
	}
	async fn solve(&self, id: AlertId, at: DateTime<Utc>) -> Result<()> {
		self.solve(id, at).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::monitor::MonitorRepository;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn locked_alert_is_excluded_from_unlocked_lookup() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool);
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();

		let alert = alerts.create(monitor.id, 3).await.unwrap();
		alerts.set_locked(alert.id, true).await.unwrap();

		assert!(alerts.get_active_unlocked_by_monitor(monitor.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn priority_acknowledged_requires_ack_at_or_above_severity() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool);
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();

		let alert = alerts.create(monitor.id, 3).await.unwrap();
		alerts.set_acknowledged(alert.id, true, Some(3)).await.unwrap();
		let reloaded = alerts.get_by_id(alert.id).await.unwrap().unwrap();
		assert!(reloaded.is_priority_acknowledged());

		alerts.set_priority(alert.id, 1).await.unwrap();
		let reloaded = alerts.get_by_id(alert.id).await.unwrap().unwrap();
		assert!(!reloaded.is_priority_acknowledged(), "priority got more severe, ack should no longer cover it");
	}

	#[tokio::test]
	async fn solve_sets_status_and_timestamp() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let alerts = AlertRepository::new(pool);
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();
		let alert = alerts.create(monitor.id, 2).await.unwrap();

		alerts.solve(alert.id, Utc::now()).await.unwrap();
		let reloaded = alerts.get_by_id(alert.id).await.unwrap().unwrap();
		assert_eq!(reloaded.status, AlertStatus::Solved);
		assert!(reloaded.solved_at.is_some());
	}
}
