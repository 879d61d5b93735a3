use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use warden_core::{AlertId, NotificationId};

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
	Active,
	Closed,
}

impl NotificationStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			NotificationStatus::Active => "active",
			NotificationStatus::Closed => "closed",
		}
	}
}

impl std::str::FromStr for NotificationStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"active" => Ok(NotificationStatus::Active),
			"closed" => Ok(NotificationStatus::Closed),
			_ => Err(format!("unknown notification status: {s}")),
		}
	}
}

/// A delivery record owned by an external notifier plugin. The core
/// only touches `status`, `alert_id`, and the opaque `data` map.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
	pub id: NotificationId,
	pub alert_id: AlertId,
	pub status: NotificationStatus,
	pub data: Map<String, Value>,
	pub created_at: DateTime<Utc>,
	pub closed_at: Option<DateTime<Utc>>,
}

type Row = (i64, i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>);

fn from_row(row: Row) -> Result<Notification> {
	let data = match serde_json::from_str::<Value>(&row.3)? {
		Value::Object(map) => map,
		_ => Map::new(),
	};
	Ok(Notification {
		id: NotificationId::new(row.0),
		alert_id: AlertId::new(row.1),
		status: row.2.parse().map_err(DbError::Internal)?,
		data,
		created_at: row.4,
		closed_at: row.5,
	})
}

const SELECT_COLUMNS: &str = "id, alert_id, status, data, created_at, closed_at";

#[derive(Clone)]
pub struct NotificationRepository {
	pool: SqlitePool,
}

impl NotificationRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self, data))]
	pub async fn create(&self, alert_id: AlertId, data: &Map<String, Value>) -> Result<Notification> {
		let data_json = serde_json::to_string(&Value::Object(data.clone()))?;
		let now = Utc::now();
		let result = sqlx::query("INSERT INTO notifications (alert_id, status, data, created_at) VALUES (?, 'active', ?, ?)")
			.bind(i64::from(alert_id))
			.bind(data_json)
			.bind(now)
			.execute(&self.pool)
			.await?;

		Ok(Notification {
			id: NotificationId::new(result.last_insert_rowid()),
			alert_id,
			status: NotificationStatus::Active,
			data: data.clone(),
			created_at: now,
			closed_at: None,
		})
	}

	/// Active notifications for alerts that have just solved, used by
	/// the `notifications_alert_solved` procedure.
	#[tracing::instrument(skip(self))]
	pub async fn get_active_for_solved_alerts(&self) -> Result<Vec<Notification>> {
		let rows = sqlx::query_as::<_, Row>(
			r#"
            SELECT n.id, n.alert_id, n.status, n.data, n.created_at, n.closed_at
            FROM notifications n
            JOIN alerts a ON a.id = n.alert_id
            WHERE n.status = 'active' AND a.status = 'solved'
            ORDER BY n.id
            "#,
		)
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(from_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn close(&self, id: NotificationId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE notifications SET status = 'closed', closed_at = ? WHERE id = ? AND status = 'active'")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
	async fn create(&self, alert_id: AlertId, data: &Map<String, Value>) -> Result<Notification>;
	async fn get_active_for_solved_alerts(&self) -> Result<Vec<Notification>>;
	async fn close(&self, id: NotificationId, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
impl NotificationStore for NotificationRepository {
	async fn create(&self, alert_id: AlertId, data: &Map<String, Value>) -> Result<Notification> {
		self.create(alert_id, data).await
	}
	async fn get_active_for_solved_alerts(&self) -> Result<Vec<Notification>> {
		self.get_active_for_solved_alerts().await
	}
	async fn close(&self, id: NotificationId, at: DateTime<Utc>) -> Result<()> {
		self.close(id, at).await
	}
}
