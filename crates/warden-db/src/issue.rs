use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use warden_core::{AlertId, IssueId, MonitorId};

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueStatus {
	Active,
	Dropped,
	Solved,
}

impl IssueStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			IssueStatus::Active => "active",
			IssueStatus::Dropped => "dropped",
			IssueStatus::Solved => "solved",
		}
	}
}

impl std::str::FromStr for IssueStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"active" => Ok(IssueStatus::Active),
			"dropped" => Ok(IssueStatus::Dropped),
			"solved" => Ok(IssueStatus::Solved),
			_ => Err(format!("unknown issue status: {s}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
	pub id: IssueId,
	pub monitor_id: MonitorId,
	pub alert_id: Option<AlertId>,
	pub model_id: String,
	pub status: IssueStatus,
	pub data: Map<String, Value>,
	pub created_at: DateTime<Utc>,
	pub solved_at: Option<DateTime<Utc>>,
	pub dropped_at: Option<DateTime<Utc>>,
}

type Row = (
	i64,
	i64,
	Option<i64>,
	String,
	String,
	String,
	DateTime<Utc>,
	Option<DateTime<Utc>>,
	Option<DateTime<Utc>>,
);

fn from_row(row: Row) -> Result<Issue> {
	let data = match serde_json::from_str::<Value>(&row.5)? {
		Value::Object(map) => map,
		_ => return Err(DbError::Internal("issue data is not an object".to_string())),
	};
	Ok(Issue {
		id: IssueId::new(row.0),
		monitor_id: MonitorId::new(row.1),
		alert_id: row.2.map(AlertId::new),
		model_id: row.3,
		status: row.4.parse().map_err(DbError::Internal)?,
		data,
		created_at: row.6,
		solved_at: row.7,
		dropped_at: row.8,
	})
}

const SELECT_COLUMNS: &str = "id, monitor_id, alert_id, model_id, status, data, created_at, solved_at, dropped_at";

#[derive(Clone)]
pub struct IssueRepository {
	pool: SqlitePool,
}

impl IssueRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Batch-create active issues for `monitor_id`. Returns them in the
	/// order inserted.
	#[tracing::instrument(skip(self, items))]
	pub async fn create_batch(
		&self,
		monitor_id: MonitorId,
		items: Vec<(String, Map<String, Value>)>,
	) -> Result<Vec<Issue>> {
		let mut created = Vec::with_capacity(items.len());
		let now = Utc::now();
		for (model_id, data) in items {
			let data_json = serde_json::to_string(&Value::Object(data.clone()))?;
			let result = sqlx::query(
				"INSERT INTO issues (monitor_id, model_id, status, data, created_at) VALUES (?, ?, 'active', ?, ?)",
			)
			.bind(i64::from(monitor_id))
			.bind(&model_id)
			.bind(&data_json)
			.bind(now)
			.execute(&self.pool)
			.await?;

			created.push(Issue {
				id: IssueId::new(result.last_insert_rowid()),
				monitor_id,
				alert_id: None,
				model_id,
				status: IssueStatus::Active,
				data,
				created_at: now,
				solved_at: None,
				dropped_at: None,
			});
		}
		Ok(created)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Issue>> {
		let rows = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM issues WHERE monitor_id = ? AND status = 'active' ORDER BY id"
		))
		.bind(i64::from(monitor_id))
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(from_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_id(&self, id: IssueId) -> Result<Option<Issue>> {
		let row = sqlx::query_as::<_, Row>(&format!("SELECT {SELECT_COLUMNS} FROM issues WHERE id = ?"))
			.bind(i64::from(id))
			.fetch_optional(&self.pool)
			.await?;
		row.map(from_row).transpose()
	}

	/// Active issues for `monitor_id` not yet linked to any alert.
	#[tracing::instrument(skip(self))]
	pub async fn get_unlinked_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Issue>> {
		let rows = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM issues WHERE monitor_id = ? AND status = 'active' AND alert_id IS NULL ORDER BY id"
		))
		.bind(i64::from(monitor_id))
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(from_row).collect()
	}

	/// The active issue matching `model_id` for this monitor, if any.
	#[tracing::instrument(skip(self))]
	pub async fn get_active_by_model_id(&self, monitor_id: MonitorId, model_id: &str) -> Result<Option<Issue>> {
		let row = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM issues WHERE monitor_id = ? AND model_id = ? AND status = 'active'"
		))
		.bind(i64::from(monitor_id))
		.bind(model_id)
		.fetch_optional(&self.pool)
		.await?;
		row.map(from_row).transpose()
	}

	/// True if any issue (active, solved, or dropped) with `model_id`
	/// exists for this monitor. Backs the `unique` issue option.
	#[tracing::instrument(skip(self))]
	pub async fn exists_any_by_model_id(&self, monitor_id: MonitorId, model_id: &str) -> Result<bool> {
		let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issues WHERE monitor_id = ? AND model_id = ?")
			.bind(i64::from(monitor_id))
			.bind(model_id)
			.fetch_one(&self.pool)
			.await?;
		Ok(row.0 > 0)
	}

	#[tracing::instrument(skip(self, data))]
	pub async fn update_data(&self, id: IssueId, data: &Map<String, Value>) -> Result<()> {
		let data_json = serde_json::to_string(&Value::Object(data.clone()))?;
		sqlx::query("UPDATE issues SET data = ? WHERE id = ?")
			.bind(data_json)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn solve(&self, id: IssueId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE issues SET status = 'solved', solved_at = ? WHERE id = ? AND status = 'active'")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn drop_issue(&self, id: IssueId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE issues SET status = 'dropped', dropped_at = ? WHERE id = ? AND status = 'active'")
			.bind(at)
			.bind(i64::from(id))
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self, ids))]
	pub async fn link_to_alert(&self, ids: &[IssueId], alert_id: AlertId) -> Result<()> {
		for id in ids {
			sqlx::query("UPDATE issues SET alert_id = ? WHERE id = ?")
				.bind(i64::from(alert_id))
				.bind(i64::from(*id))
				.execute(&self.pool)
				.await?;
		}
		Ok(())
	}

	/// Active issues currently linked to `alert_id`. Feeds priority rule
	/// evaluation, which needs each issue's age and data, not just a count.
	#[tracing::instrument(skip(self))]
	pub async fn get_active_by_alert(&self, alert_id: AlertId) -> Result<Vec<Issue>> {
		let rows = sqlx::query_as::<_, Row>(&format!(
			"SELECT {SELECT_COLUMNS} FROM issues WHERE alert_id = ? AND status = 'active' ORDER BY id"
		))
		.bind(i64::from(alert_id))
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(from_row).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn count_active_by_alert(&self, alert_id: AlertId) -> Result<i64> {
		let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM issues WHERE alert_id = ? AND status = 'active'")
			.bind(i64::from(alert_id))
			.fetch_one(&self.pool)
			.await?;
		Ok(row.0)
	}
}

#[async_trait]
pub trait IssueStore: Send + Sync {
	async fn create_batch(&self, monitor_id: MonitorId, items: Vec<(String, Map<String, Value>)>) -> Result<Vec<Issue>>;
	async fn get_by_id(&self, id: IssueId) -> Result<Option<Issue>>;
	async fn get_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Issue>>;
	async fn get_unlinked_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Issue>>;
	async fn get_active_by_model_id(&self, monitor_id: MonitorId, model_id: &str) -> Result<Option<Issue>>;
	async fn exists_any_by_model_id(&self, monitor_id: MonitorId, model_id: &str) -> Result<bool>;
	async fn update_data(&self, id: IssueId, data: &Map<String, Value>) -> Result<()>;
	async fn solve(&self, id: IssueId, at: DateTime<Utc>) -> Result<()>;
	async fn drop_issue(&self, id: IssueId, at: DateTime<Utc>) -> Result<()>;
	async fn link_to_alert(&self, ids: &[IssueId], alert_id: AlertId) -> Result<()>;
	async fn get_active_by_alert(&self, alert_id: AlertId) -> Result<Vec<Issue>>;
	async fn count_active_by_alert(&self, alert_id: AlertId) -> Result<i64>;
}

#[async_trait]
impl IssueStore for IssueRepository {
	async fn create_batch(&self, monitor_id: MonitorId, items: Vec<(String, Map<String, Value>)>) -> Result<Vec<Issue>> {
		self.create_batch(monitor_id, items).await
	}
	async fn get_by_id(&self, id: IssueId) -> Result<Option<Issue>> {
		self.get_by_id(id).await
	}
	async fn get_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Issue>> {
		self.get_active_by_monitor(monitor_id).await
	}
	async fn get_unlinked_active_by_monitor(&self, monitor_id: MonitorId) -> Result<Vec<Issue>> {
		self.get_unlinked_active_by_monitor(monitor_id).await
	}
	async fn get_active_by_model_id(&self, monitor_id: MonitorId, model_id: &str) -> Result<Option<Issue>> {
		self.get_active_by_model_id(monitor_id, model_id).await
	}
	async fn exists_any_by_model_id(&self, monitor_id: MonitorId, model_id: &str) -> Result<bool> {
		self.exists_any_by_model_id(monitor_id, model_id).await
	}
	async fn update_data(&self, id: IssueId, data: &Map<String, Value>) -> Result<()> {
		self.update_data(id, data).await
	}
	async fn solve(&self, id: IssueId, at: DateTime<Utc>) -> Result<()> {
		self.solve(id, at).await
	}
	async fn drop_issue(&self, id: IssueId, at: DateTime<Utc>) -> Result<()> {
		self.drop_issue(id, at).await
	}
	async fn link_to_alert(&self, ids: &[IssueId], alert_id: AlertId) -> Result<()> {
		self.link_to_alert(ids, alert_id).await
	}
	async fn get_active_by_alert(&self, alert_id: AlertId) -> Result<Vec<Issue>> {
		self.get_active_by_alert(alert_id).await
	}
	async fn count_active_by_alert(&self, alert_id: AlertId) -> Result<i64> {
		self.count_active_by_alert(alert_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::monitor::MonitorRepository;
	use crate::testing::create_test_pool;
	use serde_json::json;

	fn obj(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => panic!("expected object"),
		}
	}

	#[tokio::test]
	async fn create_batch_then_fetch_active() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool);
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();

		let created = issues
			.create_batch(
				monitor.id,
				vec![
					("1".to_string(), obj(json!({"id": 1}))),
					("2".to_string(), obj(json!({"id": 2}))),
				],
			)
			.await
			.unwrap();
		assert_eq!(created.len(), 2);

		let active = issues.get_active_by_monitor(monitor.id).await.unwrap();
		assert_eq!(active.len(), 2);
		assert!(active.iter().all(|i| i.status == IssueStatus::Active));
	}

	#[tokio::test]
	async fn solve_removes_from_active_set() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool);
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();

		let created = issues
			.create_batch(monitor.id, vec![("1".to_string(), obj(json!({"id": 1})))])
			.await
			.unwrap();

		issues.solve(created[0].id, Utc::now()).await.unwrap();
		let active = issues.get_active_by_monitor(monitor.id).await.unwrap();
		assert!(active.is_empty());
	}

	#[tokio::test]
	async fn exists_any_by_model_id_survives_solve() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool);
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();

		let created = issues
			.create_batch(monitor.id, vec![("42".to_string(), obj(json!({"id": 42})))])
			.await
			.unwrap();
		issues.solve(created[0].id, Utc::now()).await.unwrap();

		assert!(issues.exists_any_by_model_id(monitor.id, "42").await.unwrap());
		assert!(!issues.exists_any_by_model_id(monitor.id, "43").await.unwrap());
	}

	#[tokio::test]
	async fn link_to_alert_then_unlinked_set_shrinks() {
		let pool = create_test_pool().await;
		let monitors = MonitorRepository::new(pool.clone());
		let issues = IssueRepository::new(pool.clone());
		let monitor = monitors.get_or_create_by_name("m").await.unwrap();

		let created = issues
			.create_batch(monitor.id, vec![("1".to_string(), obj(json!({"id": 1})))])
			.await
			.unwrap();

		assert_eq!(issues.get_unlinked_active_by_monitor(monitor.id).await.unwrap().len(), 1);

		sqlx::query("INSERT INTO alerts (monitor_id, status, priority, created_at) VALUES (?, 'active', 3, ?)")
			.bind(i64::from(monitor.id))
			.bind(Utc::now())
			.execute(&pool)
			.await
			.unwrap();
		let alert_id = AlertId::new(1);

		issues.link_to_alert(&[created[0].id], alert_id).await.unwrap();
		assert_eq!(issues.get_unlinked_active_by_monitor(monitor.id).await.unwrap().len(), 0);
		assert_eq!(issues.count_active_by_alert(alert_id).await.unwrap(), 1);
	}
}
