use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use warden_core::MonitorId;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct CodeModule {
	pub monitor_id: MonitorId,
	pub code: String,
	pub additional_files: HashMap<String, String>,
	pub registered_at: DateTime<Utc>,
}

type Row = (i64, String, String, DateTime<Utc>);

fn from_row(row: Row) -> Result<CodeModule> {
	let additional_files = serde_json::from_str(&row.2)?;
	Ok(CodeModule {
		monitor_id: MonitorId::new(row.0),
		code: row.1,
		additional_files,
		registered_at: row.3,
	})
}

#[derive(Clone)]
pub struct CodeModuleRepository {
	pool: SqlitePool,
}

impl CodeModuleRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Upsert the code module for `monitor_id`, bumping `registered_at`.
	/// Registering never touches the owning Monitor's runtime state.
	#[tracing::instrument(skip(self, code, additional_files))]
	pub async fn upsert(
		&self,
		monitor_id: MonitorId,
		code: &str,
		additional_files: &HashMap<String, String>,
	) -> Result<()> {
		let files_json = serde_json::to_string(additional_files)?;
		let now = Utc::now();
		sqlx::query(
			r#"
            INSERT INTO code_modules (monitor_id, code, additional_files, registered_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(monitor_id) DO UPDATE SET
                code = excluded.code,
                additional_files = excluded.additional_files,
                registered_at = excluded.registered_at
            "#,
		)
		.bind(i64::from(monitor_id))
		.bind(code)
		.bind(files_json)
		.bind(now)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_by_monitor(&self, monitor_id: MonitorId) -> Result<Option<CodeModule>> {
		let row = sqlx::query_as::<_, Row>(
			"SELECT monitor_id, code, additional_files, registered_at FROM code_modules WHERE monitor_id = ?",
		)
		.bind(i64::from(monitor_id))
		.fetch_optional(&self.pool)
		.await?;
		row.map(from_row).transpose()
	}

	#[tracing::instrument(skip(self))]
	pub async fn exists(&self, monitor_id: MonitorId) -> Result<bool> {
		let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM code_modules WHERE monitor_id = ?")
			.bind(i64::from(monitor_id))
			.fetch_one(&self.pool)
			.await?;
		Ok(row.0 > 0)
	}

	/// Ids of enabled monitors whose module was registered at or after
	/// `since`, used by the loader to compute its refresh delta.
	#[tracing::instrument(skip(self))]
	pub async fn get_monitor_ids_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<MonitorId>> {
		let rows: Vec<(i64,)> = sqlx::query_as(
			r#"
            SELECT cm.monitor_id FROM code_modules cm
            JOIN monitors m ON m.id = cm.monitor_id
            WHERE m.enabled = 1 AND cm.registered_at >= ?
            "#,
		)
		.bind(since)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(|(id,)| MonitorId::new(id)).collect())
	}
}

#[async_trait]
pub trait CodeModuleStore: Send + Sync {
	async fn upsert(
		&self,
		monitor_id: MonitorId,
		code: &str,
		additional_files: &HashMap<String, String>,
	) -> Result<()>;
	async fn get_by_monitor(&self, monitor_id: MonitorId) -> Result<Option<CodeModule>>;
	async fn exists(&self, monitor_id: MonitorId) -> Result<bool>;
	async fn get_monitor_ids_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<MonitorId>>;
}

#[async_trait]
impl CodeModuleStore for CodeModuleRepository {
	async fn upsert(
		&self,
		monitor_id: MonitorId,
		code: &str,
		additional_files: &HashMap<String, String>,
	) -> Result<()> {
		self.upsert(monitor_id, code, additional_files).await
	}
	async fn get_by_monitor(&self, monitor_id: MonitorId) -> Result<Option<CodeModule>> {
		self.get_by_monitor(monitor_id).await
	}
	async fn exists(&self, monitor_id: MonitorId) -> Result<bool> {
		self.exists(monitor_id).await
	}
	async fn get_monitor_ids_changed_since(&self, since: DateTime<Utc>) -> Result<Vec<MonitorId>> {
		self.get_monitor_ids_changed_since(since).await
	}
}
