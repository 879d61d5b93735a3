use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::DbError;

/// Create a `SqlitePool` with WAL mode and sane pragmas.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, DbError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| DbError::Internal(format!("invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}

const INIT_SCHEMA: &str = include_str!("../migrations/001_init.sql");

/// Apply the schema. Every statement is `CREATE TABLE IF NOT EXISTS` /
/// `CREATE INDEX IF NOT EXISTS`, so this is safe to call on every startup.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for statement in INIT_SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
		sqlx::query(statement).execute(pool).await?;
	}
	tracing::debug!("schema up to date");
	Ok(())
}
