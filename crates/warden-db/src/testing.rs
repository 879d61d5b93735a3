use sqlx::SqlitePool;

use crate::pool::run_migrations;

/// An in-memory pool with the full schema applied, for unit tests.
pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePool::connect(":memory:").await.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}
