//! Built-in monitors compiled directly into the binary: health
//! self-checks over the platform's own store, registered into a
//! [`ModuleFactoryTable`] at startup the same way any operator-authored
//! monitor would be.

pub mod consecutive_fails;
pub mod high_active_issues;

use sqlx::SqlitePool;
use warden_loader::ModuleFactoryTable;

/// Monitor names under which the built-in checks register themselves.
pub const MONITOR_CONSECUTIVE_FAILS: &str = "monitor_consecutive_fails";
pub const MONITOR_HIGH_ACTIVE_ISSUES_COUNT: &str = "monitor_high_active_issues_count";

/// Registers every built-in monitor's factory under its name.
pub fn register_internal_monitors(table: &mut ModuleFactoryTable, pool: SqlitePool) {
	table.register(MONITOR_CONSECUTIVE_FAILS, consecutive_fails::factory(pool.clone()));
	table.register(MONITOR_HIGH_ACTIVE_ISSUES_COUNT, high_active_issues::factory(pool));
}

#[cfg(test)]
mod tests {
	use super::*;
	use warden_db::testing::create_test_pool;

	#[tokio::test]
	async fn registers_both_built_in_monitors() {
		let pool = create_test_pool().await;
		let mut table = ModuleFactoryTable::new();
		register_internal_monitors(&mut table, pool);

		assert!(table.get(MONITOR_CONSECUTIVE_FAILS).is_some());
		assert!(table.get(MONITOR_HIGH_ACTIVE_ISSUES_COUNT).is_some());
	}
}
