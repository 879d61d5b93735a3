//! `register`: validate a monitor module's shape, then upsert its
//! Monitor and CodeModule rows. Never resets a monitor's runtime state.

use std::collections::HashMap;

use sqlx::SqlitePool;
use warden_core::MonitorId;
use warden_db::{CodeModuleRepository, MonitorRepository};

use crate::error::Result;
use crate::factory::ModuleFactory;

#[tracing::instrument(skip(pool, factory, code, additional_files))]
pub async fn register(
	pool: &SqlitePool,
	factory: &dyn ModuleFactory,
	name: &str,
	code: &str,
	additional_files: HashMap<String, String>,
) -> Result<MonitorId> {
	let module = factory.create();
	warden_module::validate(&module)?;

	let monitors = MonitorRepository::new(pool.clone());
	let monitor = monitors.get_or_create_by_name(name).await?;

	let code_modules = CodeModuleRepository::new(pool.clone());
	code_modules.upsert(monitor.id, code, &additional_files).await?;

	Ok(monitor.id)
}
