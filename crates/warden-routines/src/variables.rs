//! Loads a monitor's stored `Variable` rows into the `variables` map
//! handed to its `search`/`update` callable. Writing a variable back
//! is not routed through this module: a monitor's module factory
//! captures a `VariableRepository` directly, the same way the built-in
//! monitors capture a `MonitorRepository`, and calls `set`/`delete` on
//! it from inside `search`/`update` — mirroring how the reference
//! implementation's `variables` helper scopes reads and writes to the
//! running monitor rather than threading them through a return value.

use std::collections::HashMap;

use warden_core::MonitorId;
use warden_db::VariableRepository;

use crate::error::Result;

pub async fn load_variables(variables: &VariableRepository, monitor_id: MonitorId) -> Result<HashMap<String, String>> {
	let stored = variables.get_all(monitor_id).await?;
	Ok(stored.into_iter().filter_map(|v| v.value.map(|value| (v.key, value))).collect())
}
