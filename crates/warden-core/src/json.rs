//! JSON-compatibility coercion for data returned by monitor routines.
//!
//! `serde_json::to_value` already enforces JSON-compatible output at the
//! type-system boundary: a `DateTime<Utc>` field serializes to an RFC
//! 3339 string and anything that doesn't implement `Serialize` simply
//! won't compile. So the only thing left to check at this boundary is
//! shape: issue data must be an object, not a bare scalar or array.

use serde_json::{Map, Value};

/// Accept only object-shaped issue data.
pub fn coerce_issue_data(value: Value) -> Option<Map<String, Value>> {
	match value {
		Value::Object(map) => Some(map),
		_ => None,
	}
}
