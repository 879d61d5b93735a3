//! Stable integer identifiers for the platform's persistent entities.
//!
//! Each entity gets its own newtype rather than a bare `i64` so the
//! compiler catches an `IssueId` passed where an `AlertId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! int_id {
	($name:ident) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
		#[serde(transparent)]
		pub struct $name(pub i64);

		impl $name {
			pub fn new(id: i64) -> Self {
				Self(id)
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self(id)
			}
		}

		impl From<$name> for i64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

int_id!(MonitorId);
int_id!(IssueId);
int_id!(AlertId);
int_id!(NotificationId);

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn monitor_id_roundtrips_through_i64(raw in any::<i64>()) {
			let id = MonitorId::new(raw);
			prop_assert_eq!(i64::from(id), raw);
			prop_assert_eq!(id.to_string(), raw.to_string());
		}
	}
}
