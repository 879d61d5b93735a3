//! A small timezone-aware clock, configured once from `time_zone` (spec
//! §6) and shared by the controller, loader, and routine engine.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{CronError, Result};

#[derive(Debug, Clone)]
pub struct Clock {
	zone: Tz,
}

impl Clock {
	pub fn new(timezone: &str) -> Result<Self> {
		let zone = timezone
			.parse()
			.map_err(|_| CronError::InvalidTimezone(timezone.to_string()))?;
		Ok(Self { zone })
	}

	/// The current instant, tagged with the configured zone for display.
	pub fn now(&self) -> DateTime<Tz> {
		Utc::now().with_timezone(&self.zone)
	}

	/// The current instant in UTC - the representation stored and
	/// compared everywhere outside of user-facing formatting.
	pub fn utc_now(&self) -> DateTime<Utc> {
		Utc::now()
	}

	pub fn zone(&self) -> Tz {
		self.zone
	}
}

impl Default for Clock {
	fn default() -> Self {
		Self { zone: chrono_tz::UTC }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_clock_is_utc() {
		let clock = Clock::default();
		assert_eq!(clock.zone(), chrono_tz::UTC);
	}

	#[test]
	fn rejects_unknown_zone() {
		assert!(Clock::new("Definitely/Not_A_Zone").is_err());
	}
}
