//! Cron parsing, triggering, and next-occurrence calculation.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

use crate::error::{CronError, Result};

/// Expand a standard 5-field Unix cron expression to the 7-field format
/// the `cron` crate expects. Expressions already at 6+ fields pass
/// through untouched.
fn expand(expression: &str) -> String {
	let field_count = expression.split_whitespace().count();
	if field_count >= 6 {
		expression.to_string()
	} else {
		format!("0 {expression} *")
	}
}

fn parse_schedule(expression: &str) -> Result<Schedule> {
	let expanded = expand(expression);
	Schedule::from_str(&expanded)
		.map_err(|e| CronError::InvalidExpression(expression.to_string(), e.to_string()))
}

fn parse_timezone(timezone: &str) -> Result<Tz> {
	timezone
		.parse()
		.map_err(|_| CronError::InvalidTimezone(timezone.to_string()))
}

/// Validate a cron expression without evaluating it against a clock.
pub fn validate_expression(expression: &str) -> Result<()> {
	parse_schedule(expression).map(|_| ())
}

/// Validate an IANA timezone string.
pub fn validate_timezone(timezone: &str) -> Result<()> {
	parse_timezone(timezone).map(|_| ())
}

/// `is_triggered(cron, last_trigger, ref)` — true iff the cron schedule
/// has a firing in the interval `(last_trigger, ref]`.
///
/// Rather than scanning backward for "the most recent firing at or
/// before `ref`" (expensive for the `cron` crate's forward-only
/// iterator), we ask the equivalent forward question: does the next
/// occurrence *after* `last_trigger` land at or before `ref`? Both
/// phrasings select exactly the same set of triggered ticks.
pub fn is_triggered(
	expression: &str,
	timezone: &str,
	last_trigger: DateTime<Utc>,
	reference: DateTime<Utc>,
) -> Result<bool> {
	let schedule = parse_schedule(expression)?;
	let tz = parse_timezone(timezone)?;

	let local_last = last_trigger.with_timezone(&tz);
	let next = schedule.after(&local_last).next();

	Ok(match next {
		Some(next) => next.with_timezone(&Utc) <= reference,
		None => false,
	})
}

/// Ceiling seconds until the next firing of `expression` after
/// `reference`.
pub fn time_until_next(expression: &str, timezone: &str, reference: DateTime<Utc>) -> Result<i64> {
	let schedule = parse_schedule(expression)?;
	let tz = parse_timezone(timezone)?;

	let local_reference = reference.with_timezone(&tz);
	let next = schedule
		.after(&local_reference)
		.next()
		.ok_or(CronError::NoUpcomingOccurrence)?
		.with_timezone(&Utc);

	Ok((next - reference).num_seconds().max(0))
}
