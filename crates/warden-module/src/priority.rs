//! Priority rule evaluation: `AgeRule` / `CountRule` / `ValueRule`
//! dispatch to the same `calculate_priority` entry point.

use serde_json::{Map, Value};

use crate::options::{PriorityLevels, Rule, ValueOperation};

/// 1..5, lower is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum AlertPriority {
	Critical = 1,
	High = 2,
	Moderate = 3,
	Low = 4,
	Informational = 5,
}

impl AlertPriority {
	pub const ALL_MOST_SEVERE_FIRST: [AlertPriority; 5] = [
		AlertPriority::Critical,
		AlertPriority::High,
		AlertPriority::Moderate,
		AlertPriority::Low,
		AlertPriority::Informational,
	];

	pub fn as_i32(&self) -> i32 {
		*self as i32
	}

	fn threshold(&self, levels: &PriorityLevels) -> Option<i64> {
		match self {
			AlertPriority::Critical => levels.critical,
			AlertPriority::High => levels.high,
			AlertPriority::Moderate => levels.moderate,
			AlertPriority::Low => levels.low,
			AlertPriority::Informational => levels.informational,
		}
	}
}

/// Minimal view of an issue a priority rule needs: its age and its data
/// map. Callers project their store's `Issue` rows into this.
pub struct IssueSnapshot {
	pub age_secs: i64,
	pub data: Map<String, Value>,
}

fn calculate_age_rule(levels: &PriorityLevels, issues: &[IssueSnapshot]) -> Option<i32> {
	let max_age = issues.iter().map(|i| i.age_secs).max()?;
	for priority in AlertPriority::ALL_MOST_SEVERE_FIRST {
		if let Some(threshold) = priority.threshold(levels) {
			if max_age > threshold {
				return Some(priority.as_i32());
			}
		}
	}
	None
}

fn calculate_count_rule(levels: &PriorityLevels, issues: &[IssueSnapshot]) -> Option<i32> {
	let count = issues.len() as i64;
	for priority in AlertPriority::ALL_MOST_SEVERE_FIRST {
		if let Some(threshold) = priority.threshold(levels) {
			if count > threshold {
				return Some(priority.as_i32());
			}
		}
	}
	None
}

fn calculate_value_rule(
	value_key: &str,
	operation: ValueOperation,
	levels: &PriorityLevels,
	issues: &[IssueSnapshot],
) -> Option<i32> {
	let op: fn(f64, f64) -> bool = match operation {
		ValueOperation::GreaterThan => |a, b| a > b,
		ValueOperation::LesserThan => |a, b| a < b,
	};

	let values: Vec<f64> = issues
		.iter()
		.filter_map(|issue| issue.data.get(value_key))
		.filter_map(Value::as_f64)
		.collect();

	for priority in AlertPriority::ALL_MOST_SEVERE_FIRST {
		if let Some(threshold) = priority.threshold(levels) {
			if values.iter().any(|&v| op(v, threshold as f64)) {
				return Some(priority.as_i32());
			}
		}
	}
	None
}

/// Evaluate `rule` against `issues`, walking severities most-severe
/// first. Returns `None` if no level's threshold is exceeded; callers
/// substitute `AlertPriority::Low` when that happens.
pub fn calculate_priority(rule: &Rule, issues: &[IssueSnapshot]) -> Option<i32> {
	match rule {
		Rule::Age { priority_levels } => calculate_age_rule(priority_levels, issues),
		Rule::Count { priority_levels } => calculate_count_rule(priority_levels, issues),
		Rule::Value {
			value_key,
			operation,
			priority_levels,
		} => calculate_value_rule(value_key, *operation, priority_levels, issues),
	}
}
