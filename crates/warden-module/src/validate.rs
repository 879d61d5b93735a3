//! Structural validation a monitor module must satisfy before it is
//! registered: non-empty identity key, positive throughput limits, and
//! an `is_solved` callback iff issues are declared solvable.

use thiserror::Error;

use crate::module::MonitorModule;

#[derive(Debug, Error)]
#[error("monitor module failed validation: {}", .violations.join("; "))]
pub struct ModuleValidationError {
	pub violations: Vec<String>,
}

/// Returns every violation found, or `Ok(())` if the module is well formed.
pub fn validate(module: &MonitorModule) -> Result<(), ModuleValidationError> {
	let mut violations = Vec::new();

	if module.issue_options.model_id_key.trim().is_empty() {
		violations.push("issue_options.model_id_key must be non-empty".to_string());
	}

	if module.options.max_issues_creation == 0 {
		violations.push("monitor_options.max_issues_creation must be greater than zero".to_string());
	}

	if module.options.execution_timeout_secs == 0 {
		violations.push("monitor_options.execution_timeout_secs must be greater than zero".to_string());
	}

	if module.issue_options.solvable && module.is_solved.is_none() {
		violations.push("issue_options.solvable is true but no is_solved callback was provided".to_string());
	}

	if !module.issue_options.solvable && module.is_solved.is_some() {
		violations.push("an is_solved callback was provided but issue_options.solvable is false".to_string());
	}

	if module.options.search_cron.is_none() && module.options.update_cron.is_none() {
		violations.push("at least one of search_cron or update_cron must be set".to_string());
	}

	if violations.is_empty() {
		Ok(())
	} else {
		Err(ModuleValidationError { violations })
	}
}
