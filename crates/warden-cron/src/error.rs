#[derive(Debug, thiserror::Error)]
pub enum CronError {
	#[error("invalid cron expression '{0}': {1}")]
	InvalidExpression(String, String),

	#[error("invalid timezone '{0}'")]
	InvalidTimezone(String),

	#[error("no upcoming occurrence for schedule")]
	NoUpcomingOccurrence,
}

pub type Result<T> = std::result::Result<T, CronError>;
