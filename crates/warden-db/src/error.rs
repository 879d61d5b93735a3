#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("not found: {0}")]
	NotFound(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("internal: {0}")]
	Internal(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;
