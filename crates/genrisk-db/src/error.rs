//! Database error types.

use genrisk_common::RiskError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Corrupt record in {file} at line {line}: {reason}")]
    Corrupt { file: String, line: usize, reason: String },
}

impl From<DbError> for RiskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => RiskError::NotFound(what),
            other => RiskError::Storage(other.to_string()),
        }
    }
}
