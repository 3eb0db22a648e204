use thiserror::Error;

use crate::entities::ModelScope;

#[derive(Debug, Error)]
pub enum RiskError {
    /// A required training column is absent.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Fewer than two label classes; training is skipped for this scope.
    #[error("Insufficient data for {scope}: {classes} label class(es) across {rows} rows")]
    InsufficientData {
        scope: ModelScope,
        classes: usize,
        rows: usize,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid feature dimension: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// One half of a two-store write succeeded and the other did not.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl RiskError {
    /// The requested model or disease does not exist (service-unavailable to callers).
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RiskError::NotFound(_))
    }

    /// The request itself was malformed (bad-request to callers).
    pub fn is_bad_request(&self) -> bool {
        matches!(self, RiskError::Dimension { .. } | RiskError::Schema(_))
    }

    /// Skip-and-continue condition during batch training.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, RiskError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
