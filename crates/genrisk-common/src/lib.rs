//! genrisk-common — Shared domain types and errors used across all genrisk crates.

pub mod error;
pub mod entities;
pub mod features;

// Re-export commonly used types
pub use error::{Result, RiskError};
pub use entities::{
    Disease, DiseaseId, DiseaseVariantLink, ModelScope, PatientVariantObservation,
    PredictionResult, RiskLevel, VariantId, VariantRecord,
};
pub use features::{FeatureVector, FEATURE_COLUMNS, FEATURE_DIM};
