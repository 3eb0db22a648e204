//! Stored record shapes.
//!
//! The relational side (variants, diseases, links, predictions) and the
//! document side (model registry, genetic input log) share this module so
//! every store implementation agrees on field names.

use chrono::{DateTime, Utc};
use genrisk_common::{DiseaseId, ModelScope, RiskLevel, VariantRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const TABLE_VARIANTS: &str = "snp";
pub const TABLE_DISEASES: &str = "disease";
pub const TABLE_DISEASE_VARIANTS: &str = "disease_snp";
pub const TABLE_PREDICTIONS: &str = "prediction";
pub const COLLECTION_MODEL_METADATA: &str = "model_metadata";
pub const COLLECTION_GENETIC_INPUTS: &str = "genetic_inputs";

/// One row of a variant snapshot before cleaning. Every field is raw text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVariantRow {
    #[serde(default)]
    pub snp_id: Option<String>,
    #[serde(default)]
    pub rsid: Option<String>,
    #[serde(default)]
    pub gene_id: Option<String>,
    #[serde(default)]
    pub chromosome: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub risk_allele: Option<String>,
    #[serde(default)]
    pub odds_ratio: Option<String>,
    #[serde(default)]
    pub risk_allele_freq: Option<String>,
    #[serde(default)]
    pub p_value: Option<String>,
    #[serde(default)]
    pub is_significant: Option<String>,
}

impl From<&VariantRecord> for RawVariantRow {
    /// Re-render a stored variant so training always goes through the cleaner.
    fn from(v: &VariantRecord) -> Self {
        Self {
            snp_id: Some(v.variant_id.to_string()),
            rsid: Some(v.rsid.clone()),
            gene_id: v.gene_id.map(|g| g.to_string()),
            chromosome: Some(v.chromosome.to_string()),
            position: Some(v.position.to_string()),
            risk_allele: v.risk_allele.map(String::from),
            odds_ratio: Some(v.odds_ratio.to_string()),
            risk_allele_freq: Some(v.risk_allele_freq.to_string()),
            p_value: v.p_value.map(|p| p.to_string()),
            is_significant: Some(v.is_significant.to_string()),
        }
    }
}

/// A trained model as persisted in the registry collection. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDocument {
    pub id: Uuid,
    pub scope: ModelScope,
    /// Serialized classifier; opaque to the store.
    pub model: String,
    pub feature_names: Vec<String>,
    pub training_rows: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: serde_json::Value,
}

impl ModelDocument {
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id,
            scope: self.scope,
            training_rows: self.training_rows,
            created_at: self.created_at,
        }
    }
}

/// Lightweight listing entry (no serialized model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub id: Uuid,
    pub scope: ModelScope,
    pub training_rows: usize,
    pub created_at: DateTime<Utc>,
}

/// Raw input log written once per prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticInputDocument {
    pub id: Uuid,
    pub patient_id: i64,
    pub upload_time: DateTime<Utc>,
    /// rsid → allele as submitted
    pub raw_snps: BTreeMap<String, String>,
    pub derived_features: serde_json::Map<String, serde_json::Value>,
    pub model_id: Uuid,
    pub source: String,
}

/// Prediction row for the relational `prediction` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub pred_id: Uuid,
    pub patient_id: i64,
    pub disease_id: DiseaseId,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
}
