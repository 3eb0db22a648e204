/// Core entity types mirroring the relational variant schema.
/// These are Rust representations of the snp / disease / disease_snp tables.

use std::fmt;

use serde::{Deserialize, Serialize};

pub type DiseaseId = i64;
pub type VariantId = i64;

// ---------------------------------------------------------------------------
// Variant (SNP)
// ---------------------------------------------------------------------------

/// A genomic marker with its association statistics.
/// Values are already normalised (see `genrisk_ml::cleaner`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub variant_id: VariantId,
    pub rsid: String,            // e.g. rs7903146
    pub gene_id: Option<i64>,
    pub chromosome: u8,          // 1-22, X = 23, Y = 24
    pub position: u64,
    pub risk_allele: Option<char>,
    pub odds_ratio: f64,
    pub risk_allele_freq: f64,
    pub p_value: Option<f64>,
    pub is_significant: bool,
}

impl VariantRecord {
    /// True when the patient's reported allele is this variant's risk allele.
    pub fn is_risk_allele(&self, allele: &str) -> bool {
        match self.risk_allele {
            Some(risk) => allele
                .trim()
                .chars()
                .next()
                .map(|c| c.eq_ignore_ascii_case(&risk))
                .unwrap_or(false),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Disease
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disease {
    pub disease_id: DiseaseId,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Curated association between a disease and a variant relevant to its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiseaseVariantLink {
    pub disease_id: DiseaseId,
    pub variant_id: VariantId,
}

// ---------------------------------------------------------------------------
// Model scope
// ---------------------------------------------------------------------------

/// Which population a model was trained on: every variant, or one disease's links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "disease_id", rename_all = "snake_case")]
pub enum ModelScope {
    Global,
    Disease(DiseaseId),
}

impl ModelScope {
    pub fn disease_id(&self) -> Option<DiseaseId> {
        match self {
            ModelScope::Global => None,
            ModelScope::Disease(id) => Some(*id),
        }
    }
}

impl From<Option<DiseaseId>> for ModelScope {
    fn from(disease_id: Option<DiseaseId>) -> Self {
        match disease_id {
            Some(id) => ModelScope::Disease(id),
            None => ModelScope::Global,
        }
    }
}

impl fmt::Display for ModelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelScope::Global => write!(f, "global"),
            ModelScope::Disease(id) => write!(f, "disease_id={id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Patient input / prediction output
// ---------------------------------------------------------------------------

/// A patient's reported allele at a variant. The rsid may be unknown to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientVariantObservation {
    pub rsid: String,
    pub allele: String,
}

impl PatientVariantObservation {
    pub fn new(rsid: impl Into<String>, allele: impl Into<String>) -> Self {
        Self { rsid: rsid.into(), allele: allele.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    High,
}

impl RiskLevel {
    pub const THRESHOLD: f64 = 0.5;

    pub fn from_probability(probability: f64) -> Self {
        if probability > Self::THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub level: RiskLevel,
}

impl PredictionResult {
    pub fn from_probability(probability: f64) -> Self {
        Self { probability, level: RiskLevel::from_probability(probability) }
    }
}
