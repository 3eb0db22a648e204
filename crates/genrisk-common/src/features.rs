//! The fixed four-column feature schema shared by training and inference.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

pub const FEATURE_DIM: usize = 4;

/// Column order used by every training and inference path.
pub const FEATURE_COLUMNS: [&str; FEATURE_DIM] =
    ["odds_ratio", "risk_allele_freq", "chromosome", "position"];

/// Bounds applied by the cleaner.
pub const ODDS_RATIO_RANGE: (f64, f64) = (0.1, 20.0);
pub const RISK_ALLELE_FREQ_RANGE: (f64, f64) = (0.0, 1.0);
pub const CHROMOSOME_RANGE: (f64, f64) = (1.0, 24.0);
pub const POSITION_RANGE: (f64, f64) = (1e5, 2.5e8);

/// (odds_ratio, risk_allele_freq, chromosome, position)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; FEATURE_DIM]);

impl FeatureVector {
    /// Returned by the aggregator when no patient variant survives filtering.
    pub const NEUTRAL: FeatureVector = FeatureVector([1.0, 0.0, 0.0, 0.0]);

    pub fn new(odds_ratio: f64, risk_allele_freq: f64, chromosome: f64, position: f64) -> Self {
        Self([odds_ratio, risk_allele_freq, chromosome, position])
    }

    /// Build from an arbitrary slice, failing on any length other than four.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let arr: [f64; FEATURE_DIM] = values.try_into().map_err(|_| RiskError::Dimension {
            expected: FEATURE_DIM,
            actual: values.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn odds_ratio(&self) -> f64 { self.0[0] }
    pub fn risk_allele_freq(&self) -> f64 { self.0[1] }
    pub fn chromosome(&self) -> f64 { self.0[2] }
    pub fn position(&self) -> f64 { self.0[3] }

    pub fn as_array(&self) -> [f64; FEATURE_DIM] {
        self.0
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Named view used in logged payloads.
    pub fn to_named(&self) -> serde_json::Map<String, serde_json::Value> {
        FEATURE_COLUMNS
            .iter()
            .zip(self.0.iter())
            .map(|(name, v)| (name.to_string(), serde_json::json!(v)))
            .collect()
    }

    /// True when every component lies inside the cleaner's bounds.
    pub fn within_bounds(&self) -> bool {
        let in_range = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
        in_range(self.odds_ratio(), ODDS_RATIO_RANGE)
            && in_range(self.risk_allele_freq(), RISK_ALLELE_FREQ_RANGE)
            && in_range(self.chromosome(), CHROMOSOME_RANGE)
            && in_range(self.position(), POSITION_RANGE)
    }
}

impl From<[f64; FEATURE_DIM]> for FeatureVector {
    fn from(values: [f64; FEATURE_DIM]) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = FeatureVector::from_slice(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, RiskError::Dimension { expected: 4, actual: 3 }));
        assert!(FeatureVector::from_slice(&[1.0, 0.3, 5.0, 1e6]).is_ok());
    }

    #[test]
    fn test_named_payload_follows_column_order() {
        let fv = FeatureVector::new(2.0, 0.4, 5.0, 1_000_000.0);
        let named = fv.to_named();
        assert_eq!(named["odds_ratio"], 2.0);
        assert_eq!(named["position"], 1_000_000.0);
        let keys: Vec<&String> = named.keys().collect();
        assert_eq!(keys.len(), FEATURE_DIM);
    }

    #[test]
    fn test_neutral_is_outside_clean_bounds() {
        assert!(!FeatureVector::NEUTRAL.within_bounds());
        assert!(FeatureVector::new(1.0, 0.3, 1.0, 1e7).within_bounds());
    }
}
