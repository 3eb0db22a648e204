//! Fitted impute → scale → logistic pipeline.

use genrisk_common::{Result, RiskError};
use serde::{Deserialize, Serialize};

/// Anything that yields one probability per class for a feature row.
///
/// The row returned by [`predict_proba`](Self::predict_proba) is aligned with
/// [`classes`](Self::classes), which need not be sorted.
pub trait ProbabilisticClassifier: Send + Sync {
    fn classes(&self) -> &[u8];

    fn n_features(&self) -> usize;

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    Uniform,
    Balanced,
}

/// Median imputation, standard scaling and a binary logistic model, as
/// learned from one training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// `classes[1]` is the class whose probability is `sigmoid(z)`.
    pub classes: Vec<u8>,
    pub class_weighting: ClassWeighting,
    pub n_iter: usize,
    pub converged: bool,
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl TrainedPipeline {
    /// Check that every learned vector agrees on the feature count.
    pub fn validate(&self) -> Result<()> {
        let d = self.coefficients.len();
        for (name, len) in [
            ("medians", self.medians.len()),
            ("means", self.means.len()),
            ("scales", self.scales.len()),
        ] {
            if len != d {
                return Err(RiskError::Schema(format!(
                    "pipeline {name} has {len} entries, coefficients have {d}"
                )));
            }
        }
        if self.classes.is_empty() || self.classes.len() > 2 {
            return Err(RiskError::Schema(format!(
                "pipeline must have one or two classes, has {}",
                self.classes.len()
            )));
        }
        Ok(())
    }

    /// Impute non-finite values, then standardise.
    pub fn transform(&self, features: &[f64]) -> Vec<f64> {
        features
            .iter()
            .enumerate()
            .map(|(j, &v)| {
                let v = if v.is_finite() { v } else { self.medians[j] };
                (v - self.means[j]) / self.scales[j]
            })
            .collect()
    }

    pub fn decision_function(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.n_features() {
            return Err(RiskError::Dimension {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        let z = self
            .transform(features)
            .iter()
            .zip(&self.coefficients)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.intercept;
        Ok(z)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let pipeline: Self = serde_json::from_str(text)?;
        pipeline.validate()?;
        Ok(pipeline)
    }
}

impl ProbabilisticClassifier for TrainedPipeline {
    fn classes(&self) -> &[u8] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        let z = self.decision_function(features)?;
        if self.classes.len() == 1 {
            return Ok(vec![1.0]);
        }
        let p = sigmoid(z);
        Ok(vec![1.0 - p, p])
    }
}
