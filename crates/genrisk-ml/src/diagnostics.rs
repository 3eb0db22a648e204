//! Post-fit model inspection.
//!
//! Summarises a fitted pipeline against its own training data so a
//! degenerate model (all coefficients ~0, a collapsed probability range)
//! shows up in the logs and in the stored model notes.

use genrisk_common::{Result, FEATURE_COLUMNS};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::inference::positive_class_probability;
use crate::pipeline::{ProbabilisticClassifier, TrainedPipeline};

/// Coefficients with magnitude below this count as "near zero".
pub const NEAR_ZERO: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDiagnostics {
    pub classes: Vec<u8>,
    pub intercept: f64,
    /// (feature name, coefficient) in column order.
    pub coefficients: Vec<(String, f64)>,
    pub coefficients_near_zero: bool,
    pub training_accuracy: f64,
    pub probability_min: f64,
    pub probability_max: f64,
    pub positives: usize,
    pub negatives: usize,
}

impl ModelDiagnostics {
    pub fn inspect(pipeline: &TrainedPipeline, x: &Array2<f64>, y: &[u8]) -> Result<Self> {
        let mut correct = 0usize;
        let mut p_min = f64::INFINITY;
        let mut p_max = f64::NEG_INFINITY;

        for (row, &label) in x.axis_iter(Axis(0)).zip(y) {
            let features: Vec<f64> = row.to_vec();
            let proba = pipeline.predict_proba(&features)?;
            let p = positive_class_probability(pipeline.classes(), &proba);
            p_min = p_min.min(p);
            p_max = p_max.max(p);
            if u8::from(p > 0.5) == label {
                correct += 1;
            }
        }

        let n = y.len();
        let positives = y.iter().filter(|&&l| l == 1).count();
        let coefficients: Vec<(String, f64)> = FEATURE_COLUMNS
            .iter()
            .zip(&pipeline.coefficients)
            .map(|(name, c)| (name.to_string(), *c))
            .collect();

        Ok(Self {
            classes: pipeline.classes.clone(),
            intercept: pipeline.intercept,
            coefficients_near_zero: coefficients.iter().all(|(_, c)| c.abs() < NEAR_ZERO),
            coefficients,
            training_accuracy: if n == 0 { 0.0 } else { correct as f64 / n as f64 },
            probability_min: if n == 0 { 0.0 } else { p_min },
            probability_max: if n == 0 { 0.0 } else { p_max },
            positives,
            negatives: n - positives,
        })
    }

    /// Spread of predicted probabilities over the training rows.
    pub fn probability_spread(&self) -> f64 {
        self.probability_max - self.probability_min
    }

    pub fn log(&self, scope: &str) {
        tracing::info!(
            scope,
            accuracy = self.training_accuracy,
            intercept = self.intercept,
            p_min = self.probability_min,
            p_max = self.probability_max,
            positives = self.positives,
            negatives = self.negatives,
            "Model diagnostics"
        );
        for (name, c) in &self.coefficients {
            tracing::debug!(scope, feature = %name, coefficient = c, "Coefficient");
        }
        if self.coefficients_near_zero {
            tracing::warn!(scope, "All coefficients are near zero; model predicts a constant");
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ClassWeighting;
    use ndarray::array;

    fn pipeline(coefficients: Vec<f64>) -> TrainedPipeline {
        TrainedPipeline {
            medians: vec![0.0; 4],
            means: vec![0.0; 4],
            scales: vec![1.0; 4],
            coefficients,
            intercept: 0.0,
            classes: vec![0, 1],
            class_weighting: ClassWeighting::Uniform,
            n_iter: 3,
            converged: true,
        }
    }

    #[test]
    fn test_flat_model_is_flagged() {
        let x = array![[1.0, 0.0, 0.0, 0.0], [2.0, 0.0, 0.0, 0.0]];
        let d = ModelDiagnostics::inspect(&pipeline(vec![0.0; 4]), &x, &[0, 1]).unwrap();
        assert!(d.coefficients_near_zero);
        assert_eq!(d.probability_spread(), 0.0);
        assert_eq!(d.training_accuracy, 0.5);
    }

    #[test]
    fn test_accuracy_and_range() {
        let x = array![[-2.0, 0.0, 0.0, 0.0], [2.0, 0.0, 0.0, 0.0], [3.0, 0.0, 0.0, 0.0]];
        let d = ModelDiagnostics::inspect(&pipeline(vec![1.0, 0.0, 0.0, 0.0]), &x, &[0, 1, 1])
            .unwrap();
        assert!(!d.coefficients_near_zero);
        assert_eq!(d.training_accuracy, 1.0);
        assert!(d.probability_min < 0.2 && d.probability_max > 0.9);
        assert_eq!((d.positives, d.negatives), (2, 1));
        assert_eq!(d.coefficients[0].0, "odds_ratio");
        assert_eq!(d.to_json()["classes"], serde_json::json!([0, 1]));
    }
}
