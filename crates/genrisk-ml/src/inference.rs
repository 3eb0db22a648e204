//! Inference engine: feature vector in, risk probability out.

use genrisk_common::{PredictionResult, Result, RiskError, FEATURE_DIM};

use crate::pipeline::ProbabilisticClassifier;

/// Label of the "significant" class.
pub const POSITIVE_CLASS: u8 = 1;

/// Pick the positive-class entry of a `predict_proba` row.
///
/// Looks the class up by identity in `classes`, so a model whose classes are
/// stored in either order scores the same. Falls back to the largest entry
/// when the positive class is absent.
pub fn positive_class_probability(classes: &[u8], row: &[f64]) -> f64 {
    let p = match classes.iter().position(|&c| c == POSITIVE_CLASS) {
        Some(idx) if idx < row.len() => row[idx],
        _ => row.iter().copied().fold(0.0, f64::max),
    };
    p.clamp(0.0, 1.0)
}

/// Probability that the patient's aggregated profile is positive.
pub fn score(model: &dyn ProbabilisticClassifier, features: &[f64]) -> Result<f64> {
    if features.len() != FEATURE_DIM {
        return Err(RiskError::Dimension { expected: FEATURE_DIM, actual: features.len() });
    }
    if model.n_features() != FEATURE_DIM {
        return Err(RiskError::Dimension { expected: FEATURE_DIM, actual: model.n_features() });
    }
    let row = model.predict_proba(features)?;
    Ok(positive_class_probability(model.classes(), &row))
}

/// [`score`] plus the High/Low label (`High` iff probability > 0.5).
pub fn predict(model: &dyn ProbabilisticClassifier, features: &[f64]) -> Result<PredictionResult> {
    let probability = score(model, features)?;
    Ok(PredictionResult::from_probability(probability))
}
