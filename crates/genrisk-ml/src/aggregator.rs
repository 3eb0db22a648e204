//! Patient feature aggregation.
//!
//! Collapses a patient's reported variants into one feature vector for a
//! disease. Only observations whose rsid is known *and* linked to the
//! disease contribute; each contributes its stored feature values, weighted
//! by `max(1, |odds_ratio - 1|)`.

use std::sync::Arc;

use genrisk_common::{
    DiseaseId, FeatureVector, PatientVariantObservation, Result, VariantRecord, FEATURE_DIM,
};
use genrisk_db::VariantStore;
use serde::Serialize;

/// Aggregated features plus counts describing how they were derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub features: FeatureVector,
    /// Observations submitted.
    pub submitted: usize,
    /// Observations that matched a variant linked to the disease.
    pub matched: usize,
    /// Matched observations whose allele is the variant's risk allele.
    pub risk_allele_matches: usize,
    /// Observations dropped because their rsid is unknown.
    pub unknown: usize,
    /// Observations dropped because the variant is not linked to the disease.
    pub unlinked: usize,
}

impl Aggregation {
    pub fn is_neutral(&self) -> bool {
        self.matched == 0
    }
}

/// Weight given to a variant by its effect size.
pub fn variant_weight(odds_ratio: f64) -> f64 {
    (odds_ratio - 1.0).abs().max(1.0)
}

/// Weighted mean of the variants' features.
///
/// Empty input gives [`FeatureVector::NEUTRAL`]. A non-positive or
/// non-finite total weight falls back to uniform weights.
pub fn weighted_summary(variants: &[&VariantRecord]) -> FeatureVector {
    if variants.is_empty() {
        return FeatureVector::NEUTRAL;
    }

    let mut weights: Vec<f64> = variants.iter().map(|v| variant_weight(v.odds_ratio)).collect();
    let mut total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        weights = vec![1.0; variants.len()];
        total = variants.len() as f64;
    }

    let mut acc = [0.0; FEATURE_DIM];
    for (v, w) in variants.iter().zip(&weights) {
        let row = [v.odds_ratio, v.risk_allele_freq, f64::from(v.chromosome), v.position as f64];
        for (a, x) in acc.iter_mut().zip(row) {
            *a += w * x;
        }
    }
    FeatureVector::from(acc.map(|a| a / total))
}

pub struct PatientFeatureAggregator {
    store: Arc<dyn VariantStore>,
}

impl PatientFeatureAggregator {
    pub fn new(store: Arc<dyn VariantStore>) -> Self {
        Self { store }
    }

    /// Build the feature vector for `disease_id` from a patient's observations.
    ///
    /// Never fails on patient input: unknown or unlinked rsids are dropped,
    /// and nothing surviving yields the neutral vector. Errors come only from
    /// the store.
    pub async fn aggregate(
        &self,
        disease_id: DiseaseId,
        observations: &[PatientVariantObservation],
    ) -> Result<Aggregation> {
        let linked = self.store.linked_variant_ids(disease_id).await?;

        let mut kept: Vec<VariantRecord> = Vec::new();
        let mut unknown = 0usize;
        let mut unlinked = 0usize;
        let mut risk_allele_matches = 0usize;

        for obs in observations {
            let Some(variant) = self.store.find_variant_by_rsid(&obs.rsid).await? else {
                unknown += 1;
                continue;
            };
            if !linked.contains(&variant.variant_id) {
                unlinked += 1;
                continue;
            }
            if variant.is_risk_allele(&obs.allele) {
                risk_allele_matches += 1;
            }
            kept.push(variant);
        }

        let refs: Vec<&VariantRecord> = kept.iter().collect();
        let features = weighted_summary(&refs);

        tracing::debug!(
            disease_id,
            submitted = observations.len(),
            matched = kept.len(),
            unknown,
            unlinked,
            "Aggregated patient variants"
        );

        Ok(Aggregation {
            features,
            submitted: observations.len(),
            matched: kept.len(),
            risk_allele_matches,
            unknown,
            unlinked,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genrisk_common::{Disease, DiseaseVariantLink};
    use genrisk_db::InMemoryVariantStore;
    use pretty_assertions::assert_eq;

    fn variant(id: i64, rsid: &str, or: f64, chrom: u8, pos: u64) -> VariantRecord {
        VariantRecord {
            variant_id: id,
            rsid: rsid.to_string(),
            gene_id: None,
            chromosome: chrom,
            position: pos,
            risk_allele: Some('A'),
            odds_ratio: or,
            risk_allele_freq: 0.2,
            p_value: None,
            is_significant: true,
        }
    }

    async fn aggregator(variants: Vec<VariantRecord>, linked: &[i64]) -> PatientFeatureAggregator {
        let links = linked
            .iter()
            .map(|&variant_id| DiseaseVariantLink { disease_id: 1, variant_id })
            .collect();
        let store = InMemoryVariantStore::from_parts(
            variants,
            vec![Disease { disease_id: 1, name: "Asthma".into(), description: String::new() }],
            links,
        )
        .await
        .unwrap();
        PatientFeatureAggregator::new(Arc::new(store))
    }

    #[test]
    fn test_weights() {
        assert_eq!(variant_weight(1.0), 1.0);
        assert_eq!(variant_weight(1.5), 1.0);
        assert_eq!(variant_weight(3.0), 2.0);
        assert_eq!(variant_weight(0.1), 1.0);
    }

    #[test]
    fn test_single_variant_is_identity() {
        let v = variant(1, "rs1", 2.0, 5, 1_000_000);
        assert_eq!(weighted_summary(&[&v]).as_array(), [2.0, 0.2, 5.0, 1_000_000.0]);
    }

    #[test]
    fn test_equal_weights_give_plain_mean() {
        let a = variant(1, "rs1", 1.0, 2, 2_000_000);
        let b = variant(2, "rs2", 1.0, 4, 4_000_000);
        assert_eq!(weighted_summary(&[&a, &b]).as_array(), [1.0, 0.2, 3.0, 3_000_000.0]);
    }

    #[test]
    fn test_non_finite_weights_fall_back_to_uniform() {
        let a = variant(1, "rs1", f64::INFINITY, 2, 2_000_000);
        let b = variant(2, "rs2", 1.0, 4, 4_000_000);
        let fv = weighted_summary(&[&a, &b]);
        assert_eq!(fv.chromosome(), 3.0);
        assert_eq!(fv.position(), 3_000_000.0);
    }

    #[tokio::test]
    async fn test_unlinked_and_unknown_are_dropped() {
        let agg = aggregator(
            vec![variant(1, "rs1", 1.5, 1, 1_000_000), variant(2, "rs2", 3.0, 3, 3_000_000)],
            &[1],
        )
        .await;
        let obs = vec![
            PatientVariantObservation::new("rs1", "a"),
            PatientVariantObservation::new("rs2", "A"),
            PatientVariantObservation::new("rs999", "G"),
        ];
        let out = agg.aggregate(1, &obs).await.unwrap();
        assert_eq!(out.features.as_array(), [1.5, 0.2, 1.0, 1_000_000.0]);
        assert_eq!((out.submitted, out.matched, out.unknown, out.unlinked), (3, 1, 1, 1));
        assert_eq!(out.risk_allele_matches, 1);
    }

    #[tokio::test]
    async fn test_nothing_surviving_is_neutral() {
        let agg = aggregator(vec![variant(1, "rs1", 1.5, 1, 1_000_000)], &[]).await;
        let out = agg.aggregate(1, &[PatientVariantObservation::new("rs1", "A")]).await.unwrap();
        assert_eq!(out.features, FeatureVector::NEUTRAL);
        assert!(out.is_neutral());

        let out = agg.aggregate(1, &[]).await.unwrap();
        assert_eq!(out.features, FeatureVector::NEUTRAL);
    }

    #[tokio::test]
    async fn test_weighted_mean_over_linked_variants() {
        let agg = aggregator(
            vec![variant(1, "rs1", 1.5, 2, 1_000_000), variant(2, "rs2", 3.0, 8, 4_000_000)],
            &[1, 2],
        )
        .await;
        let obs = vec![
            PatientVariantObservation::new("rs1", "A"),
            PatientVariantObservation::new("rs2", "A"),
        ];
        let out = agg.aggregate(1, &obs).await.unwrap();
        // weights 1 and 2
        assert_eq!(out.features.odds_ratio(), 2.5);
        assert_eq!(out.features.chromosome(), 6.0);
        assert_eq!(out.features.position(), 3_000_000.0);
    }
}
