//! Shared test fixtures for the genrisk workspace.

use genrisk_common::{Disease, DiseaseId, DiseaseVariantLink, VariantId, VariantRecord};
use genrisk_db::InMemoryVariantStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fluent builder for [`VariantRecord`] with clean, in-bounds defaults.
#[derive(Debug, Clone)]
pub struct VariantBuilder {
    record: VariantRecord,
}

pub fn variant(id: VariantId, rsid: &str) -> VariantBuilder {
    VariantBuilder {
        record: VariantRecord {
            variant_id: id,
            rsid: rsid.to_string(),
            gene_id: None,
            chromosome: 1,
            position: 10_000_000,
            risk_allele: Some('A'),
            odds_ratio: 1.0,
            risk_allele_freq: 0.3,
            p_value: None,
            is_significant: false,
        },
    }
}

impl VariantBuilder {
    pub fn odds_ratio(mut self, v: f64) -> Self {
        self.record.odds_ratio = v;
        self
    }

    pub fn freq(mut self, v: f64) -> Self {
        self.record.risk_allele_freq = v;
        self
    }

    pub fn chromosome(mut self, v: u8) -> Self {
        self.record.chromosome = v;
        self
    }

    pub fn position(mut self, v: u64) -> Self {
        self.record.position = v;
        self
    }

    pub fn risk_allele(mut self, allele: char) -> Self {
        self.record.risk_allele = Some(allele);
        self
    }

    pub fn significant(mut self, yes: bool) -> Self {
        self.record.is_significant = yes;
        self
    }

    pub fn build(self) -> VariantRecord {
        self.record
    }
}

pub fn disease(id: DiseaseId, name: &str) -> Disease {
    Disease { disease_id: id, name: name.to_string(), description: String::new() }
}

/// Links from one disease to every given variant.
pub fn links_for(disease_id: DiseaseId, variants: &[VariantRecord]) -> Vec<DiseaseVariantLink> {
    variants
        .iter()
        .map(|v| DiseaseVariantLink { disease_id, variant_id: v.variant_id })
        .collect()
}

/// In-memory store populated from fixtures. Panics on inconsistent fixtures.
pub async fn seeded_store(
    variants: Vec<VariantRecord>,
    diseases: Vec<Disease>,
    links: Vec<DiseaseVariantLink>,
) -> InMemoryVariantStore {
    InMemoryVariantStore::from_parts(variants, diseases, links)
        .await
        .expect("fixture tables are consistent")
}

/// Deterministic variants whose significance follows the odds ratio.
///
/// Odds ratios are drawn from [0.5, 3.0); a variant is significant when its
/// odds ratio exceeds 1.5. The first two rows are pinned to one of each
/// class so any `count >= 2` yields both labels.
pub fn synthetic_variants(count: usize, first_id: VariantId, seed: u64) -> Vec<VariantRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let odds_ratio = match i {
                0 => 0.8,
                1 => 2.4,
                _ => rng.gen_range(0.5..3.0),
            };
            let id = first_id + i as VariantId;
            variant(id, &format!("rs{}", 100_000 + id))
                .odds_ratio(odds_ratio)
                .freq(rng.gen_range(0.05..0.95))
                .chromosome(rng.gen_range(1..=22))
                .position(rng.gen_range(1_000_000..200_000_000))
                .significant(odds_ratio > 1.5)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_variants_are_deterministic_and_mixed() {
        let a = synthetic_variants(30, 1, 42);
        let b = synthetic_variants(30, 1, 42);
        assert_eq!(a, b);
        assert!(a.iter().any(|v| v.is_significant));
        assert!(a.iter().any(|v| !v.is_significant));
        assert_eq!(a[29].variant_id, 30);
    }
}
