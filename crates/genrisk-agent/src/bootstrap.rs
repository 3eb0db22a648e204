//! Startup wiring: snapshot tables into the in-memory variant store.

use anyhow::Context;
use genrisk_db::{snapshot, InMemoryVariantStore};
use genrisk_ml::cleaner::{normalise_record, CleaningReport};
use tracing::{info, warn};

use crate::config::StorageConfig;

/// Load the three CSV exports, normalising variant rows through the cleaner.
///
/// Rows without an id or rsid are dropped with a warning; links to dropped
/// variants are skipped by the store.
pub async fn load_variant_store(storage: &StorageConfig) -> anyhow::Result<InMemoryVariantStore> {
    let raw = snapshot::read_raw_variants(&storage.variants_csv)
        .with_context(|| format!("reading variants from {}", storage.variants_csv))?;
    let diseases = snapshot::read_diseases(&storage.diseases_csv)
        .with_context(|| format!("reading diseases from {}", storage.diseases_csv))?;
    let links = snapshot::read_links(&storage.links_csv)
        .with_context(|| format!("reading links from {}", storage.links_csv))?;

    let mut report = CleaningReport::new();
    let variants: Vec<_> = raw.iter().filter_map(|row| normalise_record(row, &mut report)).collect();
    let dropped = raw.len() - variants.len();
    if dropped > 0 {
        warn!("Dropped {} variant rows without an id or rsid", dropped);
    }
    info!(
        "Snapshot loaded: {} variants ({} substitutions), {} diseases, {} links",
        variants.len(),
        report.total(),
        diseases.len(),
        links.len()
    );

    let store = InMemoryVariantStore::from_parts(variants, diseases, links).await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use genrisk_db::VariantStore;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_snapshot_is_cleaned_and_linked() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name).display().to_string();
        std::fs::write(
            path("snp.csv"),
            "snp_id,rsid,chromosome,position,risk_allele,odds_ratio,risk_allele_freq,is_significant\n\
             1,rs1,chrX,50,A,1.5,0.2,true\n\
             2,rs2,7,2000000,G,bad,,false\n\
             ,rs3,1,2000000,T,2.0,0.1,true\n",
        )
        .unwrap();
        std::fs::write(path("disease.csv"), "disease_id,name,description\n1,Asthma,\n").unwrap();
        std::fs::write(path("disease_snp.csv"), "disease_id,snp_id\n1,1\n1,2\n1,3\n").unwrap();

        let storage = StorageConfig {
            variants_csv: path("snp.csv"),
            diseases_csv: path("disease.csv"),
            links_csv: path("disease_snp.csv"),
            registry_dir: path("registry"),
        };
        let store = load_variant_store(&storage).await.unwrap();

        let rows = store.variants_for_disease(1).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chromosome, 23);
        assert_eq!(rows[0].position, 100_000);
        assert_eq!(rows[1].odds_ratio, 1.0);
        assert_eq!(rows[1].risk_allele_freq, 0.3);
        assert!(!rows[1].is_significant);
    }
}
