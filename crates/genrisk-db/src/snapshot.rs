//! CSV snapshot loading for the relational tables.
//!
//! Reads `snp`, `disease` and `disease_snp` exports. Variant rows come back
//! raw; normalising them into `VariantRecord`s is the cleaner's job.

use std::path::Path;

use genrisk_common::{Disease, DiseaseVariantLink};
use serde::Deserialize;

use crate::error::Result;
use crate::schema::RawVariantRow;

/// Read a variant export. Missing columns deserialize as `None`.
pub fn read_raw_variants(path: impl AsRef<Path>) -> Result<Vec<RawVariantRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path.as_ref())?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: RawVariantRow = record?;
        rows.push(row);
    }
    tracing::debug!(path = %path.as_ref().display(), rows = rows.len(), "Read variant snapshot");
    Ok(rows)
}

pub fn read_diseases(path: impl AsRef<Path>) -> Result<Vec<Disease>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;
    let mut diseases = Vec::new();
    for record in reader.deserialize() {
        diseases.push(record?);
    }
    Ok(diseases)
}

#[derive(Debug, Deserialize)]
struct LinkRow {
    disease_id: i64,
    #[serde(alias = "variant_id")]
    snp_id: i64,
}

pub fn read_links(path: impl AsRef<Path>) -> Result<Vec<DiseaseVariantLink>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;
    let mut links = Vec::new();
    for record in reader.deserialize() {
        let row: LinkRow = record?;
        links.push(DiseaseVariantLink { disease_id: row.disease_id, variant_id: row.snp_id });
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_raw_variants_keep_messy_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            dir.path(),
            "snp.csv",
            "snp_id,rsid,chromosome,position,risk_allele,odds_ratio,risk_allele_freq,is_significant\n\
             1,rs1,chr7,123456,A,1.5,0.2,true\n\
             2,rs2,,NaN,G,abc,,false\n",
        );
        let rows = read_raw_variants(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].chromosome.as_deref(), Some("chr7"));
        assert_eq!(rows[1].chromosome, None);
        assert_eq!(rows[1].odds_ratio.as_deref(), Some("abc"));
        assert_eq!(rows[1].p_value, None);
    }

    #[test]
    fn test_missing_label_column_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "snp.csv", "snp_id,rsid,odds_ratio\n1,rs1,2.0\n");
        let rows = read_raw_variants(&path).unwrap();
        assert_eq!(rows[0].is_significant, None);
    }

    #[test]
    fn test_links_accept_either_column_name() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.csv", "disease_id,snp_id\n1,10\n");
        let b = write_file(dir.path(), "b.csv", "disease_id,variant_id\n2,20\n");
        assert_eq!(read_links(&a).unwrap(), vec![DiseaseVariantLink { disease_id: 1, variant_id: 10 }]);
        assert_eq!(read_links(&b).unwrap(), vec![DiseaseVariantLink { disease_id: 2, variant_id: 20 }]);

        let d = write_file(dir.path(), "d.csv", "disease_id,name,description\n1,Asthma,\n");
        let diseases = read_diseases(&d).unwrap();
        assert_eq!(diseases[0].name, "Asthma");
    }
}
