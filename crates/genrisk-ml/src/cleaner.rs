//! Feature cleaning.
//!
//! Turns raw, possibly malformed variant rows into the fixed four-column
//! numeric schema used by training and inference.
//!
//! # ARCHITECTURE
//!
//! | column           | default | bounds        |
//! |------------------|---------|---------------|
//! | odds_ratio       | 1.0     | [0.1, 20]     |
//! | risk_allele_freq | 0.3     | [0, 1]        |
//! | chromosome       | 1.0     | 1-22, X=23, Y=24 |
//! | position         | 1e7     | [1e5, 2.5e8]  |
//!
//! Cleaning never fails on a feature value: a missing or unparseable value
//! takes the column default and the substitution is counted in a
//! [`CleaningReport`] (and the `genrisk_cleaning_substitutions_total`
//! counter). The label is different: a training row without a usable
//! `is_significant` value is a schema error.
//!
//! Odds ratios are used on their raw scale; no log transform is applied.

use std::collections::BTreeMap;
use std::fmt;

use genrisk_common::features::{
    CHROMOSOME_RANGE, ODDS_RATIO_RANGE, POSITION_RANGE, RISK_ALLELE_FREQ_RANGE,
};
use genrisk_common::{FeatureVector, Result, RiskError, VariantRecord};
use genrisk_db::RawVariantRow;
use lazy_static::lazy_static;
use regex::Regex;

pub const DEFAULT_ODDS_RATIO: f64 = 1.0;
pub const DEFAULT_RISK_ALLELE_FREQ: f64 = 0.3;
pub const DEFAULT_CHROMOSOME: f64 = 1.0;
pub const DEFAULT_POSITION: f64 = 1e7;

lazy_static! {
    // A standalone chromosome token, optionally prefixed with "chr".
    // 23 and 24 are accepted as the already-normalised codes for X and Y.
    static ref CHROMOSOME_TOKEN: Regex =
        Regex::new(r"(?i)(?:^|[^0-9a-z])(?:chr)?(2[0-4]|1[0-9]|[1-9]|x|y)(?:$|[^0-9a-z])")
            .expect("chromosome regex is valid");
}

// ── Report ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CleanedField {
    OddsRatio,
    RiskAlleleFreq,
    Chromosome,
    Position,
    Label,
}

impl CleanedField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanedField::OddsRatio => "odds_ratio",
            CleanedField::RiskAlleleFreq => "risk_allele_freq",
            CleanedField::Chromosome => "chromosome",
            CleanedField::Position => "position",
            CleanedField::Label => "is_significant",
        }
    }
}

/// Why a raw value was not used as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Substitution {
    Missing,
    Unparseable,
    Clipped,
}

impl Substitution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Substitution::Missing => "missing",
            Substitution::Unparseable => "unparseable",
            Substitution::Clipped => "clipped",
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run tally of default substitutions and clips.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub rows: usize,
    counts: BTreeMap<(CleanedField, Substitution), usize>,
}

impl CleaningReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, field: CleanedField, kind: Substitution, raw: Option<&str>) {
        *self.counts.entry((field, kind)).or_insert(0) += 1;
        metrics::counter!(
            "genrisk_cleaning_substitutions_total",
            "field" => field.as_str(),
            "kind" => kind.as_str()
        )
        .increment(1);
        tracing::debug!(field = field.as_str(), kind = kind.as_str(), raw = ?raw, "Substituted value");
    }

    pub fn count(&self, field: CleanedField, kind: Substitution) -> usize {
        self.counts.get(&(field, kind)).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn merge(&mut self, other: &CleaningReport) {
        self.rows += other.rows;
        for (key, n) in &other.counts {
            *self.counts.entry(*key).or_insert(0) += n;
        }
    }

    /// Flat `{"field.kind": n}` view for model notes and logs.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("rows".into(), serde_json::json!(self.rows));
        for ((field, kind), n) in &self.counts {
            map.insert(format!("{}.{}", field.as_str(), kind.as_str()), serde_json::json!(n));
        }
        serde_json::Value::Object(map)
    }
}

// ── Scalar cleaning ──────────────────────────────────────────────────────────

fn parse_real(raw: Option<&str>) -> std::result::Result<f64, Substitution> {
    let text = match raw.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(Substitution::Missing),
    };
    match text.parse::<f64>() {
        // Infinities are real values and get clipped; only NaN is unreadable.
        Ok(v) if !v.is_nan() => Ok(v),
        _ => Err(Substitution::Unparseable),
    }
}

fn clean_bounded(
    field: CleanedField,
    raw: Option<&str>,
    default: f64,
    (lo, hi): (f64, f64),
    report: &mut CleaningReport,
) -> f64 {
    match parse_real(raw) {
        Ok(v) if v < lo || v > hi => {
            report.record(field, Substitution::Clipped, raw);
            v.clamp(lo, hi)
        }
        Ok(v) => v,
        Err(kind) => {
            report.record(field, kind, raw);
            default
        }
    }
}

pub fn clean_odds_ratio(raw: Option<&str>, report: &mut CleaningReport) -> f64 {
    clean_bounded(CleanedField::OddsRatio, raw, DEFAULT_ODDS_RATIO, ODDS_RATIO_RANGE, report)
}

pub fn clean_risk_allele_freq(raw: Option<&str>, report: &mut CleaningReport) -> f64 {
    clean_bounded(
        CleanedField::RiskAlleleFreq,
        raw,
        DEFAULT_RISK_ALLELE_FREQ,
        RISK_ALLELE_FREQ_RANGE,
        report,
    )
}

pub fn clean_position(raw: Option<&str>, report: &mut CleaningReport) -> f64 {
    clean_bounded(CleanedField::Position, raw, DEFAULT_POSITION, POSITION_RANGE, report)
}

/// Extract a chromosome number from free text: "7", "chr7", "X", "chrY".
pub fn parse_chromosome(raw: &str) -> Option<f64> {
    let caps = CHROMOSOME_TOKEN.captures(raw.trim())?;
    let token = caps.get(1)?.as_str();
    match token.to_ascii_uppercase().as_str() {
        "X" => Some(23.0),
        "Y" => Some(24.0),
        digits => digits.parse::<f64>().ok(),
    }
}

pub fn clean_chromosome(raw: Option<&str>, report: &mut CleaningReport) -> f64 {
    let text = match raw.map(str::trim) {
        Some(t) if !t.is_empty() => t,
        _ => {
            report.record(CleanedField::Chromosome, Substitution::Missing, raw);
            return DEFAULT_CHROMOSOME;
        }
    };
    match parse_chromosome(text) {
        Some(v) if v >= CHROMOSOME_RANGE.0 && v <= CHROMOSOME_RANGE.1 => v,
        _ => {
            report.record(CleanedField::Chromosome, Substitution::Unparseable, raw);
            DEFAULT_CHROMOSOME
        }
    }
}

/// Significance flag as a 0/1 label. `None` when absent or unreadable.
pub fn clean_label(raw: Option<&str>) -> Option<u8> {
    let text = raw.map(str::trim).filter(|t| !t.is_empty())?;
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(1),
        "false" | "f" | "no" | "n" => Some(0),
        other => other
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| u8::from(v != 0.0)),
    }
}

// ── Rows ─────────────────────────────────────────────────────────────────────

/// Clean one row into the feature schema.
pub fn clean_row(row: &RawVariantRow, report: &mut CleaningReport) -> FeatureVector {
    report.rows += 1;
    FeatureVector::new(
        clean_odds_ratio(row.odds_ratio.as_deref(), report),
        clean_risk_allele_freq(row.risk_allele_freq.as_deref(), report),
        clean_chromosome(row.chromosome.as_deref(), report),
        clean_position(row.position.as_deref(), report),
    )
}

/// Features plus labels, ready for the trainer.
#[derive(Debug, Clone, Default)]
pub struct CleanedDataset {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<u8>,
    pub report: CleaningReport,
}

impl CleanedDataset {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of distinct label values present.
    pub fn distinct_labels(&self) -> usize {
        let mut seen = [false; 2];
        for &l in &self.labels {
            seen[usize::from(l.min(1))] = true;
        }
        seen.iter().filter(|s| **s).count()
    }
}

/// Clean a batch of labelled rows. Fails if any row lacks a usable label.
pub fn clean_training_rows(rows: &[RawVariantRow]) -> Result<CleanedDataset> {
    let mut out = CleanedDataset {
        features: Vec::with_capacity(rows.len()),
        labels: Vec::with_capacity(rows.len()),
        report: CleaningReport::new(),
    };
    let mut unlabeled = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        match clean_label(row.is_significant.as_deref()) {
            Some(label) => {
                out.features.push(clean_row(row, &mut out.report));
                out.labels.push(label);
            }
            None => unlabeled.push(row.rsid.clone().unwrap_or_else(|| format!("row {i}"))),
        }
    }

    if !unlabeled.is_empty() {
        out.report
            .record(CleanedField::Label, Substitution::Missing, None);
        return Err(RiskError::Schema(format!(
            "{} row(s) without a usable is_significant value (first: {})",
            unlabeled.len(),
            unlabeled[0]
        )));
    }

    if !out.report.is_clean() {
        tracing::debug!(
            rows = out.report.rows,
            substitutions = out.report.total(),
            "Cleaned training rows with substitutions"
        );
    }
    Ok(out)
}

/// Normalise a snapshot row into a stored variant record.
///
/// Rows without a numeric id or an rsid cannot be keyed and are dropped
/// (`None`). Feature columns are cleaned with the same rules as training.
pub fn normalise_record(row: &RawVariantRow, report: &mut CleaningReport) -> Option<VariantRecord> {
    let variant_id = row.snp_id.as_deref()?.trim().parse::<i64>().ok()?;
    let rsid = row.rsid.as_deref().map(str::trim).filter(|r| !r.is_empty())?;

    let features = clean_row(row, report);
    Some(VariantRecord {
        variant_id,
        rsid: rsid.to_string(),
        gene_id: row.gene_id.as_deref().and_then(|g| g.trim().parse().ok()),
        chromosome: features.chromosome() as u8,
        position: features.position() as u64,
        risk_allele: row
            .risk_allele
            .as_deref()
            .and_then(|a| a.trim().chars().next())
            .map(|c| c.to_ascii_uppercase()),
        odds_ratio: features.odds_ratio(),
        risk_allele_freq: features.risk_allele_freq(),
        p_value: parse_real(row.p_value.as_deref()).ok(),
        is_significant: clean_label(row.is_significant.as_deref()) == Some(1),
    })
}
