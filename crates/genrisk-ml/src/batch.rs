//! Batch training over the variant store.
//!
//! `BatchTrainer` assembles training rows per scope, fits, diagnoses and
//! saves a new model version. Training every disease never stops on one
//! disease's failure: insufficient data is a skip, anything else is recorded
//! as a failure, and the run continues.

use std::sync::Arc;
use std::time::Instant;

use genrisk_common::{Disease, DiseaseId, ModelScope, Result, RiskError};
use genrisk_db::{RawVariantRow, VariantStore};
use serde::Serialize;
use uuid::Uuid;

use crate::cache::ModelCache;
use crate::cleaner::{clean_training_rows, CleanedDataset};
use crate::diagnostics::ModelDiagnostics;
use crate::pipeline::ClassWeighting;
use crate::registry::{ModelMetadata, ModelRegistry};
use crate::trainer::DiseaseTrainer;

pub const PIPELINE_NAME: &str = "impute+scale+logreg";

/// One successful fit-and-save.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub scope: ModelScope,
    pub version_id: Uuid,
    pub training_rows: usize,
    pub diagnostics: ModelDiagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainedDisease {
    pub disease_id: DiseaseId,
    pub name: String,
    pub version_id: Uuid,
    pub training_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UntrainedDisease {
    pub disease_id: DiseaseId,
    pub name: String,
    pub reason: String,
}

/// Summary of a train-all run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchTrainingReport {
    pub run_id: Uuid,
    pub diseases_found: usize,
    pub trained: Vec<TrainedDisease>,
    /// Fewer than two label classes (or no linked variants).
    pub skipped: Vec<UntrainedDisease>,
    pub failed: Vec<UntrainedDisease>,
    pub duration_ms: u64,
}

impl BatchTrainingReport {
    fn new(diseases_found: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            diseases_found,
            trained: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            duration_ms: 0,
        }
    }
}

pub struct BatchTrainer {
    store: Arc<dyn VariantStore>,
    registry: ModelRegistry,
    trainer: DiseaseTrainer,
    cache: Option<Arc<ModelCache>>,
}

impl BatchTrainer {
    pub fn new(store: Arc<dyn VariantStore>, registry: ModelRegistry, trainer: DiseaseTrainer) -> Self {
        Self { store, registry, trainer, cache: None }
    }

    /// Refresh this cache's entry after each saved model.
    pub fn with_cache(mut self, cache: Arc<ModelCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cleaned rows for a scope: the disease's linked variants, or every variant.
    pub async fn assemble(&self, scope: ModelScope) -> Result<CleanedDataset> {
        let variants = match scope {
            ModelScope::Disease(id) => self.store.variants_for_disease(id).await?,
            ModelScope::Global => self.store.all_variants().await?,
        };
        if variants.is_empty() {
            return Err(RiskError::InsufficientData { scope, classes: 0, rows: 0 });
        }
        let rows: Vec<RawVariantRow> = variants.iter().map(RawVariantRow::from).collect();
        clean_training_rows(&rows)
    }

    /// Fit and save one scope.
    pub async fn train_scope(&self, scope: ModelScope) -> Result<TrainingOutcome> {
        let data = self.assemble(scope).await?;
        let fitted = self.trainer.fit_dataset(&data, scope)?;
        fitted.diagnostics.log(&scope.to_string());

        let kind = match scope {
            ModelScope::Global => "global",
            ModelScope::Disease(_) => "disease_specific",
        };
        let class_weight = match fitted.pipeline.class_weighting {
            ClassWeighting::Balanced => "balanced",
            ClassWeighting::Uniform => "none",
        };
        let notes = serde_json::json!({
            "type": kind,
            "pipeline": PIPELINE_NAME,
            "class_weight": class_weight,
            "converged": fitted.pipeline.converged,
            "n_iter": fitted.pipeline.n_iter,
            "cleaning": data.report.to_json(),
            "diagnostics": fitted.diagnostics.to_json(),
        });

        let metadata = ModelMetadata::new(scope, fitted.training_rows).with_notes(notes);
        let version_id = self.registry.save(&fitted.pipeline, metadata).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.refresh(scope).await {
                tracing::warn!(scope = %scope, error = %e, "Saved model but cache refresh failed");
            }
        }

        metrics::counter!("genrisk_models_trained_total").increment(1);
        Ok(TrainingOutcome {
            scope,
            version_id,
            training_rows: fitted.training_rows,
            diagnostics: fitted.diagnostics,
        })
    }

    pub async fn train_disease(&self, disease_id: DiseaseId) -> Result<TrainingOutcome> {
        self.train_scope(ModelScope::Disease(disease_id)).await
    }

    /// Fit on every variant regardless of disease.
    pub async fn train_global_model(&self) -> Result<TrainingOutcome> {
        self.train_scope(ModelScope::Global).await
    }

    /// Train every disease in the store. Only a failure to list diseases is an error.
    pub async fn train_all_diseases(&self) -> Result<BatchTrainingReport> {
        let start = Instant::now();
        let diseases: Vec<Disease> = self.store.list_diseases().await?;
        let mut report = BatchTrainingReport::new(diseases.len());

        tracing::info!(run_id = %report.run_id, diseases = diseases.len(), "Starting batch training");

        for disease in diseases {
            match self.train_disease(disease.disease_id).await {
                Ok(outcome) => {
                    tracing::info!(
                        disease = %disease.name,
                        version_id = %outcome.version_id,
                        rows = outcome.training_rows,
                        "Trained disease model"
                    );
                    report.trained.push(TrainedDisease {
                        disease_id: disease.disease_id,
                        name: disease.name,
                        version_id: outcome.version_id,
                        training_rows: outcome.training_rows,
                    });
                }
                Err(e) if e.is_insufficient_data() => {
                    tracing::info!(disease = %disease.name, reason = %e, "Skipping disease");
                    report.skipped.push(UntrainedDisease {
                        disease_id: disease.disease_id,
                        name: disease.name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(disease = %disease.name, error = %e, "Disease training failed");
                    report.failed.push(UntrainedDisease {
                        disease_id: disease.disease_id,
                        name: disease.name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            run_id = %report.run_id,
            trained = report.trained.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            duration_ms = report.duration_ms,
            "Batch training complete"
        );
        Ok(report)
    }
}
