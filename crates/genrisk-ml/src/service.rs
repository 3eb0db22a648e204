//! Prediction request handling.
//!
//! Resolves the disease and its model, aggregates the patient's variants,
//! scores, then writes the raw-input log document and the prediction row.
//! The two writes are independent: if the second fails after the first
//! succeeded, the input log entry stays and the request fails with
//! [`RiskError::Persistence`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use genrisk_common::{
    Disease, DiseaseId, ModelScope, PatientVariantObservation, PredictionResult, Result, RiskError,
};
use genrisk_db::{
    GeneticInputDocument, ModelDocumentStore, PredictionRecord, PredictionStore, VariantStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregator::{Aggregation, PatientFeatureAggregator};
use crate::cache::ModelCache;
use crate::inference;

pub const INPUT_SOURCE: &str = "user_input";

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub patient_id: i64,
    pub disease_id: DiseaseId,
    pub observations: Vec<PatientVariantObservation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub patient_id: i64,
    pub disease_id: DiseaseId,
    pub disease_name: String,
    pub result: PredictionResult,
    pub model_id: Uuid,
    pub aggregation: Aggregation,
    pub input_log_id: Uuid,
    pub prediction_id: Uuid,
}

/// What a caller needs to know about the model currently served for a scope.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_id: Uuid,
    pub scope: ModelScope,
    pub trained_at: DateTime<Utc>,
    pub training_rows: usize,
}

pub struct PredictionService {
    variants: Arc<dyn VariantStore>,
    documents: Arc<dyn ModelDocumentStore>,
    predictions: Arc<dyn PredictionStore>,
    cache: Arc<ModelCache>,
    aggregator: PatientFeatureAggregator,
}

impl PredictionService {
    pub fn new(
        variants: Arc<dyn VariantStore>,
        documents: Arc<dyn ModelDocumentStore>,
        predictions: Arc<dyn PredictionStore>,
        cache: Arc<ModelCache>,
    ) -> Self {
        let aggregator = PatientFeatureAggregator::new(Arc::clone(&variants));
        Self { variants, documents, predictions, cache, aggregator }
    }

    async fn disease(&self, disease_id: DiseaseId) -> Result<Disease> {
        self.variants
            .find_disease(disease_id)
            .await?
            .ok_or_else(|| RiskError::NotFound(format!("disease_id={disease_id}")))
    }

    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse> {
        let disease = self.disease(request.disease_id).await?;
        let model = self.cache.resolve(ModelScope::Disease(disease.disease_id)).await?;

        let aggregation = self.aggregator.aggregate(disease.disease_id, &request.observations).await?;
        let result = inference::predict(&model.pipeline, aggregation.features.as_slice())?;

        let now = Utc::now();
        let input_log = GeneticInputDocument {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            upload_time: now,
            raw_snps: request
                .observations
                .iter()
                .map(|o| (o.rsid.clone(), o.allele.clone()))
                .collect::<BTreeMap<_, _>>(),
            derived_features: aggregation.features.to_named(),
            model_id: model.version_id,
            source: INPUT_SOURCE.to_string(),
        };
        self.documents.insert_genetic_input(&input_log).await?;

        let record = PredictionRecord {
            pred_id: Uuid::new_v4(),
            patient_id: request.patient_id,
            disease_id: disease.disease_id,
            probability: result.probability,
            risk_level: result.level,
            timestamp: now,
        };
        if let Err(e) = self.predictions.insert_prediction(&record).await {
            tracing::error!(
                patient_id = request.patient_id,
                input_log_id = %input_log.id,
                error = %e,
                "Prediction row write failed after input log was stored"
            );
            return Err(RiskError::Persistence(format!(
                "input log {} stored but prediction write failed: {e}",
                input_log.id
            )));
        }

        metrics::counter!("genrisk_predictions_total", "risk_level" => result.level.as_str())
            .increment(1);
        tracing::info!(
            patient_id = request.patient_id,
            disease = %disease.name,
            model_id = %model.version_id,
            probability = result.probability,
            risk_level = %result.level,
            matched = aggregation.matched,
            "Prediction recorded"
        );

        Ok(PredictionResponse {
            patient_id: request.patient_id,
            disease_id: disease.disease_id,
            disease_name: disease.name,
            result,
            model_id: model.version_id,
            aggregation,
            input_log_id: input_log.id,
            prediction_id: record.pred_id,
        })
    }

    /// Same as [`predict`](Self::predict), naming the disease instead of its id.
    pub async fn predict_by_name(
        &self,
        patient_id: i64,
        disease_name: &str,
        observations: Vec<PatientVariantObservation>,
    ) -> Result<PredictionResponse> {
        let disease = self
            .variants
            .find_disease_by_name(disease_name)
            .await?
            .ok_or_else(|| RiskError::NotFound(format!("disease {disease_name:?}")))?;
        self.predict(PredictionRequest { patient_id, disease_id: disease.disease_id, observations })
            .await
    }

    /// Model served for `scope`, loading it if needed.
    pub async fn model_info(&self, scope: ModelScope) -> Result<ModelInfo> {
        let model = self.cache.resolve(scope).await?;
        Ok(ModelInfo {
            model_id: model.version_id,
            scope,
            trained_at: model.metadata.created_at,
            training_rows: model.metadata.training_rows,
        })
    }

    pub async fn history(&self, patient_id: i64) -> Result<Vec<PredictionRecord>> {
        Ok(self.predictions.predictions_for_patient(patient_id).await?)
    }
}
