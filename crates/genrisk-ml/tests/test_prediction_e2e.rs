//! End-to-end prediction requests against in-memory stores.
//!
//! Run with: cargo test --package genrisk-ml --test test_prediction_e2e

use std::sync::Arc;

use async_trait::async_trait;
use genrisk_common::{ModelScope, PatientVariantObservation, RiskError, RiskLevel};
use genrisk_db::{
    DbError, InMemoryDocumentStore, InMemoryPredictionStore, ModelDocumentStore,
    PredictionRecord, PredictionStore,
};
use genrisk_ml::{
    ClassWeighting, ModelCache, ModelMetadata, ModelRegistry, PredictionRequest,
    PredictionService, TrainedPipeline,
};
use genrisk_test_utils::{disease, links_for, seeded_store, variant};
use pretty_assertions::assert_eq;

/// p = sigmoid(odds_ratio - 1)
fn odds_ratio_model() -> TrainedPipeline {
    TrainedPipeline {
        medians: vec![1.0, 0.3, 1.0, 1e7],
        means: vec![1.0, 0.0, 0.0, 0.0],
        scales: vec![1.0; 4],
        coefficients: vec![1.0, 0.0, 0.0, 0.0],
        intercept: 0.0,
        classes: vec![0, 1],
        class_weighting: ClassWeighting::Uniform,
        n_iter: 0,
        converged: true,
    }
}

struct Fixture {
    service: PredictionService,
    documents: Arc<InMemoryDocumentStore>,
    registry: ModelRegistry,
}

async fn build(predictions: Arc<dyn PredictionStore>) -> Fixture {
    let linked = vec![
        variant(1, "rs1").odds_ratio(1.5).chromosome(2).position(1_000_000).risk_allele('A').build(),
        variant(2, "rs2").odds_ratio(3.0).chromosome(8).position(4_000_000).risk_allele('G').build(),
    ];
    let unlinked = variant(3, "rs3").odds_ratio(15.0).build();
    let links = links_for(1, &linked);
    let mut variants = linked;
    variants.push(unlinked);

    let store = Arc::new(
        seeded_store(variants, vec![disease(1, "Type 2 Diabetes"), disease(2, "Asthma")], links).await,
    );
    let documents = Arc::new(InMemoryDocumentStore::new());
    let registry = ModelRegistry::new(documents.clone());
    registry
        .save(&odds_ratio_model(), ModelMetadata::new(ModelScope::Disease(1), 2))
        .await
        .unwrap();

    let cache = Arc::new(ModelCache::new(Arc::new(registry.clone())));
    let service = PredictionService::new(store, documents.clone(), predictions, cache);
    Fixture { service, documents, registry }
}

async fn fixture() -> (Fixture, Arc<InMemoryPredictionStore>) {
    let predictions = Arc::new(InMemoryPredictionStore::new());
    (build(predictions.clone()).await, predictions)
}

fn request(disease_id: i64, snps: &[(&str, &str)]) -> PredictionRequest {
    PredictionRequest {
        patient_id: 77,
        disease_id,
        observations: snps.iter().map(|(r, a)| PatientVariantObservation::new(*r, *a)).collect(),
    }
}

#[tokio::test]
async fn test_prediction_writes_log_and_row() {
    let (f, predictions) = fixture().await;
    let resp = f
        .service
        .predict(request(1, &[("rs1", "A"), ("rs2", "G"), ("rs3", "T"), ("rs404", "C")]))
        .await
        .unwrap();

    // weights 1 and 2 → odds ratio (1.5 + 6.0) / 3
    assert_eq!(resp.aggregation.features.odds_ratio(), 2.5);
    assert_eq!(resp.aggregation.matched, 2);
    assert_eq!(resp.aggregation.risk_allele_matches, 2);
    assert_eq!(resp.result.level, RiskLevel::High);
    assert!((resp.result.probability - 1.0 / (1.0 + (-1.5f64).exp())).abs() < 1e-12);

    let rows = predictions.predictions_for_patient(77).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].risk_level, RiskLevel::High);
    assert_eq!(rows[0].disease_id, 1);

    let logs = f.documents.find_genetic_inputs(77).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].model_id, resp.model_id);
    assert_eq!(logs[0].source, "user_input");
    assert_eq!(logs[0].raw_snps.len(), 4);
    assert_eq!(logs[0].derived_features["odds_ratio"], 2.5);
}

#[tokio::test]
async fn test_no_surviving_variants_scores_neutral_vector() {
    let (f, _) = fixture().await;
    let resp = f.service.predict(request(1, &[("rs3", "T")])).await.unwrap();
    assert!(resp.aggregation.is_neutral());
    // neutral odds ratio 1.0 → z = 0 → p = 0.5 → Low
    assert_eq!(resp.result.probability, 0.5);
    assert_eq!(resp.result.level, RiskLevel::Low);
}

#[tokio::test]
async fn test_unknown_disease_and_missing_model_write_nothing() {
    let (f, predictions) = fixture().await;

    let err = f.service.predict(request(99, &[("rs1", "A")])).await.unwrap_err();
    assert!(err.is_unavailable());

    let err = f.service.predict(request(2, &[("rs1", "A")])).await.unwrap_err();
    assert!(matches!(err, RiskError::NotFound(_)));

    assert_eq!(predictions.count().await, 0);
    assert!(f.documents.find_genetic_inputs(77).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_predict_by_name_and_model_info() {
    let (f, _) = fixture().await;
    let resp = f
        .service
        .predict_by_name(5, "type 2 diabetes", vec![PatientVariantObservation::new("rs1", "a")])
        .await
        .unwrap();
    assert_eq!(resp.disease_id, 1);
    assert_eq!(resp.disease_name, "Type 2 Diabetes");

    let info = f.service.model_info(ModelScope::Disease(1)).await.unwrap();
    assert_eq!(info.model_id, resp.model_id);
    let latest = f.registry.load_latest(ModelScope::Disease(1)).await.unwrap();
    assert_eq!(info.trained_at, latest.metadata.created_at);

    assert_eq!(f.service.history(5).await.unwrap().len(), 1);
}

struct FailingPredictionStore;

#[async_trait]
impl PredictionStore for FailingPredictionStore {
    async fn insert_prediction(&self, _record: &PredictionRecord) -> genrisk_db::Result<()> {
        Err(DbError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
    }

    async fn predictions_for_patient(&self, _patient_id: i64) -> genrisk_db::Result<Vec<PredictionRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_partial_write_is_reported_and_log_kept() {
    let f = build(Arc::new(FailingPredictionStore)).await;
    let err = f.service.predict(request(1, &[("rs1", "A")])).await.unwrap_err();
    assert!(matches!(err, RiskError::Persistence(_)));
    assert_eq!(f.documents.find_genetic_inputs(77).await.unwrap().len(), 1);
}
