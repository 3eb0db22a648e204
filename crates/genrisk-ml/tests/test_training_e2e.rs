//! End-to-end training: store → cleaner → trainer → registry → cache.
//!
//! Run with: cargo test --package genrisk-ml --test test_training_e2e

use std::sync::Arc;

use async_trait::async_trait;
use genrisk_common::{ModelScope, RiskError};
use genrisk_db::{
    DbError, GeneticInputDocument, InMemoryDocumentStore, ModelDocument, ModelDocumentStore,
    ModelSummary,
};
use uuid::Uuid;
use genrisk_ml::{BatchTrainer, DiseaseTrainer, ModelCache, ModelRegistry, TrainerConfig};
use genrisk_test_utils::{disease, links_for, seeded_store, synthetic_variants, variant};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_train_all_skips_single_class_and_unlinked_diseases() {
    let mixed = synthetic_variants(30, 1, 7);
    let all_negative: Vec<_> = (100..110)
        .map(|id| variant(id, &format!("rs{id}")).odds_ratio(1.1).significant(false).build())
        .collect();

    let mut variants = mixed.clone();
    variants.extend(all_negative.clone());
    let mut links = links_for(1, &mixed);
    links.extend(links_for(2, &all_negative));

    let store = seeded_store(
        variants,
        vec![disease(1, "Type 2 Diabetes"), disease(2, "Asthma"), disease(3, "Gout")],
        links,
    )
    .await;

    let documents = Arc::new(InMemoryDocumentStore::new());
    let registry = ModelRegistry::new(documents.clone());
    let batch = BatchTrainer::new(Arc::new(store), registry.clone(), DiseaseTrainer::default());

    let report = batch.train_all_diseases().await.unwrap();
    assert_eq!(report.diseases_found, 3);
    assert_eq!(report.trained.len(), 1);
    assert_eq!(report.trained[0].disease_id, 1);
    assert_eq!(report.trained[0].training_rows, 30);
    assert_eq!(
        report.skipped.iter().map(|s| s.disease_id).collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert!(report.failed.is_empty());

    let loaded = registry.load_latest(ModelScope::Disease(1)).await.unwrap();
    assert_eq!(loaded.version_id, report.trained[0].version_id);
    assert_eq!(loaded.metadata.notes["type"], "disease_specific");
    assert_eq!(loaded.metadata.notes["pipeline"], "impute+scale+logreg");

    let err = registry.load_latest(ModelScope::Disease(2)).await.unwrap_err();
    assert!(matches!(err, RiskError::NotFound(_)));
}

#[tokio::test]
async fn test_trained_model_ranks_higher_odds_ratio_higher() {
    let variants = synthetic_variants(60, 1, 11);
    let links = links_for(1, &variants);
    let store = seeded_store(variants, vec![disease(1, "Coronary Artery Disease")], links).await;

    let registry = ModelRegistry::new(Arc::new(InMemoryDocumentStore::new()));
    let batch = BatchTrainer::new(Arc::new(store), registry.clone(), DiseaseTrainer::default());
    let outcome = batch.train_disease(1).await.unwrap();
    assert!(outcome.diagnostics.training_accuracy > 0.8);
    assert!(!outcome.diagnostics.coefficients_near_zero);

    let model = registry.load_version(outcome.version_id).await.unwrap();
    let high = genrisk_ml::inference::score(&model.pipeline, &[2.8, 0.5, 8.0, 5e7]).unwrap();
    let low = genrisk_ml::inference::score(&model.pipeline, &[0.6, 0.5, 8.0, 5e7]).unwrap();
    assert!(high > 0.5, "high={high}");
    assert!(low < 0.5, "low={low}");
}

#[tokio::test]
async fn test_global_model_uses_every_variant() {
    let variants = synthetic_variants(25, 1, 3);
    let store = seeded_store(variants, vec![], vec![]).await;
    let registry = ModelRegistry::new(Arc::new(InMemoryDocumentStore::new()));
    let batch = BatchTrainer::new(Arc::new(store), registry.clone(), DiseaseTrainer::default());

    let outcome = batch.train_global_model().await.unwrap();
    assert_eq!(outcome.scope, ModelScope::Global);
    assert_eq!(outcome.training_rows, 25);
    let loaded = registry.load_latest(ModelScope::Global).await.unwrap();
    assert_eq!(loaded.metadata.notes["type"], "global");
}

#[tokio::test]
async fn test_retraining_appends_and_refreshes_cache() {
    let variants = synthetic_variants(20, 1, 5);
    let links = links_for(4, &variants);
    let store = seeded_store(variants, vec![disease(4, "Psoriasis")], links).await;

    let documents = Arc::new(InMemoryDocumentStore::new());
    let registry = ModelRegistry::new(documents.clone());
    let cache = Arc::new(ModelCache::new(Arc::new(registry.clone())));
    let batch = BatchTrainer::new(Arc::new(store), registry.clone(), DiseaseTrainer::default())
        .with_cache(cache.clone());

    let first = batch.train_disease(4).await.unwrap();
    assert_eq!(cache.resolve(ModelScope::Disease(4)).await.unwrap().version_id, first.version_id);

    let second = batch.train_disease(4).await.unwrap();
    assert_ne!(first.version_id, second.version_id);
    assert_eq!(cache.resolve(ModelScope::Disease(4)).await.unwrap().version_id, second.version_id);

    let versions = documents.list_models(ModelScope::Disease(4)).await.unwrap();
    assert_eq!(versions.len(), 2);
}

#[tokio::test]
async fn test_iteration_cap_still_saves_a_model() {
    let variants = synthetic_variants(20, 1, 9);
    let links = links_for(1, &variants);
    let store = seeded_store(variants, vec![disease(1, "Lupus")], links).await;
    let registry = ModelRegistry::new(Arc::new(InMemoryDocumentStore::new()));
    let trainer = DiseaseTrainer::new(TrainerConfig { max_iter: 1, ..Default::default() });
    let batch = BatchTrainer::new(Arc::new(store), registry.clone(), trainer);

    let outcome = batch.train_disease(1).await.unwrap();
    let model = registry.load_version(outcome.version_id).await.unwrap();
    assert!(model.pipeline.n_iter <= 1);
}

/// Document store that refuses to save models for one scope.
struct RejectingDocumentStore {
    inner: InMemoryDocumentStore,
    rejected: ModelScope,
}

#[async_trait]
impl ModelDocumentStore for RejectingDocumentStore {
    async fn insert_model(&self, doc: &ModelDocument) -> genrisk_db::Result<()> {
        if doc.scope == self.rejected {
            return Err(DbError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")));
        }
        self.inner.insert_model(doc).await
    }

    async fn find_latest_model(&self, scope: ModelScope) -> genrisk_db::Result<Option<ModelDocument>> {
        self.inner.find_latest_model(scope).await
    }

    async fn find_model(&self, id: Uuid) -> genrisk_db::Result<Option<ModelDocument>> {
        self.inner.find_model(id).await
    }

    async fn list_models(&self, scope: ModelScope) -> genrisk_db::Result<Vec<ModelSummary>> {
        self.inner.list_models(scope).await
    }

    async fn insert_genetic_input(&self, doc: &GeneticInputDocument) -> genrisk_db::Result<()> {
        self.inner.insert_genetic_input(doc).await
    }

    async fn find_genetic_inputs(&self, patient_id: i64) -> genrisk_db::Result<Vec<GeneticInputDocument>> {
        self.inner.find_genetic_inputs(patient_id).await
    }
}

#[tokio::test]
async fn test_train_all_continues_past_failing_disease() {
    let first = synthetic_variants(20, 1, 21);
    let second = synthetic_variants(20, 101, 22);
    let third = synthetic_variants(20, 201, 23);

    let mut links = links_for(1, &first);
    links.extend(links_for(2, &second));
    links.extend(links_for(3, &third));
    let variants: Vec<_> = first.into_iter().chain(second).chain(third).collect();

    let store = seeded_store(
        variants,
        vec![disease(1, "Crohn's Disease"), disease(2, "Celiac Disease"), disease(3, "Migraine")],
        links,
    )
    .await;

    let documents = Arc::new(RejectingDocumentStore {
        inner: InMemoryDocumentStore::new(),
        rejected: ModelScope::Disease(2),
    });
    let registry = ModelRegistry::new(documents);
    let batch = BatchTrainer::new(Arc::new(store), registry.clone(), DiseaseTrainer::default());

    let report = batch.train_all_diseases().await.unwrap();
    assert_eq!(report.diseases_found, 3);
    assert_eq!(
        report.trained.iter().map(|t| t.disease_id).collect::<Vec<_>>(),
        vec![1, 3]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].disease_id, 2);
    assert!(report.failed[0].reason.contains("disk full"), "{}", report.failed[0].reason);

    assert!(registry.load_latest(ModelScope::Disease(3)).await.is_ok());
    let err = registry.load_latest(ModelScope::Disease(2)).await.unwrap_err();
    assert!(matches!(err, RiskError::NotFound(_)));
}
