//! Model registry.
//!
//! Versioned persistence of fitted pipelines over a [`ModelDocumentStore`].
//! Every save appends a new version; nothing is overwritten. "Latest" is
//! decided by `created_at`, never by insertion order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use genrisk_common::{ModelScope, Result, RiskError, FEATURE_COLUMNS, FEATURE_DIM};
use genrisk_db::{ModelDocument, ModelDocumentStore, ModelSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::TrainedPipeline;

/// Descriptive fields stored alongside a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub scope: ModelScope,
    pub feature_names: Vec<String>,
    pub training_rows: usize,
    pub created_at: DateTime<Utc>,
    pub notes: serde_json::Value,
}

impl ModelMetadata {
    /// Metadata stamped with the current time and the standard column names.
    pub fn new(scope: ModelScope, training_rows: usize) -> Self {
        Self {
            scope,
            feature_names: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            training_rows,
            created_at: Utc::now(),
            notes: serde_json::json!({}),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_notes(mut self, notes: serde_json::Value) -> Self {
        self.notes = notes;
        self
    }
}

/// A deserialized model plus the version it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModel {
    pub version_id: Uuid,
    pub metadata: ModelMetadata,
    pub pipeline: TrainedPipeline,
}

/// Source of the newest model for a scope. The cache depends on this, not on
/// the registry, so tests can count or fail loads.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load_latest(&self, scope: ModelScope) -> Result<LoadedModel>;
}

#[derive(Clone)]
pub struct ModelRegistry {
    store: Arc<dyn ModelDocumentStore>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelDocumentStore>) -> Self {
        Self { store }
    }

    /// Persist a new version and return its id.
    pub async fn save(&self, pipeline: &TrainedPipeline, metadata: ModelMetadata) -> Result<Uuid> {
        let doc = ModelDocument {
            id: Uuid::new_v4(),
            scope: metadata.scope,
            model: pipeline.to_json()?,
            feature_names: metadata.feature_names,
            training_rows: metadata.training_rows,
            created_at: metadata.created_at,
            notes: metadata.notes,
        };
        self.store.insert_model(&doc).await?;

        tracing::info!(
            version_id = %doc.id,
            scope = %doc.scope,
            training_rows = doc.training_rows,
            "Saved model version"
        );
        Ok(doc.id)
    }

    /// Newest version for `scope`.
    pub async fn load_latest(&self, scope: ModelScope) -> Result<LoadedModel> {
        let doc = self
            .store
            .find_latest_model(scope)
            .await?
            .ok_or_else(|| RiskError::NotFound(format!("no model for {scope}")))?;
        decode(doc)
    }

    /// A specific version, for pinning.
    pub async fn load_version(&self, version_id: Uuid) -> Result<LoadedModel> {
        let doc = self
            .store
            .find_model(version_id)
            .await?
            .ok_or_else(|| RiskError::NotFound(format!("model version {version_id}")))?;
        decode(doc)
    }

    /// Stored versions for `scope`, newest first.
    pub async fn list_versions(&self, scope: ModelScope) -> Result<Vec<ModelSummary>> {
        Ok(self.store.list_models(scope).await?)
    }
}

#[async_trait]
impl ModelLoader for ModelRegistry {
    async fn load_latest(&self, scope: ModelScope) -> Result<LoadedModel> {
        ModelRegistry::load_latest(self, scope).await
    }
}

fn decode(doc: ModelDocument) -> Result<LoadedModel> {
    if doc.feature_names.len() != FEATURE_DIM {
        return Err(RiskError::Dimension {
            expected: FEATURE_DIM,
            actual: doc.feature_names.len(),
        });
    }
    if doc.feature_names.iter().zip(FEATURE_COLUMNS).any(|(a, b)| a != b) {
        return Err(RiskError::Schema(format!(
            "model {} has columns {:?}, expected {:?}",
            doc.id, doc.feature_names, FEATURE_COLUMNS
        )));
    }
    let pipeline = TrainedPipeline::from_json(&doc.model)?;
    Ok(LoadedModel {
        version_id: doc.id,
        metadata: ModelMetadata {
            scope: doc.scope,
            feature_names: doc.feature_names,
            training_rows: doc.training_rows,
            created_at: doc.created_at,
            notes: doc.notes,
        },
        pipeline,
    })
}
