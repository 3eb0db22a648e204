//! Prediction repository.
//!
//! Stores one row per scored request in the relational `prediction` table.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::schema::PredictionRecord;

#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn insert_prediction(&self, record: &PredictionRecord) -> Result<()>;

    async fn predictions_for_patient(&self, patient_id: i64) -> Result<Vec<PredictionRecord>>;
}

#[derive(Clone, Default)]
pub struct InMemoryPredictionStore {
    rows: Arc<RwLock<Vec<PredictionRecord>>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn insert_prediction(&self, record: &PredictionRecord) -> Result<()> {
        self.rows.write().await.push(record.clone());
        Ok(())
    }

    async fn predictions_for_patient(&self, patient_id: i64) -> Result<Vec<PredictionRecord>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().filter(|r| r.patient_id == patient_id).cloned().collect())
    }
}
