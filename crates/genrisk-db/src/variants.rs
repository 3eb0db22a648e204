//! Variant repository.
//!
//! Read-only access to variants, diseases and disease→variant links.
//! Ingestion and linking happen outside this crate; the core only reads.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use genrisk_common::{Disease, DiseaseId, DiseaseVariantLink, VariantId, VariantRecord};
use tokio::sync::RwLock;

use crate::error::{DbError, Result};

/// Relational store access used by training and aggregation.
#[async_trait]
pub trait VariantStore: Send + Sync {
    /// All known diseases, ordered by id.
    async fn list_diseases(&self) -> Result<Vec<Disease>>;

    async fn find_disease(&self, disease_id: DiseaseId) -> Result<Option<Disease>>;

    /// Case-insensitive lookup by disease name.
    async fn find_disease_by_name(&self, name: &str) -> Result<Option<Disease>>;

    async fn find_variant_by_rsid(&self, rsid: &str) -> Result<Option<VariantRecord>>;

    /// Variant ids linked to a disease. Empty when the disease has no curated links.
    async fn linked_variant_ids(&self, disease_id: DiseaseId) -> Result<HashSet<VariantId>>;

    /// Variant rows joined through the disease's links.
    async fn variants_for_disease(&self, disease_id: DiseaseId) -> Result<Vec<VariantRecord>>;

    async fn all_variants(&self) -> Result<Vec<VariantRecord>>;
}

#[derive(Default)]
struct Tables {
    variants: HashMap<VariantId, VariantRecord>,
    by_rsid: HashMap<String, VariantId>,
    diseases: HashMap<DiseaseId, Disease>,
    links: HashMap<DiseaseId, HashSet<VariantId>>,
}

/// In-process snapshot of the relational tables.
#[derive(Clone, Default)]
pub struct InMemoryVariantStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryVariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-cleaned rows.
    pub async fn from_parts(
        variants: Vec<VariantRecord>,
        diseases: Vec<Disease>,
        links: Vec<DiseaseVariantLink>,
    ) -> Result<Self> {
        let store = Self::new();
        for v in variants {
            store.insert_variant(v).await?;
        }
        for d in diseases {
            store.insert_disease(d).await;
        }
        for link in links {
            store.link(link).await?;
        }
        Ok(store)
    }

    /// Insert or correctively re-import a variant. The rsid must stay unique.
    pub async fn insert_variant(&self, variant: VariantRecord) -> Result<()> {
        let mut t = self.tables.write().await;
        if let Some(&existing) = t.by_rsid.get(&variant.rsid) {
            if existing != variant.variant_id {
                return Err(DbError::Duplicate(format!(
                    "rsid {} already bound to variant {}",
                    variant.rsid, existing
                )));
            }
        }
        let renamed = t
            .variants
            .get(&variant.variant_id)
            .map(|old| old.rsid.clone())
            .filter(|old| *old != variant.rsid);
        if let Some(old) = renamed {
            t.by_rsid.remove(&old);
        }
        t.by_rsid.insert(variant.rsid.clone(), variant.variant_id);
        t.variants.insert(variant.variant_id, variant);
        Ok(())
    }

    pub async fn insert_disease(&self, disease: Disease) {
        let mut t = self.tables.write().await;
        t.diseases.insert(disease.disease_id, disease);
    }

    /// Record a disease→variant link. Re-linking is a no-op.
    pub async fn link(&self, link: DiseaseVariantLink) -> Result<()> {
        let mut t = self.tables.write().await;
        if !t.variants.contains_key(&link.variant_id) {
            tracing::debug!(
                disease_id = link.disease_id,
                variant_id = link.variant_id,
                "Skipping link to unknown variant"
            );
            return Ok(());
        }
        if !t.diseases.contains_key(&link.disease_id) {
            return Err(DbError::NotFound(format!("disease_id={}", link.disease_id)));
        }
        t.links.entry(link.disease_id).or_default().insert(link.variant_id);
        Ok(())
    }

    pub async fn variant_count(&self) -> usize {
        self.tables.read().await.variants.len()
    }
}

#[async_trait]
impl VariantStore for InMemoryVariantStore {
    async fn list_diseases(&self) -> Result<Vec<Disease>> {
        let t = self.tables.read().await;
        let mut diseases: Vec<Disease> = t.diseases.values().cloned().collect();
        diseases.sort_by_key(|d| d.disease_id);
        Ok(diseases)
    }

    async fn find_disease(&self, disease_id: DiseaseId) -> Result<Option<Disease>> {
        Ok(self.tables.read().await.diseases.get(&disease_id).cloned())
    }

    async fn find_disease_by_name(&self, name: &str) -> Result<Option<Disease>> {
        let wanted = name.trim();
        let t = self.tables.read().await;
        Ok(t
            .diseases
            .values()
            .filter(|d| d.name.eq_ignore_ascii_case(wanted))
            .min_by_key(|d| d.disease_id)
            .cloned())
    }

    async fn find_variant_by_rsid(&self, rsid: &str) -> Result<Option<VariantRecord>> {
        let t = self.tables.read().await;
        Ok(t.by_rsid.get(rsid.trim()).and_then(|id| t.variants.get(id)).cloned())
    }

    async fn linked_variant_ids(&self, disease_id: DiseaseId) -> Result<HashSet<VariantId>> {
        let t = self.tables.read().await;
        Ok(t.links.get(&disease_id).cloned().unwrap_or_default())
    }

    async fn variants_for_disease(&self, disease_id: DiseaseId) -> Result<Vec<VariantRecord>> {
        let t = self.tables.read().await;
        let mut rows: Vec<VariantRecord> = t
            .links
            .get(&disease_id)
            .map(|ids| ids.iter().filter_map(|id| t.variants.get(id)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|v| v.variant_id);
        Ok(rows)
    }

    async fn all_variants(&self) -> Result<Vec<VariantRecord>> {
        let t = self.tables.read().await;
        let mut rows: Vec<VariantRecord> = t.variants.values().cloned().collect();
        rows.sort_by_key(|v| v.variant_id);
        Ok(rows)
    }
}
