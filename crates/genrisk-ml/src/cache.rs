//! Model cache for resolving the latest model per scope.
//!
//! Keeps loaded models in memory so a prediction request does not hit the
//! registry each time. Entries are keyed by [`ModelScope`] and are replaced
//! only through [`ModelCache::refresh`], [`ModelCache::evict`], expiry, or
//! capacity eviction; a newer version saved to the registry is not picked up
//! until then.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use genrisk_common::ModelScope;
//! use genrisk_db::InMemoryDocumentStore;
//! use genrisk_ml::{ModelCache, ModelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ModelRegistry::new(Arc::new(InMemoryDocumentStore::new()));
//!     let cache = ModelCache::new(Arc::new(registry));
//!
//!     // First call loads from the registry, later calls are served from memory.
//!     let model = cache.resolve(ModelScope::Disease(1)).await?;
//!     println!("{}", model.version_id);
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use genrisk_common::{ModelScope, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::registry::{LoadedModel, ModelLoader};

fn default_max_models() -> usize {
    64
}

/// `[cache]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds before an entry is reloaded. `None` keeps entries until evicted.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default = "default_max_models")]
    pub max_models: usize,
    /// Load the global model at startup.
    #[serde(default)]
    pub warm_global: bool,
    /// Disease models to load at startup.
    #[serde(default)]
    pub warm_diseases: Vec<i64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            max_models: default_max_models(),
            warm_global: false,
            warm_diseases: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn warm_scopes(&self) -> Vec<ModelScope> {
        let mut scopes = Vec::new();
        if self.warm_global {
            scopes.push(ModelScope::Global);
        }
        scopes.extend(self.warm_diseases.iter().map(|&id| ModelScope::Disease(id)));
        scopes
    }
}

struct CachedModel {
    model: Arc<LoadedModel>,
    loaded_at: Instant,
}

/// Outcome of [`ModelCache::warm_up`]. A missing model is not fatal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WarmUpReport {
    pub loaded: Vec<ModelScope>,
    pub failed: Vec<(ModelScope, String)>,
}

pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    models: RwLock<HashMap<ModelScope, CachedModel>>,
    ttl: Option<Duration>,
    max_models: usize,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("ttl", &self.ttl)
            .field("max_models", &self.max_models)
            .field("models", &"<cached models>")
            .finish()
    }
}

impl ModelCache {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self::from_config(loader, &CacheConfig::default())
    }

    pub fn from_config(loader: Arc<dyn ModelLoader>, config: &CacheConfig) -> Self {
        Self {
            loader,
            models: RwLock::new(HashMap::new()),
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_models: config.max_models.max(1),
        }
    }

    pub fn with_ttl(loader: Arc<dyn ModelLoader>, ttl: Duration) -> Self {
        let mut cache = Self::new(loader);
        cache.ttl = Some(ttl);
        cache
    }

    fn is_fresh(&self, entry: &CachedModel) -> bool {
        match self.ttl {
            Some(ttl) => entry.loaded_at.elapsed() < ttl,
            None => true,
        }
    }

    /// Cached model for `scope`, loading it on a miss or after expiry.
    ///
    /// Concurrent misses for the same scope may each load; the last writer
    /// wins and every caller gets a valid model.
    pub async fn resolve(&self, scope: ModelScope) -> Result<Arc<LoadedModel>> {
        {
            let models = self.models.read().await;
            if let Some(entry) = models.get(&scope) {
                if self.is_fresh(entry) {
                    debug!("Model cache hit: {}", scope);
                    metrics::counter!("genrisk_model_cache_hits_total").increment(1);
                    return Ok(Arc::clone(&entry.model));
                }
                debug!("Model cache entry expired: {}", scope);
            }
        }

        metrics::counter!("genrisk_model_cache_misses_total").increment(1);
        self.load_and_store(scope).await
    }

    /// Reload `scope` now, replacing any cached entry. On failure the old
    /// entry is left in place.
    pub async fn refresh(&self, scope: ModelScope) -> Result<Arc<LoadedModel>> {
        info!("Refreshing cached model: {}", scope);
        self.load_and_store(scope).await
    }

    async fn load_and_store(&self, scope: ModelScope) -> Result<Arc<LoadedModel>> {
        info!("Loading model into cache: {}", scope);
        let model = Arc::new(self.loader.load_latest(scope).await?);

        let mut models = self.models.write().await;
        if models.len() >= self.max_models && !models.contains_key(&scope) {
            let oldest = models
                .iter()
                .min_by_key(|(_, e)| e.loaded_at)
                .map(|(k, _)| *k);
            if let Some(key) = oldest {
                warn!("Evicting model from cache: {}", key);
                models.remove(&key);
            }
        }
        models.insert(scope, CachedModel { model: Arc::clone(&model), loaded_at: Instant::now() });
        metrics::gauge!("genrisk_model_cache_entries").set(models.len() as f64);
        info!(
            "Model cached: {} version {} ({} models in cache)",
            scope,
            model.version_id,
            models.len()
        );
        Ok(model)
    }

    /// Drop the entry for `scope`. Returns whether one was present.
    pub async fn evict(&self, scope: ModelScope) -> bool {
        let removed = self.models.write().await.remove(&scope).is_some();
        if removed {
            info!("Evicted cached model: {}", scope);
        }
        removed
    }

    pub async fn is_cached(&self, scope: ModelScope) -> bool {
        self.models.read().await.contains_key(&scope)
    }

    pub async fn cached_count(&self) -> usize {
        self.models.read().await.len()
    }

    pub async fn clear(&self) {
        let mut models = self.models.write().await;
        let count = models.len();
        models.clear();
        info!("Cleared {} models from cache", count);
    }

    /// Load several scopes up front. Failures are recorded, not returned.
    pub async fn warm_up(&self, scopes: &[ModelScope]) -> WarmUpReport {
        info!("Warming up {} models...", scopes.len());
        let mut report = WarmUpReport::default();
        for &scope in scopes {
            match self.resolve(scope).await {
                Ok(_) => report.loaded.push(scope),
                Err(e) => {
                    warn!("Warm-up skipped {}: {}", scope, e);
                    report.failed.push((scope, e.to_string()));
                }
            }
        }
        info!(
            "Warm-up complete. {} loaded, {} unavailable, {} models in cache.",
            report.loaded.len(),
            report.failed.len(),
            self.cached_count().await
        );
        report
    }
}
