//! genrisk — Genetic disease-risk estimation
//! Entry point: loads the variant snapshot, retrains models and warms the cache.

mod bootstrap;
mod config;

use std::sync::Arc;

use genrisk_db::JsonlDocumentStore;
use genrisk_ml::{BatchTrainer, DiseaseTrainer, ModelCache, ModelRegistry};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("genrisk=debug,info")),
        )
        .init();

    info!("genrisk starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match config::Config::load() {
        Ok(c) => {
            info!(
                "Configuration loaded. Registry: {}, train on start: {}",
                c.storage.registry_dir, c.training.train_on_start
            );
            c
        }
        Err(e) => {
            tracing::warn!("Could not load genrisk.toml: {e}");
            tracing::warn!("Copy genrisk.example.toml to genrisk.toml and edit it.");
            return Ok(());
        }
    };

    let store = Arc::new(bootstrap::load_variant_store(&config.storage).await?);
    info!("Variant store ready.");

    let documents = Arc::new(JsonlDocumentStore::open(&config.storage.registry_dir).await?);
    let registry = ModelRegistry::new(documents);
    let cache = Arc::new(ModelCache::from_config(Arc::new(registry.clone()), &config.cache));
    info!("Model registry opened at {}", config.storage.registry_dir);

    if config.training.train_on_start {
        let trainer = DiseaseTrainer::new(config.training.solver.clone());
        let batch = BatchTrainer::new(store, registry, trainer).with_cache(cache.clone());

        let report = batch.train_all_diseases().await?;
        info!(
            "Disease training: {} trained, {} skipped, {} failed in {} ms",
            report.trained.len(),
            report.skipped.len(),
            report.failed.len(),
            report.duration_ms
        );
        for failed in &report.failed {
            tracing::warn!("  {} (id {}): {}", failed.name, failed.disease_id, failed.reason);
        }

        if config.training.train_global {
            match batch.train_global_model().await {
                Ok(outcome) => info!(
                    "Global model trained: {} ({} rows)",
                    outcome.version_id, outcome.training_rows
                ),
                Err(e) if e.is_insufficient_data() => {
                    tracing::warn!("Global model skipped: {e}")
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let warm = cache.warm_up(&config.cache.warm_scopes()).await;
    for (scope, reason) in &warm.failed {
        tracing::warn!("No model available for {}: {}", scope, reason);
    }

    info!("genrisk ready. {} models cached.", cache.cached_count().await);
    Ok(())
}
