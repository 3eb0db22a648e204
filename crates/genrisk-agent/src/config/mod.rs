//! Configuration loading for genrisk.
//! Reads genrisk.toml from the current directory or path in GENRISK_CONFIG env var.

use genrisk_ml::{CacheConfig, TrainerConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_variants_csv")]
    pub variants_csv: String,
    #[serde(default = "default_diseases_csv")]
    pub diseases_csv: String,
    #[serde(default = "default_links_csv")]
    pub links_csv: String,
    /// Directory holding the JSON-lines model registry.
    #[serde(default = "default_registry_dir")]
    pub registry_dir: String,
}

fn default_variants_csv() -> String { "./data/snp.csv".to_string() }
fn default_diseases_csv() -> String { "./data/disease.csv".to_string() }
fn default_links_csv()    -> String { "./data/disease_snp.csv".to_string() }
fn default_registry_dir() -> String { "./data/registry".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            variants_csv: default_variants_csv(),
            diseases_csv: default_diseases_csv(),
            links_csv: default_links_csv(),
            registry_dir: default_registry_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(flatten)]
    pub solver: TrainerConfig,
    /// Retrain every disease model at startup.
    #[serde(default = "bool_true")]
    pub train_on_start: bool,
    /// Also fit the all-variant model.
    #[serde(default)]
    pub train_global: bool,
}

fn bool_true() -> bool { true }

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            solver: TrainerConfig::default(),
            train_on_start: bool_true(),
            train_global: false,
        }
    }
}

mod tests;

impl Config {
    /// Load configuration from genrisk.toml.
    /// Checks GENRISK_CONFIG env var first, then current directory.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("GENRISK_CONFIG")
            .unwrap_or_else(|_| "genrisk.toml".to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy genrisk.example.toml to genrisk.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.training.solver.c <= 0.0 {
            anyhow::bail!("training.c must be positive, got {}", config.training.solver.c);
        }
        Ok(config)
    }
}
