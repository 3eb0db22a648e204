//! genrisk-ml — Disease-specific risk models.
//!
//! Cleaning, training, versioned storage, cached lookup and scoring of the
//! per-disease logistic models, plus the prediction request path that ties
//! them together.

pub mod cleaner;
pub mod pipeline;
pub mod trainer;
pub mod diagnostics;
pub mod registry;
pub mod cache;
pub mod aggregator;
pub mod inference;
pub mod batch;
pub mod service;

pub use aggregator::{weighted_summary, Aggregation, PatientFeatureAggregator};
pub use batch::{BatchTrainer, BatchTrainingReport, TrainingOutcome};
pub use cache::{CacheConfig, ModelCache, WarmUpReport};
pub use cleaner::{clean_row, clean_training_rows, CleanedDataset, CleaningReport};
pub use diagnostics::ModelDiagnostics;
pub use pipeline::{ClassWeighting, ProbabilisticClassifier, TrainedPipeline};
pub use registry::{LoadedModel, ModelLoader, ModelMetadata, ModelRegistry};
pub use service::{ModelInfo, PredictionRequest, PredictionResponse, PredictionService};
pub use trainer::{DiseaseTrainer, FittedModel, TrainerConfig};
