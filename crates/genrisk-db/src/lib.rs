//! genrisk database layer
//!
//! Storage seams for the risk core:
//!
//! - [`VariantStore`]: the relational variant / disease / link tables (read-only to the core)
//! - [`ModelDocumentStore`]: the append-only model registry and genetic-input log
//! - [`PredictionStore`]: scored prediction rows
//!
//! Each seam ships an in-memory implementation; the document store also has a
//! JSON-lines file backend. CSV snapshots of the relational tables can be
//! loaded through [`snapshot`].
//!
//! # Example
//!
//! ```rust,no_run
//! use genrisk_db::{JsonlDocumentStore, ModelDocumentStore};
//! use genrisk_common::ModelScope;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = JsonlDocumentStore::open("./data/registry").await?;
//!     let latest = store.find_latest_model(ModelScope::Disease(1)).await?;
//!     println!("{:?}", latest.map(|d| d.id));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod schema;
pub mod variants;
pub mod documents;
pub mod predictions;
pub mod snapshot;

pub use error::{DbError, Result};
pub use schema::{
    GeneticInputDocument, ModelDocument, ModelSummary, PredictionRecord, RawVariantRow,
};
pub use variants::{InMemoryVariantStore, VariantStore};
pub use documents::{InMemoryDocumentStore, JsonlDocumentStore, ModelDocumentStore};
pub use predictions::{InMemoryPredictionStore, PredictionStore};
