//! Document-style registry store.
//!
//! Holds serialized models (`model_metadata`) and the per-request raw input
//! log (`genetic_inputs`). Both collections are append-only: records are
//! inserted and read, never updated or deleted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use genrisk_common::ModelScope;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{DbError, Result};
use crate::schema::{
    GeneticInputDocument, ModelDocument, ModelSummary, COLLECTION_GENETIC_INPUTS,
    COLLECTION_MODEL_METADATA,
};

#[async_trait]
pub trait ModelDocumentStore: Send + Sync {
    /// Append a model document. Ids are unique.
    async fn insert_model(&self, doc: &ModelDocument) -> Result<()>;

    /// Newest document for the scope by `created_at`; ties go to the later insert.
    async fn find_latest_model(&self, scope: ModelScope) -> Result<Option<ModelDocument>>;

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelDocument>>;

    /// Summaries for a scope, newest first.
    async fn list_models(&self, scope: ModelScope) -> Result<Vec<ModelSummary>>;

    async fn insert_genetic_input(&self, doc: &GeneticInputDocument) -> Result<()>;

    async fn find_genetic_inputs(&self, patient_id: i64) -> Result<Vec<GeneticInputDocument>>;
}

/// Pick the newest document in `scope`, walking in insertion order.
fn latest_in_scope<'a, I>(docs: I, scope: ModelScope) -> Option<&'a ModelDocument>
where
    I: IntoIterator<Item = &'a ModelDocument>,
{
    docs.into_iter()
        .filter(|d| d.scope == scope)
        .fold(None, |best: Option<&ModelDocument>, doc| match best {
            Some(b) if b.created_at > doc.created_at => Some(b),
            _ => Some(doc),
        })
}

fn summaries_in_scope(docs: &[ModelDocument], scope: ModelScope) -> Vec<ModelSummary> {
    let mut indexed: Vec<(usize, ModelSummary)> = docs
        .iter()
        .enumerate()
        .filter(|(_, d)| d.scope == scope)
        .map(|(i, d)| (i, d.summary()))
        .collect();
    indexed.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
    indexed.into_iter().map(|(_, s)| s).collect()
}

#[derive(Default)]
struct Collections {
    models: Vec<ModelDocument>,
    genetic_inputs: Vec<GeneticInputDocument>,
}

impl Collections {
    fn check_unique(&self, id: Uuid) -> Result<()> {
        if self.models.iter().any(|d| d.id == id) {
            return Err(DbError::Duplicate(format!("model document {id}")));
        }
        Ok(())
    }
}

// ── In-memory store ──────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<RwLock<Collections>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModelDocumentStore for InMemoryDocumentStore {
    async fn insert_model(&self, doc: &ModelDocument) -> Result<()> {
        let mut c = self.inner.write().await;
        c.check_unique(doc.id)?;
        c.models.push(doc.clone());
        Ok(())
    }

    async fn find_latest_model(&self, scope: ModelScope) -> Result<Option<ModelDocument>> {
        let c = self.inner.read().await;
        Ok(latest_in_scope(&c.models, scope).cloned())
    }

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelDocument>> {
        let c = self.inner.read().await;
        Ok(c.models.iter().find(|d| d.id == id).cloned())
    }

    async fn list_models(&self, scope: ModelScope) -> Result<Vec<ModelSummary>> {
        let c = self.inner.read().await;
        Ok(summaries_in_scope(&c.models, scope))
    }

    async fn insert_genetic_input(&self, doc: &GeneticInputDocument) -> Result<()> {
        self.inner.write().await.genetic_inputs.push(doc.clone());
        Ok(())
    }

    async fn find_genetic_inputs(&self, patient_id: i64) -> Result<Vec<GeneticInputDocument>> {
        let c = self.inner.read().await;
        Ok(c.genetic_inputs.iter().filter(|d| d.patient_id == patient_id).cloned().collect())
    }
}

// ── JSON-lines store ─────────────────────────────────────────────────────────

/// File-backed store: one `<collection>.jsonl` file per collection, appended to.
///
/// The model collection is indexed in memory on open; writes are serialised
/// through a single lock so lines never interleave.
#[derive(Clone)]
pub struct JsonlDocumentStore {
    dir: PathBuf,
    index: Arc<RwLock<Collections>>,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlDocumentStore {
    /// Open or create a store in `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let models: Vec<ModelDocument> =
            read_collection(&dir.join(format!("{COLLECTION_MODEL_METADATA}.jsonl"))).await?;
        let genetic_inputs: Vec<GeneticInputDocument> =
            read_collection(&dir.join(format!("{COLLECTION_GENETIC_INPUTS}.jsonl"))).await?;

        tracing::info!(
            path = %dir.display(),
            models = models.len(),
            genetic_inputs = genetic_inputs.len(),
            "Opened document store"
        );

        Ok(Self {
            dir,
            index: Arc::new(RwLock::new(Collections { models, genetic_inputs })),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.jsonl"))
    }

    async fn append_line<T: serde::Serialize>(&self, collection: &str, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.collection_path(collection))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Read every record of a collection file.
///
/// A final line without its newline is a torn append: it is dropped and the
/// file truncated back to the last complete record so later appends start on
/// a clean line. Malformed complete lines are still [`DbError::Corrupt`].
async fn read_collection<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(path).await?;
    let (complete, torn) = match content.rfind('\n') {
        Some(end) => content.split_at(end + 1),
        None => ("", content.as_str()),
    };

    let mut out = Vec::new();
    for (i, line) in complete.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| DbError::Corrupt {
            file: path.display().to_string(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        out.push(record);
    }

    if !torn.trim().is_empty() {
        match serde_json::from_str(torn) {
            Ok(record) => out.push(record),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    bytes = torn.len(),
                    error = %e,
                    "Dropping incomplete trailing record"
                );
                let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
                file.set_len(complete.len() as u64).await?;
            }
        }
    }
    Ok(out)
}

#[async_trait]
impl ModelDocumentStore for JsonlDocumentStore {
    async fn insert_model(&self, doc: &ModelDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.index.read().await.check_unique(doc.id)?;
        self.append_line(COLLECTION_MODEL_METADATA, doc).await?;
        self.index.write().await.models.push(doc.clone());
        Ok(())
    }

    async fn find_latest_model(&self, scope: ModelScope) -> Result<Option<ModelDocument>> {
        let c = self.index.read().await;
        Ok(latest_in_scope(&c.models, scope).cloned())
    }

    async fn find_model(&self, id: Uuid) -> Result<Option<ModelDocument>> {
        let c = self.index.read().await;
        Ok(c.models.iter().find(|d| d.id == id).cloned())
    }

    async fn list_models(&self, scope: ModelScope) -> Result<Vec<ModelSummary>> {
        let c = self.index.read().await;
        Ok(summaries_in_scope(&c.models, scope))
    }

    async fn insert_genetic_input(&self, doc: &GeneticInputDocument) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.append_line(COLLECTION_GENETIC_INPUTS, doc).await?;
        self.index.write().await.genetic_inputs.push(doc.clone());
        Ok(())
    }

    async fn find_genetic_inputs(&self, patient_id: i64) -> Result<Vec<GeneticInputDocument>> {
        let c = self.index.read().await;
        Ok(c.genetic_inputs.iter().filter(|d| d.patient_id == patient_id).cloned().collect())
    }
}
