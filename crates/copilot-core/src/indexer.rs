//! Create or extend a persisted index from uploaded documents.

use chrono::Utc;
use copilot_types::{
    CopilotError, Result,
    config::RetrievalConfig,
    document::Document,
    index::{BuildMode, IndexMetadata},
};

use crate::ports::{EmbeddingPort, IndexStore};
use crate::retrieval::{embed_documents, VectorIndex};

#[derive(Debug, Clone)]
pub struct IndexBuildRequest {
    pub mode: BuildMode,
    pub name: String,
    /// Used for new indexes; appends always reuse the index's own model.
    pub embedding_model: String,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuildReport {
    pub mode: BuildMode,
    pub name: String,
    pub embedding_model: String,
    pub documents: usize,
    pub chunks_added: usize,
    pub total_chunks: usize,
    /// Wall-clock seconds from request to saved index
    pub elapsed_secs: f64,
}

impl IndexBuildReport {
    /// Completion notice, e.g. "Index 'docs' created successfully in 1.25 seconds (...)".
    pub fn summary(&self) -> String {
        let verb = match self.mode {
            BuildMode::Create => "created",
            BuildMode::Append => "updated",
        };
        format!(
            "Index '{}' {} successfully in {:.2} seconds ({} chunk(s) from {} document(s), {} in total)",
            self.name, verb, self.elapsed_secs, self.chunks_added, self.documents, self.total_chunks
        )
    }
}

pub async fn build_index(
    req: IndexBuildRequest,
    store: &dyn IndexStore,
    embedder: &dyn EmbeddingPort,
    settings: &RetrievalConfig,
) -> Result<IndexBuildReport> {
    let started = Utc::now();
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(CopilotError::Index(
            "Please enter a name for the index.".to_string(),
        ));
    }
    if req.documents.is_empty() {
        return Err(CopilotError::Index(
            "Please upload at least one file or provide a URL.".to_string(),
        ));
    }

    let mut index = match req.mode {
        BuildMode::Create => {
            if store.exists(&name).await? {
                return Err(CopilotError::Index(format!(
                    "Index '{}' already exists! Pick a different name or choose Append.",
                    name
                )));
            }
            if req.embedding_model.trim().is_empty() {
                return Err(CopilotError::Config(
                    "No embedding model available".to_string(),
                ));
            }
            VectorIndex::new(IndexMetadata::new(req.embedding_model.trim()))
        }
        BuildMode::Append => {
            let mut existing = store.load(&name).await?.ok_or_else(|| {
                CopilotError::Index(format!("No existing index named '{}' to append to.", name))
            })?;
            existing.metadata = IndexMetadata::new(existing.metadata.embedding_model.clone());
            existing
        }
    };

    let model = index.metadata.embedding_model.clone();
    log::info!("index target '{}' using embedding '{}'", name, model);

    let chunks = embed_documents(&req.documents, embedder, &model, settings).await?;
    let chunks_added = chunks.len();
    index.extend(chunks);
    store.save(&name, &index).await?;

    let elapsed_secs = (Utc::now() - started).num_milliseconds().max(0) as f64 / 1000.0;
    log::info!("index '{}' saved in {:.2}s", name, elapsed_secs);

    Ok(IndexBuildReport {
        mode: req.mode,
        name,
        embedding_model: model,
        documents: req.documents.len(),
        chunks_added,
        total_chunks: index.len(),
        elapsed_secs,
    })
}

/// The embedding model an existing index is locked to.
pub async fn locked_embedding_model(store: &dyn IndexStore, name: &str) -> Result<Option<String>> {
    Ok(store
        .load(name)
        .await?
        .map(|index| index.metadata.embedding_model))
}
