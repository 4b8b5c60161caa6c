use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside a persisted index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Embedding model the index was built with; appends must reuse it
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
}

impl IndexMetadata {
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            created_at: Utc::now(),
        }
    }
}

/// One embedded slice of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexChunk {
    pub doc_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub embedding: Vec<f32>,
}

/// Whether an index build creates a fresh index or extends an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Create,
    Append,
}
