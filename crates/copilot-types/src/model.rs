use serde::{Deserialize, Serialize};

/// A model installed on the local runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: u64,
}

impl ModelEntry {
    pub fn size_mib(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }

    pub fn is_embedding(&self) -> bool {
        is_embedding_model(&self.name)
    }
}

/// Name-based heuristic separating embedding models from language models.
pub fn is_embedding_model(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["embed", "embedding", "mxbai", "bge"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Hardware and suitability notes for a model, as stored in the catalog file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "RAM", default = "unknown")]
    pub ram: String,
    #[serde(rename = "Reasoning", default = "unknown")]
    pub reasoning: String,
    #[serde(rename = "JetsonSafe", default = "unknown")]
    pub jetson_safe: String,
    #[serde(rename = "Why", default)]
    pub why: String,
}

impl Default for CatalogEntry {
    fn default() -> Self {
        Self {
            ram: unknown(),
            reasoning: unknown(),
            jetson_safe: unknown(),
            why: String::new(),
        }
    }
}

fn unknown() -> String {
    "-".to_string()
}

/// Streaming status line from a model download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullStatus {
    pub status: String,
    #[serde(default)]
    pub completed: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl PullStatus {
    pub fn fraction(&self) -> Option<f32> {
        match (self.completed, self.total) {
            (Some(done), Some(total)) if total > 0 => {
                Some((done as f64 / total as f64).clamp(0.0, 1.0) as f32)
            }
            _ => None,
        }
    }
}
