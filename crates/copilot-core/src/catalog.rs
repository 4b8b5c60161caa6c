//! Model catalog: hardware notes joined onto the installed model list.

use std::collections::HashMap;

use copilot_types::{
    Result,
    model::{CatalogEntry, ModelEntry},
};

#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl ModelCatalog {
    /// Notes for the models the device ships with.
    pub fn builtin() -> Self {
        let rows = [
            ("llama3:8b", "16 GB", "Strong general reasoning", "Safe (if you have enough RAM)"),
            ("mistral:7b", "12 GB", "High reasoning ability", "Safe"),
            ("llama3:latest", "16 GB", "Strong general reasoning", "Safe"),
            ("mxbai-embed-large:latest", "8 GB", "Embedding only", "Safe"),
        ];
        let entries = rows
            .into_iter()
            .map(|(name, ram, reasoning, jetson_safe)| {
                (
                    name.to_string(),
                    CatalogEntry {
                        ram: ram.to_string(),
                        reasoning: reasoning.to_string(),
                        jetson_safe: jetson_safe.to_string(),
                        why: String::new(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Parse a catalog file: a JSON object keyed by model name.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries: HashMap<String, CatalogEntry> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Entries from `other` take precedence.
    pub fn merge(mut self, other: ModelCatalog) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn lookup(&self, name: &str) -> CatalogEntry {
        self.entries.get(name).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One line of the models table
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRow {
    pub name: String,
    pub size_mib: Option<f64>,
    pub info: CatalogEntry,
}

impl ModelRow {
    pub fn size_label(&self) -> String {
        match self.size_mib {
            Some(mib) => format!("{:.1}", mib),
            None => "N/A".to_string(),
        }
    }
}

/// Split installed models into (language models, embedding models).
pub fn catalog_rows(models: &[ModelEntry], catalog: &ModelCatalog) -> (Vec<ModelRow>, Vec<ModelRow>) {
    let mut llm_rows = Vec::new();
    let mut embed_rows = Vec::new();
    for model in models {
        let row = ModelRow {
            name: model.name.clone(),
            size_mib: (model.size > 0).then(|| model.size_mib()),
            info: catalog.lookup(&model.name),
        };
        if model.is_embedding() {
            embed_rows.push(row);
        } else {
            llm_rows.push(row);
        }
    }
    (llm_rows, embed_rows)
}

/// `preferred` when installed, otherwise the first installed language model.
pub fn default_model(models: &[ModelEntry], preferred: &str) -> Option<String> {
    if models.iter().any(|m| m.name == preferred) {
        return Some(preferred.to_string());
    }
    models
        .iter()
        .find(|m| !m.is_embedding())
        .or_else(|| models.first())
        .map(|m| m.name.clone())
}

/// Names from `required` that are not installed.
pub fn missing_models(installed: &[ModelEntry], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|name| !installed.iter().any(|m| m.name == **name))
        .map(|name| name.to_string())
        .collect()
}
