use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A parsed document: opaque text plus string metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.metadata.get("filename").map(String::as_str)
    }
}

/// File formats recognised on upload, dispatched by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Markdown,
    Text,
    Other,
}

impl DocumentFormat {
    pub fn from_filename(name: &str) -> Self {
        let lower = name.to_lowercase();
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("pdf") => DocumentFormat::Pdf,
            Some("docx") => DocumentFormat::Docx,
            Some("md") => DocumentFormat::Markdown,
            Some("txt") => DocumentFormat::Text,
            _ => DocumentFormat::Other,
        }
    }
}

/// Documents the user contributed during this session, kept apart from any
/// persisted index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadedDocumentSet {
    docs: Vec<Document>,
}

impl UploadedDocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, docs: impl IntoIterator<Item = Document>) -> usize {
        let before = self.docs.len();
        self.docs.extend(docs);
        self.docs.len() - before
    }

    pub fn clear(&mut self) {
        self.docs.clear();
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.docs
    }
}
