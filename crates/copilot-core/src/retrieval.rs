//! Vector retrieval and the "context" chat engine.
//!
//! An index is a flat list of embedded chunks searched by cosine similarity.
//! The engine embeds the query, pulls the best chunks into the context
//! prompt, and streams a chat completion over the memory window.

use std::rc::Rc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use copilot_types::{
    CopilotError, Result,
    config::{RetrievalConfig, CONTEXT_PLACEHOLDER},
    document::Document,
    index::{IndexChunk, IndexMetadata},
    message::Message,
};

use crate::memory::RollingMemory;
use crate::ports::*;

// ─── Text helpers ────────────────────────────────────────────

/// Split text into windows of at most `chunk_size` characters, consecutive
/// windows sharing `overlap` characters. Windows prefer to end on whitespace.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.min(chunk_size - 1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());
        if end < chars.len() {
            // Back off to the last whitespace in the second half of the window
            let floor = start + chunk_size / 2;
            if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                end = ws + 1;
            }
        }

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end == chars.len() {
            break;
        }
        start = (end - overlap.min(end - start - 1)).max(start + 1);
    }
    chunks
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Substitute retrieved text for the context placeholder.
pub fn fill_context(prompt: &str, context: &str) -> String {
    prompt.replace(CONTEXT_PLACEHOLDER, context)
}

// ─── Vector index ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub metadata: IndexMetadata,
    pub chunks: Vec<IndexChunk>,
}

/// A chunk paired with its similarity to the query
#[derive(Debug, Clone, Copy)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a IndexChunk,
    pub score: f32,
}

impl VectorIndex {
    pub fn new(metadata: IndexMetadata) -> Self {
        Self {
            metadata,
            chunks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn extend(&mut self, chunks: impl IntoIterator<Item = IndexChunk>) {
        self.chunks.extend(chunks);
    }

    /// Number of distinct source documents
    pub fn document_count(&self) -> usize {
        let mut ids: Vec<&str> = self.chunks.iter().map(|c| c.doc_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(query, &chunk.embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }

    /// A copy of this index with `extra` chunks appended.
    pub fn merged_with(&self, extra: Vec<IndexChunk>) -> VectorIndex {
        let mut merged = self.clone();
        merged.extend(extra);
        merged
    }
}

/// Chunk and embed documents with `model`.
pub async fn embed_documents(
    docs: &[Document],
    embedder: &dyn EmbeddingPort,
    model: &str,
    settings: &RetrievalConfig,
) -> Result<Vec<IndexChunk>> {
    let mut out = Vec::new();
    for doc in docs {
        let pieces = split_text(&doc.text, settings.chunk_size, settings.chunk_overlap);
        if pieces.is_empty() {
            continue;
        }
        let embeddings = embedder.embed(model, &pieces).await?;
        if embeddings.len() != pieces.len() {
            return Err(CopilotError::Index(format!(
                "expected {} embeddings, got {}",
                pieces.len(),
                embeddings.len()
            )));
        }
        out.extend(pieces.into_iter().zip(embeddings).map(|(text, embedding)| IndexChunk {
            doc_id: doc.id.clone(),
            text,
            metadata: doc.metadata.clone(),
            embedding,
        }));
    }
    Ok(out)
}

// ─── Context chat engine ─────────────────────────────────────

pub struct ContextChatEngine {
    chat: Rc<dyn ChatPort>,
    embedder: Rc<dyn EmbeddingPort>,
    index: VectorIndex,
    model: String,
    top_k: usize,
}

impl ContextChatEngine {
    pub fn new(
        chat: Rc<dyn ChatPort>,
        embedder: Rc<dyn EmbeddingPort>,
        index: VectorIndex,
        model: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            chat,
            embedder,
            index,
            model: model.into(),
            top_k,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    async fn retrieve(&self, query: &str) -> Result<String> {
        if self.index.is_empty() {
            return Ok(String::new());
        }
        let query_embedding = self
            .embedder
            .embed(&self.index.metadata.embedding_model, &[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CopilotError::Index("embedding service returned nothing".to_string()))?;

        let passages: Vec<&str> = self
            .index
            .top_k(&query_embedding, self.top_k)
            .iter()
            .map(|s| s.chunk.text.as_str())
            .collect();
        Ok(passages.join("\n\n"))
    }
}

#[async_trait(?Send)]
impl ChatEngine for ContextChatEngine {
    async fn stream_chat(
        &self,
        query: &str,
        memory: &RollingMemory,
        context_prompt: &str,
    ) -> Result<ChunkStream> {
        let context = self.retrieve(query).await?;

        let mut messages = vec![Message::system(fill_context(context_prompt, &context))];
        messages.extend(memory.get());
        messages.push(Message::user(query).without_avatar());
        memory.put(Message::user(query));

        let inner = self.chat.stream_chat(ChatRequest {
            model: self.model.clone(),
            messages,
        });
        Ok(record_answer(inner, memory.clone()))
    }
}

/// Pass chunks through unchanged and store the full answer in `memory` once
/// the stream completes. A failed stream records nothing.
fn record_answer(inner: ChunkStream, memory: RollingMemory) -> ChunkStream {
    struct Recorder {
        inner: ChunkStream,
        memory: RollingMemory,
        answer: String,
        finished: bool,
    }

    let state = Recorder {
        inner,
        memory,
        answer: String::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        match st.inner.next().await {
            Some(LlmStreamEvent::Delta(text)) => {
                st.answer.push_str(&text);
                Some((LlmStreamEvent::Delta(text), st))
            }
            Some(LlmStreamEvent::Done) | None => {
                st.memory.put(Message::assistant(std::mem::take(&mut st.answer)));
                st.finished = true;
                Some((LlmStreamEvent::Done, st))
            }
            Some(LlmStreamEvent::Error(e)) => {
                st.finished = true;
                Some((LlmStreamEvent::Error(e), st))
            }
        }
    }))
}

// ─── Retrieval port over persisted indexes ───────────────────

/// Builds engines from a persisted index merged with session uploads.
pub struct IndexedRetrieval {
    chat: Rc<dyn ChatPort>,
    embedder: Rc<dyn EmbeddingPort>,
    store: Rc<dyn IndexStore>,
    embed_model: String,
    settings: RetrievalConfig,
}

impl IndexedRetrieval {
    pub fn new(
        chat: Rc<dyn ChatPort>,
        embedder: Rc<dyn EmbeddingPort>,
        store: Rc<dyn IndexStore>,
        embed_model: impl Into<String>,
        settings: RetrievalConfig,
    ) -> Self {
        Self {
            chat,
            embedder,
            store,
            embed_model: embed_model.into(),
            settings,
        }
    }
}

#[async_trait(?Send)]
impl RetrievalPort for IndexedRetrieval {
    async fn build_engine(
        &self,
        model: &str,
        index_name: Option<&str>,
        uploaded: &[Document],
    ) -> Result<Rc<dyn ChatEngine>> {
        let base = match index_name {
            Some(name) => self.store.load(name).await?.ok_or_else(|| {
                CopilotError::CollaboratorUnavailable(format!("index '{}' not found", name))
            })?,
            None if uploaded.is_empty() => {
                return Err(CopilotError::CollaboratorUnavailable(
                    "no index selected and no uploaded documents".to_string(),
                ));
            }
            None => VectorIndex::new(IndexMetadata::new(self.embed_model.clone())),
        };

        let extra = embed_documents(
            uploaded,
            self.embedder.as_ref(),
            &base.metadata.embedding_model,
            &self.settings,
        )
        .await?;
        log::info!(
            "retrieval engine: {} indexed chunks + {} uploaded chunks",
            base.len(),
            extra.len()
        );

        Ok(Rc::new(ContextChatEngine::new(
            self.chat.clone(),
            self.embedder.clone(),
            base.merged_with(extra),
            model,
            self.settings.similarity_top_k,
        )))
    }
}
