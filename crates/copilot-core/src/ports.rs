//! Port traits: the hexagonal architecture boundary.
//!
//! These traits are defined here in `copilot-core` (pure Rust).
//! Implementations live in `copilot-platform` (browser adapters).
//! The core never imports platform code; it only depends on these traits.

use std::pin::Pin;
use std::rc::Rc;

use async_trait::async_trait;
use futures::Stream;
use copilot_types::{
    Result,
    document::Document,
    message::Message,
    model::{ModelEntry, PullStatus},
};

use crate::memory::RollingMemory;
use crate::retrieval::VectorIndex;

// ─── Generation Ports ────────────────────────────────────────

/// Streaming event from a generation collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum LlmStreamEvent {
    /// A partial chunk of assistant text
    Delta(String),
    /// Stream finished
    Done,
    /// Error during streaming
    Error(String),
}

/// Chunks arrive in production order; the stream is finite.
pub type ChunkStream = Pin<Box<dyn Stream<Item = LlmStreamEvent>>>;

/// Request for a plain (non-retrieval) chat completion
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

#[async_trait(?Send)]
pub trait ChatPort {
    /// Streaming chat completion; transport failures surface as `LlmStreamEvent::Error`
    fn stream_chat(&self, req: ChatRequest) -> ChunkStream;

    /// Models installed on the runtime
    async fn list_models(&self) -> Result<Vec<ModelEntry>>;

    /// Download a model, reporting progress
    fn pull_model(&self, name: &str) -> Pin<Box<dyn Stream<Item = Result<PullStatus>>>>;

    /// Remove an installed model
    async fn delete_model(&self, name: &str) -> Result<()>;
}

#[async_trait(?Send)]
pub trait EmbeddingPort {
    /// One embedding per input, in input order
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Retrieval-augmented generation for one turn. Implementations fill the
/// context placeholder and may record the exchange into `memory`.
#[async_trait(?Send)]
pub trait ChatEngine {
    async fn stream_chat(
        &self,
        query: &str,
        memory: &RollingMemory,
        context_prompt: &str,
    ) -> Result<ChunkStream>;
}

#[async_trait(?Send)]
pub trait RetrievalPort {
    /// Merge the persisted index (if any) with the session's uploads into an engine
    async fn build_engine(
        &self,
        model: &str,
        index_name: Option<&str>,
        uploaded: &[Document],
    ) -> Result<Rc<dyn ChatEngine>>;
}

// ─── Index Store Port ────────────────────────────────────────

#[async_trait(?Send)]
pub trait IndexStore {
    async fn list_indexes(&self) -> Result<Vec<String>>;

    async fn load(&self, name: &str) -> Result<Option<VectorIndex>>;

    async fn save(&self, name: &str, index: &VectorIndex) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list_indexes().await?.iter().any(|n| n == name))
    }
}

// ─── Storage Port ────────────────────────────────────────────

#[async_trait(?Send)]
pub trait StoragePort {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a value
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys with a given prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Name of this backend (for logging/debug)
    fn backend_name(&self) -> &str;
}
