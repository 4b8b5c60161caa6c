use serde::{Deserialize, Serialize};

/// Placeholder in the context prompt that the retrieval engine fills with
/// retrieved passages.
pub const CONTEXT_PLACEHOLDER: &str = "{context_str}";

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopilotConfig {
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub retrieval: RetrievalConfig,
    pub storage: StorageConfig,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            chat: ChatConfig::default(),
            retrieval: RetrievalConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Connection to the local model runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            request_timeout_secs: 300,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_secs.saturating_mul(1000)
    }
}

/// Chat session behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Buffered characters that trigger a UI flush. 0 or 1 flushes every chunk.
    pub flush_threshold: usize,
    pub memory_token_limit: usize,
    pub greeting: String,
    pub context_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 20,
            memory_token_limit: 4096,
            greeting: DEFAULT_GREETING.to_string(),
            context_prompt: DEFAULT_CONTEXT_PROMPT.to_string(),
        }
    }
}

/// Retrieval-augmented generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub use_index: bool,
    pub index_name: Option<String>,
    pub similarity_top_k: usize,
    /// Chunk length in characters
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            use_index: false,
            index_name: None,
            similarity_top_k: 2,
            chunk_size: 1024,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackendType,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendType::Auto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackendType {
    /// Auto-detect best available backend
    Auto,
    Memory,
    IndexedDb,
}

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_CHAT_MODEL: &str = "llama3:latest";
pub const DEFAULT_EMBED_MODEL: &str = "mxbai-embed-large:latest";

pub const DEFAULT_GREETING: &str =
    "Ask me any question about NVIDIA Jetson embedded AI computer!";

pub const DEFAULT_CONTEXT_PROMPT: &str = r#"You are a chatbot, able to have normal interactions, as well as talk about NVIDIA Jetson embedded AI computer.
Here are the relevant documents for the context:

{context_str}

Instruction: Use the previous chat history, or the context above, to interact and help the user."#;
