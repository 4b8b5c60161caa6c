use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CopilotError {
    #[error("Cannot submit an empty message")]
    EmptySubmission,

    #[error("Generation stream failed: {0}")]
    GenerationStream(String),

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Could not read document: {0}")]
    Ingest(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JS interop error: {0}")]
    JsInterop(String),

    #[error("Session busy")]
    Busy,
}

impl From<serde_json::Error> for CopilotError {
    fn from(e: serde_json::Error) -> Self {
        CopilotError::Serialization(e.to_string())
    }
}
