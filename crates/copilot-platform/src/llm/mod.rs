pub mod ndjson;
pub mod ollama;

pub use ollama::OllamaClient;
