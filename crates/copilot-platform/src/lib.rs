//! Browser platform adapters.
//!
//! Implements the `copilot-core` port traits on top of `fetch()`, IndexedDB
//! and the DOM. Nothing here holds session state.

pub mod download;
pub mod llm;
pub mod storage;
pub mod web;

pub use llm::OllamaClient;
pub use storage::{open_storage, MemoryStorage, StorageIndexStore};
