//! Platform-free core of the copilot: the chat session state machine,
//! streamed-output buffering, rolling memory, retrieval and the port traits
//! that platform adapters implement.

pub mod catalog;
pub mod config_store;
pub mod event_bus;
pub mod indexer;
pub mod ingest;
pub mod memory;
pub mod ports;
pub mod retrieval;
pub mod session;
pub mod stream_buffer;

#[cfg(test)]
mod tests;
