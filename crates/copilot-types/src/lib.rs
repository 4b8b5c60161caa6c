pub mod message;
pub mod event;
pub mod config;
pub mod error;
pub mod document;
pub mod model;
pub mod index;


pub use error::CopilotError;
pub type Result<T> = std::result::Result<T, CopilotError>;
