pub mod chat;
pub mod index_builder;
pub mod models;
pub mod settings;
pub mod sidebar;
