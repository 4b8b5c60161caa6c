//! egui panels for Jetson Copilot.
//!
//! Panels render from `UiState` and report user intent as return values;
//! the app crate turns those into session calls.

pub mod panels;
pub mod state;
pub mod theme;
