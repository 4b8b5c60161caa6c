//! Settings panel: Ollama endpoint, streaming and storage options.
//! Changes apply on the explicit Save button.

use egui::{self, RichText, Vec2};

use copilot_types::config::{CopilotConfig, StorageBackendType};

use crate::theme::*;

/// What the caller should do after rendering the settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    None,
    Changed,
    SaveClicked,
}

/// Save feedback passed in from the app layer
#[derive(Debug, Clone)]
pub struct SaveFeedback {
    pub message: String,
    pub success: bool,
}

pub fn settings_panel(
    ui: &mut egui::Ui,
    config: &mut CopilotConfig,
    save_feedback: Option<&SaveFeedback>,
) -> SettingsAction {
    let mut changed = false;
    let mut save_clicked = false;

    egui::Frame::default()
        .fill(BG_SECONDARY)
        .inner_margin(PANEL_PADDING)
        .corner_radius(PANEL_ROUNDING)
        .show(ui, |ui| {
            ui.heading(RichText::new("Settings").color(TEXT_PRIMARY));
            ui.separator();

            // ── Ollama ───────────────────────────────────────
            ui.label(RichText::new("Ollama").color(ACCENT).strong());
            ui.label(RichText::new("Base URL").color(TEXT_SECONDARY).small());
            changed |= ui.text_edit_singleline(&mut config.llm.base_url).changed();

            ui.label(RichText::new("Embedding model").color(TEXT_SECONDARY).small());
            changed |= ui.text_edit_singleline(&mut config.llm.embed_model).changed();

            ui.label(RichText::new("Request timeout (s)").color(TEXT_SECONDARY).small());
            changed |= ui
                .add(egui::Slider::new(&mut config.llm.request_timeout_secs, 10..=900))
                .changed();

            ui.add_space(12.0);
            ui.separator();

            // ── Chat ─────────────────────────────────────────
            ui.label(RichText::new("Chat").color(ACCENT).strong());
            ui.label(RichText::new("Characters per screen update").color(TEXT_SECONDARY).small());
            changed |= ui
                .add(egui::Slider::new(&mut config.chat.flush_threshold, 1..=200))
                .changed();

            ui.label(RichText::new("Passages per answer").color(TEXT_SECONDARY).small());
            changed |= ui
                .add(egui::Slider::new(&mut config.retrieval.similarity_top_k, 1..=8))
                .changed();

            ui.add_space(12.0);
            ui.separator();

            // ── Storage ──────────────────────────────────────
            ui.label(RichText::new("Storage").color(ACCENT).strong());
            egui::ComboBox::from_id_salt("storage_backend")
                .selected_text(storage_label(&config.storage.backend))
                .show_ui(ui, |ui| {
                    for backend in [
                        StorageBackendType::Auto,
                        StorageBackendType::Memory,
                        StorageBackendType::IndexedDb,
                    ] {
                        let label = storage_label(&backend);
                        changed |= ui
                            .selectable_value(&mut config.storage.backend, backend, label)
                            .changed();
                    }
                });
            ui.label(
                RichText::new(storage_description(&config.storage.backend))
                    .color(TEXT_SECONDARY)
                    .small()
                    .italics(),
            );
            ui.label(
                RichText::new("Backend changes take effect after a reload.")
                    .color(TEXT_SECONDARY)
                    .small(),
            );

            ui.add_space(16.0);
            ui.horizontal(|ui| {
                let btn = ui.add(
                    egui::Button::new(RichText::new("Save Settings").color(BG_PRIMARY).strong())
                        .fill(ACCENT)
                        .corner_radius(PANEL_ROUNDING)
                        .min_size(Vec2::new(120.0, 28.0)),
                );
                save_clicked = btn.clicked();

                if let Some(fb) = save_feedback {
                    let color = if fb.success { SUCCESS } else { ERROR };
                    ui.label(RichText::new(&fb.message).color(color).small());
                }
            });
        });

    if save_clicked {
        SettingsAction::SaveClicked
    } else if changed {
        SettingsAction::Changed
    } else {
        SettingsAction::None
    }
}

pub fn storage_label(backend: &StorageBackendType) -> &'static str {
    match backend {
        StorageBackendType::Auto => "Auto-detect",
        StorageBackendType::Memory => "Memory",
        StorageBackendType::IndexedDb => "IndexedDB",
    }
}

fn storage_description(backend: &StorageBackendType) -> &'static str {
    match backend {
        StorageBackendType::Auto => "Uses IndexedDB when the browser allows it, otherwise memory.",
        StorageBackendType::Memory => "Settings and indexes are lost on page reload.",
        StorageBackendType::IndexedDb => "Settings and indexes survive page reloads.",
    }
}
