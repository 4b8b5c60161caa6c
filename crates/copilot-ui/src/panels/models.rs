//! Models page: installed models with catalog notes, download and delete.

use egui::{self, RichText, Vec2};

use copilot_core::catalog::{catalog_rows, ModelCatalog, ModelRow};

use crate::state::UiState;
use crate::theme::*;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelsAction {
    Refresh,
    Pull(String),
    Delete(String),
}

pub fn models_panel(ui: &mut egui::Ui, state: &mut UiState, catalog: &ModelCatalog) -> Option<ModelsAction> {
    let mut action = None;
    let (llm_rows, embed_rows) = catalog_rows(&state.models, catalog);

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(RichText::new("Models").color(TEXT_PRIMARY).strong());
                    if ui.button("Refresh").clicked() {
                        action = Some(ModelsAction::Refresh);
                    }
                });
                ui.separator();

                ui.label(RichText::new("Language models").color(ACCENT).strong());
                if let Some(name) = model_table(ui, "llm_models", &llm_rows) {
                    action = Some(ModelsAction::Delete(name));
                }

                ui.add_space(12.0);
                ui.label(RichText::new("Embedding models").color(ACCENT).strong());
                if let Some(name) = model_table(ui, "embed_models", &embed_rows) {
                    action = Some(ModelsAction::Delete(name));
                }

                ui.add_space(12.0);
                ui.separator();
                ui.label(RichText::new("Download a model").color(ACCENT).strong());
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut state.pull_name)
                            .hint_text("e.g. llama3:8b")
                            .desired_width(240.0),
                    );
                    let enabled = !state.pull_name.trim().is_empty() && !state.is_pulling();
                    if ui
                        .add_enabled(enabled, egui::Button::new("Pull").min_size(Vec2::new(60.0, 0.0)))
                        .clicked()
                    {
                        action = Some(ModelsAction::Pull(state.pull_name.trim().to_string()));
                    }
                });

                if let Some(progress) = &state.pull_progress {
                    ui.label(
                        RichText::new(format!("{}: {}", progress.model, progress.status))
                            .color(TEXT_SECONDARY)
                            .small(),
                    );
                    match progress.fraction {
                        Some(f) => {
                            ui.add(egui::ProgressBar::new(f).show_percentage());
                        }
                        None => {
                            ui.spinner();
                        }
                    }
                }
            });
        });

    action
}

/// Returns the name of a model whose delete button was clicked.
fn model_table(ui: &mut egui::Ui, id: &str, rows: &[ModelRow]) -> Option<String> {
    if rows.is_empty() {
        ui.label(RichText::new("None installed").color(TEXT_SECONDARY).small());
        return None;
    }

    let mut delete = None;
    egui::Grid::new(id).striped(true).num_columns(7).show(ui, |ui| {
        for header in ["Model", "Size (MiB)", "RAM", "Reasoning", "Jetson safe", "Why", ""] {
            ui.label(RichText::new(header).color(TEXT_SECONDARY).small().strong());
        }
        ui.end_row();

        for row in rows {
            ui.label(RichText::new(&row.name).color(TEXT_PRIMARY));
            ui.label(row.size_label());
            ui.label(row.info.ram.as_str());
            ui.label(row.info.reasoning.as_str());
            ui.label(row.info.jetson_safe.as_str());
            ui.label(row.info.why.as_str());
            if ui.small_button("Delete").clicked() {
                delete = Some(row.name.clone());
            }
            ui.end_row();
        }
    });
    delete
}
