//! Index builder page: create a named index or append to an existing one.

use egui::{self, RichText, Vec2};

use copilot_types::index::BuildMode;
use copilot_types::model::is_embedding_model;

use crate::state::UiState;
use crate::theme::*;

#[derive(Debug, Clone, PartialEq)]
pub enum IndexBuilderAction {
    Build,
    ClearFiles,
    /// Append target changed; the app looks up its embedding model
    TargetChanged(String),
}

/// `locked_model` is the embedding model of the selected append target.
pub fn index_builder_panel(
    ui: &mut egui::Ui,
    state: &mut UiState,
    locked_model: Option<&str>,
    building: bool,
) -> Option<IndexBuilderAction> {
    let mut action = None;

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.heading(RichText::new("Build index").color(TEXT_PRIMARY).strong());
            ui.separator();

            let form = &mut state.index_form;
            ui.horizontal(|ui| {
                ui.radio_value(&mut form.mode, BuildMode::Create, "Create new index");
                ui.radio_value(&mut form.mode, BuildMode::Append, "Append to existing");
            });
            ui.add_space(6.0);

            match form.mode {
                BuildMode::Create => {
                    ui.label(RichText::new("Index name").color(TEXT_SECONDARY).small());
                    ui.text_edit_singleline(&mut form.name);

                    ui.label(RichText::new("Embedding model").color(TEXT_SECONDARY).small());
                    egui::ComboBox::from_id_salt("embedding_model")
                        .selected_text(form.embedding_model.as_str())
                        .show_ui(ui, |ui| {
                            for m in state.models.iter().filter(|m| is_embedding_model(&m.name)) {
                                ui.selectable_value(&mut form.embedding_model, m.name.clone(), m.name.as_str());
                            }
                        });
                }
                BuildMode::Append => {
                    ui.label(RichText::new("Existing index").color(TEXT_SECONDARY).small());
                    let before = form.name.clone();
                    egui::ComboBox::from_id_salt("append_target")
                        .selected_text(form.name.as_str())
                        .show_ui(ui, |ui| {
                            for name in &state.indexes {
                                ui.selectable_value(&mut form.name, name.clone(), name.as_str());
                            }
                        });
                    if form.name != before {
                        action = Some(IndexBuilderAction::TargetChanged(form.name.clone()));
                    }
                    if let Some(model) = locked_model {
                        ui.label(
                            RichText::new(format!("Embedding model locked to {}", model))
                                .color(TEXT_SECONDARY)
                                .small(),
                        );
                    }
                }
            }

            ui.add_space(8.0);
            ui.label(RichText::new("Files").color(ACCENT).strong());
            if form.files.is_empty() {
                ui.label(
                    RichText::new("Drop PDF, DOCX, Markdown or text files on the window")
                        .color(TEXT_SECONDARY)
                        .small(),
                );
            } else {
                for name in &form.files {
                    ui.label(RichText::new(name.as_str()).color(TEXT_PRIMARY).small());
                }
                if ui.small_button("Clear files").clicked() {
                    action = Some(IndexBuilderAction::ClearFiles);
                }
            }

            ui.add_space(8.0);
            ui.label(RichText::new("Web pages").color(ACCENT).strong());
            ui.label(
                RichText::new("Optional: one URL per line")
                    .color(TEXT_SECONDARY)
                    .small(),
            );
            ui.add(
                egui::TextEdit::multiline(&mut form.urls)
                    .hint_text("https://")
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );

            ui.add_space(12.0);
            ui.horizontal(|ui| {
                let btn = ui.add_enabled(
                    !building,
                    egui::Button::new(RichText::new("Build").color(TEXT_PRIMARY).strong())
                        .fill(ACCENT)
                        .corner_radius(PANEL_ROUNDING)
                        .min_size(Vec2::new(100.0, 28.0)),
                );
                if btn.clicked() {
                    action = Some(IndexBuilderAction::Build);
                }
                if building {
                    ui.spinner();
                }
            });
        });

    action
}
