//! Sidebar: model and index selection, context prompt editor, uploads,
//! reset and export, and page navigation.

use egui::{self, RichText, Vec2};

use copilot_types::model::is_embedding_model;

use crate::state::{NoticeLevel, UiState, View};
use crate::theme::*;

/// Session settings the sidebar displays
pub struct SidebarView<'a> {
    pub model: &'a str,
    pub use_index: bool,
    pub index_name: Option<&'a str>,
    pub context_prompt: &'a str,
}

/// What the user asked for this frame
#[derive(Debug, Clone, PartialEq)]
pub enum SidebarAction {
    SelectModel(String),
    SetUseIndex(bool),
    SelectIndex(Option<String>),
    SaveContextPrompt(String),
    ResetChat,
    ExportTranscript,
    Navigate(View),
}

pub fn sidebar_panel(ui: &mut egui::Ui, state: &mut UiState, view: &SidebarView<'_>) -> Vec<SidebarAction> {
    let mut actions = Vec::new();

    egui::Frame::default()
        .fill(BG_SECONDARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            egui::ScrollArea::vertical().auto_shrink([false, false]).show(ui, |ui| {
                ui.heading(RichText::new("Jetson Copilot").color(ACCENT).strong());
                ui.horizontal(|ui| {
                    for (target, label) in [
                        (View::Chat, "Chat"),
                        (View::Models, "Models"),
                        (View::IndexBuilder, "Build index"),
                    ] {
                        if ui.selectable_label(state.view == target, label).clicked() && state.view != target {
                            actions.push(SidebarAction::Navigate(target));
                        }
                    }
                });
                ui.separator();

                // ── Model ───────────────────────────────────
                section(ui, "Model");
                let mut selected = view.model.to_string();
                egui::ComboBox::from_id_salt("chat_model")
                    .selected_text(selected.as_str())
                    .width(ui.available_width())
                    .show_ui(ui, |ui| {
                        for model in state.models.iter().filter(|m| !is_embedding_model(&m.name)) {
                            ui.selectable_value(&mut selected, model.name.clone(), model.name.as_str());
                        }
                    });
                if selected != view.model {
                    actions.push(SidebarAction::SelectModel(selected));
                }
                if state.models.is_empty() {
                    ui.label(RichText::new("No models reported by Ollama").color(WARNING).small());
                }

                ui.add_space(8.0);

                // ── Retrieval ───────────────────────────────
                section(ui, "Documents");
                let mut use_index = view.use_index;
                if ui.checkbox(&mut use_index, "Answer from documents").changed() {
                    actions.push(SidebarAction::SetUseIndex(use_index));
                }

                ui.add_enabled_ui(use_index, |ui| {
                    let mut index = view.index_name.map(str::to_string);
                    egui::ComboBox::from_id_salt("index_name")
                        .selected_text(index.as_deref().unwrap_or("(uploads only)"))
                        .width(ui.available_width())
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut index, None, "(uploads only)");
                            for name in &state.indexes {
                                ui.selectable_value(&mut index, Some(name.clone()), name.as_str());
                            }
                        });
                    if index.as_deref() != view.index_name {
                        actions.push(SidebarAction::SelectIndex(index));
                    }
                });

                ui.label(
                    RichText::new(format!(
                        "Drop PDF, DOCX, Markdown or text files on the window to add them. {} uploaded document(s).",
                        state.uploaded_count
                    ))
                    .color(TEXT_SECONDARY)
                    .small(),
                );

                ui.add_space(8.0);

                // ── Context prompt ──────────────────────────
                section(ui, "Context prompt");
                ui.add(
                    egui::TextEdit::multiline(&mut state.prompt_draft)
                        .desired_rows(6)
                        .desired_width(f32::INFINITY),
                );
                ui.horizontal(|ui| {
                    let dirty = state.prompt_draft != view.context_prompt;
                    if ui.add_enabled(dirty, egui::Button::new("Save prompt")).clicked() {
                        actions.push(SidebarAction::SaveContextPrompt(state.prompt_draft.clone()));
                    }
                    if ui.add_enabled(dirty, egui::Button::new("Revert")).clicked() {
                        state.prompt_draft = view.context_prompt.to_string();
                    }
                });
                if !state.prompt_draft.contains(copilot_types::config::CONTEXT_PLACEHOLDER) {
                    ui.label(
                        RichText::new("Without {context_str} retrieved passages are not shown to the model.")
                            .color(WARNING)
                            .small(),
                    );
                }

                ui.add_space(8.0);
                ui.separator();

                // ── Conversation ────────────────────────────
                ui.horizontal(|ui| {
                    let busy = state.is_busy();
                    if ui
                        .add_enabled(!busy, egui::Button::new("Reset chat").min_size(Vec2::new(100.0, 24.0)))
                        .clicked()
                    {
                        actions.push(SidebarAction::ResetChat);
                    }
                    if ui.button("Download chat").clicked() {
                        actions.push(SidebarAction::ExportTranscript);
                    }
                });

                ui.add_space(8.0);
                notices(ui, state);

                ui.add_space(8.0);
                ui.separator();
                ui.hyperlink_to("Jetson AI Lab", "https://www.jetson-ai-lab.com");
                ui.hyperlink_to("Ollama", "https://ollama.com");
            });
        });

    actions
}

fn section(ui: &mut egui::Ui, title: &str) {
    ui.label(RichText::new(title).color(ACCENT).strong());
    ui.add_space(2.0);
}

fn notices(ui: &mut egui::Ui, state: &UiState) {
    for notice in state.notices.iter().rev() {
        let color = match notice.level {
            NoticeLevel::Info => TEXT_SECONDARY,
            NoticeLevel::Success => SUCCESS,
            NoticeLevel::Error => ERROR,
        };
        ui.label(RichText::new(&notice.text).color(color).small());
    }
}
