//! Chat panel: transcript, in-flight output and the input line.

use egui::{self, Align, Color32, Layout, RichText, ScrollArea, Vec2};

use copilot_types::message::{Avatar, Role};

use crate::state::{ChatEntry, UiState};
use crate::theme::*;

/// Render the chat panel. Returns Some(text) when the user submits input.
pub fn chat_panel(ui: &mut egui::Ui, state: &mut UiState) -> Option<String> {
    let mut submitted = None;

    egui::Frame::default()
        .fill(BG_PRIMARY)
        .inner_margin(PANEL_PADDING)
        .show(ui, |ui| {
            ui.vertical(|ui| {
                ui.horizontal(|ui| {
                    ui.heading(RichText::new("Jetson Copilot").color(TEXT_PRIMARY).strong());
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let status_color = if state.last_error.is_some() {
                            ERROR
                        } else if state.is_busy() {
                            WARNING
                        } else {
                            SUCCESS
                        };
                        ui.label(RichText::new(&state.status_text).color(status_color).small());
                    });
                });

                ui.separator();

                let available_height = ui.available_height() - 60.0;
                ScrollArea::vertical()
                    .max_height(available_height)
                    .auto_shrink([false, false])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for entry in &state.messages {
                            render_message(ui, entry);
                            ui.add_space(4.0);
                        }

                        if !state.streaming_text.is_empty() {
                            bubble(ui, BG_SECONDARY, |ui| {
                                avatar_label(ui, Some(Avatar::Assistant));
                                ui.label(RichText::new(&state.streaming_text).color(TEXT_PRIMARY));
                                ui.label(RichText::new("▌").color(ACCENT).strong());
                            });
                        } else if state.is_busy() {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label(RichText::new("Thinking...").color(TEXT_SECONDARY).small());
                            });
                        }

                        if let Some(partial) = &state.interrupted_text {
                            bubble(ui, ERROR_BG, |ui| {
                                avatar_label(ui, Some(Avatar::Assistant));
                                ui.label(RichText::new(partial).color(TEXT_SECONDARY));
                                ui.label(RichText::new("(response interrupted)").color(ERROR).small());
                            });
                        }
                    });

                ui.add_space(8.0);

                ui.horizontal(|ui| {
                    let input = egui::TextEdit::singleline(&mut state.input_text)
                        .hint_text("Your question")
                        .desired_width(ui.available_width() - 70.0)
                        .font(egui::FontId::proportional(14.0));
                    let response = ui.add(input);

                    let send_enabled = !state.input_text.trim().is_empty() && !state.is_busy();
                    let send_btn = ui.add_enabled(
                        send_enabled,
                        egui::Button::new(RichText::new("Send").color(TEXT_PRIMARY))
                            .fill(if send_enabled { ACCENT } else { BG_SURFACE })
                            .corner_radius(PANEL_ROUNDING)
                            .min_size(Vec2::new(60.0, 0.0)),
                    );

                    let enter = response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if (enter && send_enabled) || send_btn.clicked() {
                        submitted = Some(std::mem::take(&mut state.input_text));
                        response.request_focus();
                    }
                });
            });
        });

    submitted
}

fn bubble(ui: &mut egui::Ui, fill: Color32, add_contents: impl FnOnce(&mut egui::Ui)) {
    egui::Frame::default()
        .fill(fill)
        .corner_radius(PANEL_ROUNDING)
        .inner_margin(8.0)
        .show(ui, add_contents);
}

fn avatar_label(ui: &mut egui::Ui, avatar: Option<Avatar>) {
    let (text, color) = match avatar {
        Some(Avatar::Assistant) => ("🤖 Copilot", ACCENT),
        Some(Avatar::User) => ("🧑 You", USER_ACCENT),
        None => ("", TEXT_SECONDARY),
    };
    if !text.is_empty() {
        ui.label(RichText::new(text).color(color).strong().small());
    }
}

fn render_message(ui: &mut egui::Ui, entry: &ChatEntry) {
    let fill = match entry.role {
        Role::User => BG_SURFACE,
        Role::Assistant | Role::System => BG_SECONDARY,
    };
    bubble(ui, fill, |ui| {
        avatar_label(ui, entry.avatar);
        ui.label(RichText::new(&entry.content).color(TEXT_PRIMARY));
    });
}
