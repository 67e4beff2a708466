//! Modal-style windows: the cancel prompt and the command preview.

use eframe::egui;
use xdsmask_core::CancelScope;

use super::theme::{danger_button, form_label};
use crate::app::AnnotatorApp;

impl AnnotatorApp {
    /// Ask which cancel scope to apply.
    pub(crate) fn render_cancel_prompt(&mut self, ctx: &egui::Context) {
        if !self.ui_state.show_cancel_prompt {
            return;
        }
        let mut choice = None;
        let mut keep_editing = false;

        egui::Window::new("Cancel session")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label("Masks drawn in this session will be lost.");
                ui.label(
                    egui::RichText::new(
                        "Revert all also restores geometry, beam centre and module gaps.",
                    )
                    .weak(),
                );
                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.add(danger_button("Discard new masks")).clicked() {
                        choice = Some(CancelScope::DiscardNew);
                    }
                    if ui.add(danger_button("Revert all")).clicked() {
                        choice = Some(CancelScope::RevertAll);
                    }
                    if ui.button("Keep editing").clicked() {
                        keep_editing = true;
                    }
                });
            });

        if let Some(scope) = choice {
            self.cancel(scope);
        } else if keep_editing {
            self.ui_state.show_cancel_prompt = false;
        }
    }

    /// Show the processing command for the current state.
    pub(crate) fn render_command_window(&mut self, ctx: &egui::Context) {
        if !self.ui_state.show_command {
            return;
        }
        let mut line = self.processing_command().display_line();
        let mut open = true;

        egui::Window::new("Processing command")
            .open(&mut open)
            .default_width(520.0)
            .show(ctx, |ui| {
                ui.label(form_label("Command line"));
                ui.add(
                    egui::TextEdit::multiline(&mut line)
                        .code_editor()
                        .desired_rows(4)
                        .desired_width(f32::INFINITY)
                        .interactive(false),
                );
                if self.session_open() {
                    ui.label(
                        egui::RichText::new("Includes edits not yet accepted.").weak(),
                    );
                }
                if ui.button("Copy").clicked() {
                    ui.ctx().copy_text(line.clone());
                }
            });

        self.ui_state.show_command = open;
    }
}
