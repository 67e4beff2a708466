//! Control panel (left sidebar) and top bar rendering.

use std::path::PathBuf;

use eframe::egui;
use rfd::FileDialog;
use xdsmask_core::{AnnotationEvent, GapGridConfig, Mode, ShapeKind};

use super::theme::{accent, danger_button, form_label, primary_button, section_header};
use crate::app::AnnotatorApp;

const MODES: [Mode; 4] = [Mode::Probe, Mode::FitBeam, Mode::Draw, Mode::Delete];

/// Parse six whitespace- or comma-separated cell constants. Blank means unset.
pub(crate) fn parse_cell(text: &str) -> Result<Option<[f64; 6]>, String> {
    let values = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().map_err(|_| format!("not a number: {s}")))
        .collect::<Result<Vec<_>, _>>()?;
    if values.is_empty() {
        return Ok(None);
    }
    <[f64; 6]>::try_from(values.as_slice())
        .map(Some)
        .map_err(|_| format!("cell needs 6 values, got {}", values.len()))
}

pub(crate) fn parse_macros(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

impl AnnotatorApp {
    /// Render the top bar with file actions and the status line.
    pub(crate) fn render_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar")
            .frame(egui::Frame::none().inner_margin(egui::Margin::symmetric(16.0, 8.0)))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        egui::RichText::new("XDSMASK")
                            .size(14.0)
                            .strong()
                            .color(accent::BLUE),
                    );
                    ui.separator();

                    let can_open = !self.processing.is_converting;
                    if ui
                        .add_enabled(can_open, egui::Button::new("Open image"))
                        .clicked()
                    {
                        if let Some(path) = FileDialog::new().pick_file() {
                            self.open_image(path);
                        }
                    }
                    if ui.button("Open state").clicked() {
                        if let Some(path) = FileDialog::new().add_filter("JSON", &["json"]).pick_file()
                        {
                            if let Err(e) = self.load_state_file(&path) {
                                self.report_error(&e);
                            }
                        }
                    }
                    if ui
                        .add_enabled(!self.session_open(), egui::Button::new("Save state"))
                        .on_disabled_hover_text("Accept or cancel the session first")
                        .clicked()
                    {
                        let dialog = FileDialog::new().add_filter("JSON", &["json"]);
                        let dialog = match &self.state_path {
                            Some(p) => dialog.set_file_name(p.to_string_lossy()),
                            None => dialog.set_file_name("xdsmask_state.json"),
                        };
                        if let Some(path) = dialog.save_file() {
                            if let Err(e) = self.save_state_file(&path) {
                                self.report_error(&e);
                            }
                        }
                    }
                    ui.separator();

                    if let Some(p) = &self.image_path {
                        let name = p.file_name().unwrap_or_default().to_string_lossy();
                        ui.label(egui::RichText::new(name).weak());
                        ui.separator();
                    }
                    ui.label(&self.processing.status_text);
                });
            });
    }

    /// Render the left control panel.
    pub(crate) fn render_side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("ctrl")
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        self.render_session_controls(ui);
                        ui.separator();

                        egui::CollapsingHeader::new(section_header("Geometry"))
                            .default_open(true)
                            .show(ui, |ui| self.render_geometry_form(ui));
                        egui::CollapsingHeader::new(section_header("Overlays"))
                            .default_open(true)
                            .show(ui, |ui| self.render_overlay_options(ui));
                        egui::CollapsingHeader::new(section_header("Module gaps"))
                            .default_open(false)
                            .show(ui, |ui| self.render_gap_form(ui));
                        egui::CollapsingHeader::new(section_header("Processing"))
                            .default_open(false)
                            .show(ui, |ui| self.render_processing_controls(ui));
                        egui::CollapsingHeader::new(section_header("Tools"))
                            .default_open(false)
                            .show(ui, |ui| self.render_tool_settings(ui));

                        if let Some(reading) = &self.cursor_info {
                            ui.separator();
                            ui.label(form_label("Pointer"));
                            ui.monospace(format!(
                                "x {:.1}  y {:.1}\n{:.2} Å",
                                reading.pixel.x, reading.pixel.y, reading.resolution_a
                            ));
                        }
                        ui.add_space(12.0);
                    });
            });
    }

    fn render_session_controls(&mut self, ui: &mut egui::Ui) {
        ui.label(section_header("Session"));
        ui.add_space(4.0);

        let current = self.mode();
        ui.label(form_label("Click mode"));
        for mode in MODES {
            if ui.radio(current == mode, mode.to_string()).clicked() && current != mode {
                self.dispatch(AnnotationEvent::ModeChanged(mode));
            }
        }

        ui.add_space(4.0);
        ui.label(form_label("Shape"));
        let mut kind = self.ui_state.shape_kind;
        egui::ComboBox::from_id_salt("shape_kind")
            .selected_text(kind.to_string())
            .show_ui(ui, |ui| {
                for option in ShapeKind::ALL {
                    ui.selectable_value(&mut kind, option, option.to_string());
                }
            });
        if kind != self.ui_state.shape_kind {
            self.ui_state.shape_kind = kind;
            if self.session_open() {
                self.dispatch(AnnotationEvent::ShapeKindChanged(kind));
            }
        }

        let masks = self.current_state().masks.len();
        ui.label(format!("{masks} masks"));

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let open = self.session_open();
            if ui.add_enabled(open, primary_button("Accept")).clicked() {
                self.accept();
            }
            if ui.add_enabled(open, danger_button("Cancel…")).clicked() {
                self.ui_state.show_cancel_prompt = true;
            }
        });
    }

    fn render_geometry_form(&mut self, ui: &mut egui::Ui) {
        let form = &mut self.ui_state.geometry_form;
        let g = &mut form.geometry;
        let mut changed = false;

        egui::Grid::new("geometry_grid")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label(form_label("Distance"));
                changed |= ui
                    .add(egui::DragValue::new(&mut g.distance_mm).speed(0.5).suffix(" mm"))
                    .changed();
                ui.end_row();

                ui.label(form_label("Wavelength"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut g.wavelength_a)
                            .speed(0.001)
                            .max_decimals(5)
                            .suffix(" Å"),
                    )
                    .changed();
                ui.end_row();

                ui.label(form_label("Pixel X"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut g.pixel_size_x_mm)
                            .speed(0.001)
                            .max_decimals(4)
                            .suffix(" mm"),
                    )
                    .changed();
                ui.end_row();

                ui.label(form_label("Pixel Y"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut g.pixel_size_y_mm)
                            .speed(0.001)
                            .max_decimals(4)
                            .suffix(" mm"),
                    )
                    .changed();
                ui.end_row();

                ui.label(form_label("Pixels"));
                ui.horizontal(|ui| {
                    changed |= ui
                        .add(egui::DragValue::new(&mut g.pixel_count_x).range(1..=u32::MAX))
                        .changed();
                    ui.label("×");
                    changed |= ui
                        .add(egui::DragValue::new(&mut g.pixel_count_y).range(1..=u32::MAX))
                        .changed();
                });
                ui.end_row();

                ui.label(form_label("2θ"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut g.two_theta_deg)
                            .speed(0.1)
                            .range(-180.0..=180.0)
                            .suffix("°"),
                    )
                    .changed();
                ui.end_row();

                ui.label(form_label("Beam"));
                ui.horizontal(|ui| {
                    changed |= ui
                        .add(egui::DragValue::new(&mut g.beam_centre_px.x).speed(0.5))
                        .changed();
                    changed |= ui
                        .add(egui::DragValue::new(&mut g.beam_centre_px.y).speed(0.5))
                        .changed();
                });
                ui.end_row();
            });
        form.dirty |= changed;

        ui.horizontal(|ui| {
            let dirty = self.ui_state.geometry_form.dirty;
            if ui.add_enabled(dirty, primary_button("Apply")).clicked() {
                let geometry = self.ui_state.geometry_form.geometry.clone();
                self.apply_geometry(geometry);
            }
            if ui.add_enabled(dirty, egui::Button::new("Revert")).clicked() {
                let current = self.current_state().geometry.clone();
                self.ui_state.geometry_form.reset(&current);
            }
        });
    }

    fn render_overlay_options(&mut self, ui: &mut egui::Ui) {
        let state = &mut self.ui_state;
        ui.checkbox(&mut state.show_rings, "Resolution rings");
        ui.add_enabled_ui(state.show_rings, |ui| {
            ui.horizontal(|ui| {
                ui.label(form_label("Rings"));
                ui.add(egui::DragValue::new(&mut state.ring_count).range(1..=20));
            });
        });
        ui.checkbox(&mut state.show_ice_rings, "Ice rings");
        ui.checkbox(&mut state.show_gaps, "Module gaps");
    }

    fn render_gap_form(&mut self, ui: &mut egui::Ui) {
        let gaps = &mut self.ui_state.gap_form;
        let mut changed = false;

        egui::Grid::new("gap_grid")
            .num_columns(3)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("");
                ui.label(form_label("X"));
                ui.label(form_label("Y"));
                ui.end_row();

                ui.label(form_label("Count"));
                changed |= ui
                    .add(egui::DragValue::new(&mut gaps.count_x).range(0..=32))
                    .changed();
                changed |= ui
                    .add(egui::DragValue::new(&mut gaps.count_y).range(0..=32))
                    .changed();
                ui.end_row();

                ui.label(form_label("Scale"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut gaps.scale_x_pct)
                            .speed(0.05)
                            .suffix(" %"),
                    )
                    .changed();
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut gaps.scale_y_pct)
                            .speed(0.05)
                            .suffix(" %"),
                    )
                    .changed();
                ui.end_row();

                ui.label(form_label("Offset"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut gaps.offset_x_pct)
                            .speed(0.05)
                            .suffix(" %"),
                    )
                    .changed();
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut gaps.offset_y_pct)
                            .speed(0.05)
                            .suffix(" %"),
                    )
                    .changed();
                ui.end_row();

                ui.label(form_label("Width"));
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut gaps.width_x)
                            .range(0.0..=200.0)
                            .suffix(" px"),
                    )
                    .changed();
                changed |= ui
                    .add(
                        egui::DragValue::new(&mut gaps.width_y)
                            .range(0.0..=200.0)
                            .suffix(" px"),
                    )
                    .changed();
                ui.end_row();
            });

        if ui.button("Reset").clicked() {
            *gaps = GapGridConfig::default();
            changed = true;
        }
        if changed {
            let gaps = self.ui_state.gap_form.clone();
            self.dispatch(AnnotationEvent::GapsChanged(gaps));
        }
    }

    fn render_processing_controls(&mut self, ui: &mut egui::Ui) {
        let params = &mut self.params;

        ui.label(form_label("Image directory"));
        Self::path_row(ui, "image_dir", &mut params.image_dir);
        ui.label(form_label("Output directory"));
        Self::path_row(ui, "output_dir", &mut params.output_dir);

        let mut use_threads = params.nthreads.is_some();
        ui.horizontal(|ui| {
            ui.checkbox(&mut use_threads, "Threads");
            let mut n = params.nthreads.unwrap_or(4);
            ui.add_enabled(use_threads, egui::DragValue::new(&mut n).range(1..=256));
            params.nthreads = use_threads.then_some(n);
        });

        let mut use_res = params.resolution.is_some();
        ui.horizontal(|ui| {
            ui.checkbox(&mut use_res, "Resolution");
            let (mut low, mut high) = params.resolution.unwrap_or((50.0, 1.5));
            ui.add_enabled(
                use_res,
                egui::DragValue::new(&mut low).speed(0.1).range(0.1..=999.0),
            );
            ui.add_enabled(
                use_res,
                egui::DragValue::new(&mut high).speed(0.01).range(0.1..=999.0),
            );
            params.resolution = use_res.then_some((low, high));
        });

        ui.horizontal(|ui| {
            ui.label(form_label("Space group"));
            let mut symm = params.space_group.clone().unwrap_or_default();
            if ui
                .add(egui::TextEdit::singleline(&mut symm).desired_width(80.0))
                .changed()
            {
                let symm = symm.trim();
                params.space_group = (!symm.is_empty()).then(|| symm.to_string());
            }
        });

        ui.label(form_label("Cell"));
        if ui
            .add(
                egui::TextEdit::singleline(&mut self.ui_state.cell_text)
                    .hint_text("a b c alpha beta gamma"),
            )
            .changed()
        {
            match parse_cell(&self.ui_state.cell_text) {
                Ok(cell) => self.params.cell = cell,
                Err(e) => self.processing.status_text = e,
            }
        }
        ui.label(form_label("Macros"));
        if ui
            .add(egui::TextEdit::singleline(&mut self.ui_state.macros_text).hint_text("-M names"))
            .changed()
        {
            self.params.macros = parse_macros(&self.ui_state.macros_text);
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            if ui.button("Show command").clicked() {
                self.ui_state.show_command = true;
            }
            if self.processing.job_running {
                if ui.add(danger_button("Stop")).clicked() {
                    self.stop_processing();
                }
            } else if ui
                .add_enabled(!self.session_open(), primary_button("Run"))
                .on_disabled_hover_text("Accept or cancel the session first")
                .clicked()
            {
                self.run_processing();
            }
        });

        if self.processing.job_running || self.processing.job_stage.is_some() {
            let text = self
                .processing
                .job_stage
                .map_or_else(|| "Starting".to_string(), |s| s.to_string());
            ui.add(egui::ProgressBar::new(self.processing.job_progress()).text(text));
        }
    }

    fn render_tool_settings(&mut self, ui: &mut egui::Ui) {
        let config = &mut self.config;
        egui::Grid::new("tool_grid")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                for (label, program) in [
                    ("Image info", &mut config.image_info),
                    ("Converter", &mut config.converter),
                    ("Processing", &mut config.processing),
                ] {
                    ui.label(form_label(label));
                    let mut text = program.to_string_lossy().into_owned();
                    if ui
                        .add(egui::TextEdit::singleline(&mut text).desired_width(140.0))
                        .changed()
                    {
                        *program = PathBuf::from(text);
                    }
                    ui.end_row();
                }

                ui.label(form_label("Poll every"));
                ui.add(
                    egui::DragValue::new(&mut config.poll_interval_ms)
                        .range(100..=60_000)
                        .suffix(" ms"),
                );
                ui.end_row();

                ui.label(form_label("Give up after"));
                ui.add(
                    egui::DragValue::new(&mut config.timeout_polls)
                        .range(1..=100_000)
                        .suffix(" polls"),
                );
                ui.end_row();
            });
    }

    fn path_row(ui: &mut egui::Ui, id: &str, path: &mut PathBuf) {
        ui.push_id(id, |ui| {
            ui.horizontal(|ui| {
                let mut text = path.to_string_lossy().into_owned();
                if ui
                    .add(egui::TextEdit::singleline(&mut text).desired_width(180.0))
                    .changed()
                {
                    *path = PathBuf::from(text);
                }
                if ui.button("…").clicked() {
                    if let Some(dir) = FileDialog::new().pick_folder() {
                        *path = dir;
                    }
                }
            });
        });
    }
}
