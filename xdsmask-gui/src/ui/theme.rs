//! Colors, visuals and styled widgets for the annotator.
//!
//! Follows the system dark/light preference. Panels use a slate tone so the
//! greyscale detector image stands apart from the controls.

use eframe::egui::{self, Color32, FontFamily, FontId, Rounding, Stroke, TextStyle, Visuals};

/// Accent colors shared by both modes.
pub mod accent {
    use eframe::egui::Color32;

    /// Selection, hover and mode highlights.
    pub const BLUE: Color32 = Color32::from_rgb(0x3b, 0x8e, 0xea);
    /// Accept and run.
    pub const GREEN: Color32 = Color32::from_rgb(0x22, 0xa0, 0x6b);
    /// Cancel and delete.
    pub const RED: Color32 = Color32::from_rgb(0xd9, 0x3f, 0x3f);
}

const ROUNDING: f32 = 3.0;

struct Palette {
    panel: Color32,
    faint: Color32,
    input: Color32,
    border: Color32,
    text: Color32,
    muted: Color32,
    hover: Color32,
    selection_alpha: f32,
}

const SLATE_DARK: Palette = Palette {
    panel: Color32::from_rgb(0x1c, 0x20, 0x26),
    faint: Color32::from_rgb(0x16, 0x19, 0x1e),
    input: Color32::from_rgb(0x26, 0x2b, 0x33),
    border: Color32::from_rgb(0x38, 0x3f, 0x4a),
    text: Color32::from_rgb(0xdd, 0xe2, 0xe8),
    muted: Color32::from_rgb(0x8a, 0x93, 0x9f),
    hover: Color32::from_rgb(0x30, 0x37, 0x41),
    selection_alpha: 0.35,
};

const SLATE_LIGHT: Palette = Palette {
    panel: Color32::from_rgb(0xf7, 0xf8, 0xfa),
    faint: Color32::from_rgb(0xee, 0xf0, 0xf3),
    input: Color32::from_rgb(0xff, 0xff, 0xff),
    border: Color32::from_rgb(0xc8, 0xce, 0xd6),
    text: Color32::from_rgb(0x1d, 0x23, 0x2b),
    muted: Color32::from_rgb(0x5e, 0x68, 0x74),
    hover: Color32::from_rgb(0xe2, 0xe6, 0xeb),
    selection_alpha: 0.25,
};

/// Apply visuals for the current dark/light mode plus fonts and spacing.
pub fn configure_style(ctx: &egui::Context) {
    let visuals = if ctx.style().visuals.dark_mode {
        build_visuals(Visuals::dark(), &SLATE_DARK)
    } else {
        build_visuals(Visuals::light(), &SLATE_LIGHT)
    };
    ctx.set_visuals(visuals);

    let mut style = (*ctx.style()).clone();
    style.text_styles = [
        (TextStyle::Small, FontId::new(10.0, FontFamily::Proportional)),
        (TextStyle::Body, FontId::new(13.0, FontFamily::Proportional)),
        (TextStyle::Button, FontId::new(13.0, FontFamily::Proportional)),
        (TextStyle::Heading, FontId::new(15.0, FontFamily::Proportional)),
        // Pixel coordinates and command lines.
        (TextStyle::Monospace, FontId::new(12.0, FontFamily::Monospace)),
    ]
    .into();
    style.spacing.item_spacing = egui::vec2(6.0, 5.0);
    style.spacing.button_padding = egui::vec2(8.0, 4.0);
    ctx.set_style(style);
}

fn build_visuals(mut visuals: Visuals, p: &Palette) -> Visuals {
    visuals.panel_fill = p.panel;
    visuals.window_fill = p.panel;
    visuals.faint_bg_color = p.faint;
    visuals.extreme_bg_color = p.input;

    let widgets = &mut visuals.widgets;
    widgets.noninteractive.bg_stroke = Stroke::new(1.0, p.border);
    widgets.noninteractive.fg_stroke = Stroke::new(1.0, p.muted);
    widgets.inactive.bg_fill = p.input;
    widgets.inactive.weak_bg_fill = p.input;
    widgets.inactive.fg_stroke = Stroke::new(1.0, p.text);
    widgets.hovered.bg_fill = p.hover;
    widgets.hovered.weak_bg_fill = p.hover;
    widgets.hovered.bg_stroke = Stroke::new(1.0, accent::BLUE);
    widgets.active.bg_fill = accent::BLUE;
    widgets.active.fg_stroke = Stroke::new(1.0, Color32::WHITE);
    for widget in [
        &mut widgets.noninteractive,
        &mut widgets.inactive,
        &mut widgets.hovered,
        &mut widgets.active,
        &mut widgets.open,
    ] {
        widget.rounding = Rounding::same(ROUNDING);
    }

    visuals.selection.bg_fill = accent::BLUE.gamma_multiply(p.selection_alpha);
    visuals.selection.stroke = Stroke::new(1.0, accent::BLUE);
    visuals
}

fn filled_button(text: &str, fill: Color32) -> egui::Button<'_> {
    egui::Button::new(egui::RichText::new(text).color(Color32::WHITE).strong())
        .fill(fill)
        .rounding(Rounding::same(ROUNDING))
}

/// Accept and run.
pub fn primary_button(text: &str) -> egui::Button<'_> {
    filled_button(text, accent::GREEN)
}

/// Cancel, delete and revert.
pub fn danger_button(text: &str) -> egui::Button<'_> {
    filled_button(text, accent::RED)
}

pub fn section_header(text: &str) -> egui::RichText {
    egui::RichText::new(text).size(12.0).strong()
}

/// Small muted label above a form field.
pub fn form_label(text: &str) -> egui::RichText {
    egui::RichText::new(text).size(10.5).weak()
}
