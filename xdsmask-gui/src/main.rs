//! xdsmask GUI application entry point.
//!
//! Usage: `xdsmask-gui [IMAGE | STATE.json]`

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod message;
mod pipeline;
mod state;
mod ui;
mod util;
mod viewer;

use std::path::PathBuf;

use app::AnnotatorApp;
use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::init();
    let initial = std::env::args_os().nth(1).map(PathBuf::from);
    let opts = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 900.0]),
        ..Default::default()
    };
    eframe::run_native(
        "xdsmask",
        opts,
        Box::new(move |cc| {
            ui::theme::configure_style(&cc.egui_ctx);
            let mut app = AnnotatorApp::default();
            if let Some(path) = initial {
                app.open_path(path);
            }
            Ok(Box::new(app))
        }),
    )
}
