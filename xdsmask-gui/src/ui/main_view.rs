//! Main view (central panel) rendering.

use eframe::egui;
use egui_plot::{Plot, PlotImage};
use xdsmask_core::{AnnotationEvent, Point};

use crate::app::AnnotatorApp;
use crate::util::{u32_to_f32, PlotFrame};
use crate::viewer::{draw_overlays, draw_pending_clicks, OverlayOptions};

impl AnnotatorApp {
    fn overlay_options(&self) -> OverlayOptions {
        OverlayOptions {
            show_rings: self.ui_state.show_rings,
            ring_count: self.ui_state.ring_count,
            show_ice_rings: self.ui_state.show_ice_rings,
            show_gaps: self.ui_state.show_gaps,
        }
    }

    /// Render the central panel with the raster and its overlays.
    pub(crate) fn render_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let (Some(tex), Some(raster)) = (&self.texture, &self.raster) else {
                let text = if self.processing.is_converting {
                    "Converting image..."
                } else {
                    "No image"
                };
                ui.centered_and_justified(|ui| ui.label(text));
                return;
            };

            let state = self.current_state();
            let frame = PlotFrame::new(raster.width, raster.height, &state.geometry);
            let options = self.overlay_options();
            let (draft, beam_clicks) = match &self.session {
                Some(session) => (Some(session.draft()), session.beam_clicks()),
                None => (None, &[][..]),
            };

            let (clicked, hovered) = Plot::new("plot")
                .data_aspect(1.0)
                .show_axes(false)
                .show_grid(false)
                .show(ui, |plot_ui| {
                    plot_ui.image(PlotImage::new(
                        tex,
                        frame.centre(),
                        [u32_to_f32(raster.width), u32_to_f32(raster.height)],
                    ));
                    draw_overlays(plot_ui, &frame, state, options);
                    if let Some(draft) = draft {
                        draw_pending_clicks(plot_ui, &frame, draft, beam_clicks);
                    }

                    let pointer = plot_ui
                        .pointer_coordinate()
                        .filter(|p| frame.contains(*p))
                        .map(|p| frame.to_detector(p));
                    let clicked = if plot_ui.response().clicked() {
                        pointer
                    } else {
                        None
                    };
                    (clicked, pointer)
                })
                .inner;

            self.handle_pointer(clicked, hovered);
        });
    }

    fn handle_pointer(&mut self, clicked: Option<Point>, hovered: Option<Point>) {
        if let Some(point) = hovered {
            self.cursor_info = Some(self.current_state().geometry.probe(point));
        }
        if let Some(point) = clicked {
            self.dispatch(AnnotationEvent::ClickAt(point));
        }
    }
}
