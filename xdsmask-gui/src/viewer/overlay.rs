//! Plot overlays: masks, rings, module gaps and the beam centre.

use egui::{Align2, Color32, Stroke};
use egui_plot::{Line, LineStyle, MarkerShape, PlotPoint, PlotPoints, PlotUi, Points, Polygon, Text};
use xdsmask_core::{
    compute_ice_rings, compute_rings, GapRectangle, MaskOrigin, MaskRegion, MaskState, Point,
    ResolutionRing, RingKind, ShapeDraft,
};

use crate::util::PlotFrame;

const RING_SEGMENTS: u32 = 180;

const MASK_COLOR: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);
const PREEXISTING_COLOR: Color32 = Color32::from_rgb(0xf5, 0x9e, 0x0b);
const DRAFT_COLOR: Color32 = Color32::from_rgb(0xfa, 0xcc, 0x15);
const RING_COLOR: Color32 = Color32::from_rgb(0x4a, 0x9e, 0xff);
const ICE_COLOR: Color32 = Color32::from_rgb(0x22, 0xd3, 0xee);
const GAP_COLOR: Color32 = Color32::from_rgb(0xa8, 0x55, 0xf7);
const BEAM_COLOR: Color32 = Color32::from_rgb(0x10, 0xb9, 0x81);

/// Which overlays to draw.
#[derive(Debug, Clone, Copy)]
pub struct OverlayOptions {
    pub show_rings: bool,
    pub ring_count: u32,
    pub show_ice_rings: bool,
    pub show_gaps: bool,
}

fn fill(color: Color32) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), 48)
}

/// Closed outline of a mask in plot space.
pub fn mask_outline(frame: &PlotFrame, region: &MaskRegion) -> Vec<[f64; 2]> {
    frame.to_plot_points(&region.outline())
}

/// Corners of a gap rectangle in plot space.
pub fn gap_outline(frame: &PlotFrame, gap: &GapRectangle) -> Vec<[f64; 2]> {
    frame.to_plot_points(&[
        Point::new(gap.x1, gap.y1),
        Point::new(gap.x2, gap.y1),
        Point::new(gap.x2, gap.y2),
        Point::new(gap.x1, gap.y2),
    ])
}

pub fn ring_label(ring: &ResolutionRing) -> String {
    format!("{:.2} Å", ring.resolution_a)
}

fn draw_ring(plot_ui: &mut PlotUi, frame: &PlotFrame, ring: &ResolutionRing) {
    let mut points = frame.to_plot_points(&ring.shape.outline(RING_SEGMENTS));
    if let Some(first) = points.first().copied() {
        points.push(first);
    }
    let line = Line::new(PlotPoints::new(points)).width(1.0);
    let line = match ring.kind {
        RingKind::Resolution => line.color(RING_COLOR),
        RingKind::Ice => line.color(ICE_COLOR).style(LineStyle::dashed_loose()),
    };
    plot_ui.line(line);
    if ring.kind == RingKind::Resolution {
        let [x, y] = frame.to_plot(ring.shape.label_anchor());
        plot_ui.text(
            Text::new(PlotPoint::new(x, y), ring_label(ring))
                .color(RING_COLOR)
                .anchor(Align2::CENTER_BOTTOM),
        );
    }
}

/// Render every overlay for the current state.
pub fn draw_overlays(
    plot_ui: &mut PlotUi,
    frame: &PlotFrame,
    state: &MaskState,
    options: OverlayOptions,
) {
    let geometry = &state.geometry;
    if options.show_rings {
        for ring in compute_rings(geometry, options.ring_count) {
            draw_ring(plot_ui, frame, &ring);
        }
    }
    if options.show_ice_rings {
        for ring in compute_ice_rings(geometry) {
            draw_ring(plot_ui, frame, &ring);
        }
    }
    if options.show_gaps {
        for gap in state.gap_rectangles() {
            plot_ui.polygon(
                Polygon::new(gap_outline(frame, &gap))
                    .stroke(Stroke::new(1.0, GAP_COLOR))
                    .fill_color(fill(GAP_COLOR)),
            );
        }
    }
    for mask in state.masks.iter() {
        let color = match mask.origin {
            MaskOrigin::Preexisting => PREEXISTING_COLOR,
            MaskOrigin::Session => MASK_COLOR,
        };
        plot_ui.polygon(
            Polygon::new(mask_outline(frame, &mask.region))
                .stroke(Stroke::new(1.5, color))
                .fill_color(fill(color)),
        );
        let (x1, _, y1, _) = mask.region.bounds();
        let [lx, ly] = frame.to_plot(Point::new(x1, y1));
        plot_ui.text(
            Text::new(PlotPoint::new(lx, ly), format!("#{}", mask.id))
                .color(color)
                .anchor(Align2::LEFT_TOP),
        );
    }

    let beam = frame.to_plot(geometry.displayed_beam_centre());
    plot_ui.points(
        Points::new(vec![beam])
            .color(BEAM_COLOR)
            .shape(MarkerShape::Cross)
            .radius(6.0),
    );
}

/// Render clicks collected towards a shape or a beam fit.
pub fn draw_pending_clicks(plot_ui: &mut PlotUi, frame: &PlotFrame, draft: &ShapeDraft, beam_clicks: &[Point]) {
    for clicks in [draft.clicks(), beam_clicks] {
        if clicks.is_empty() {
            continue;
        }
        let points = frame.to_plot_points(clicks);
        if points.len() > 1 {
            plot_ui.line(Line::new(PlotPoints::new(points.clone())).color(DRAFT_COLOR));
        }
        plot_ui.points(
            Points::new(points)
                .color(DRAFT_COLOR)
                .shape(MarkerShape::Circle)
                .radius(3.0),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdsmask_core::DetectorGeometry;

    fn frame() -> PlotFrame {
        let geometry = DetectorGeometry {
            pixel_count_x: 1000,
            pixel_count_y: 1000,
            ..DetectorGeometry::default()
        };
        PlotFrame::new(500, 500, &geometry)
    }

    #[test]
    fn test_gap_outline_scaled_and_flipped() {
        let gap = GapRectangle {
            x1: 100.0,
            x2: 200.0,
            y1: 0.0,
            y2: 1000.0,
        };
        let outline = gap_outline(&frame(), &gap);
        assert_eq!(outline[0], [50.0, 500.0]);
        assert_eq!(outline[2], [100.0, 0.0]);
    }

    #[test]
    fn test_rectangle_outline() {
        let region = MaskRegion::rectangle(Point::new(0.0, 0.0), Point::new(200.0, 100.0));
        let outline = mask_outline(&frame(), &region);
        assert_eq!(outline.len(), 4);
        assert!(outline.contains(&[100.0, 450.0]));
    }
}
