//! Coordinate and numeric conversion utilities for xdsmask-gui.
//!
//! The raster is shown in plot space with its top-left corner at
//! `(0, height)` so that plot Y grows upwards while raster rows grow down.

use egui_plot::PlotPoint;
use xdsmask_core::{CanvasMapping, DetectorGeometry, Point};

/// Maps between plot coordinates and detector pixels for one raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotFrame {
    mapping: CanvasMapping,
    raster_width: f64,
    raster_height: f64,
}

impl PlotFrame {
    pub fn new(raster_width: u32, raster_height: u32, geometry: &DetectorGeometry) -> Self {
        Self {
            mapping: CanvasMapping::new(raster_width, raster_height, geometry),
            raster_width: f64::from(raster_width),
            raster_height: f64::from(raster_height),
        }
    }

    /// Centre of the raster in plot space.
    pub fn centre(&self) -> PlotPoint {
        PlotPoint::new(0.5 * self.raster_width, 0.5 * self.raster_height)
    }

    /// Whether a plot position lies on the raster.
    pub fn contains(&self, plot: PlotPoint) -> bool {
        (0.0..self.raster_width).contains(&plot.x) && (0.0..self.raster_height).contains(&plot.y)
    }

    pub fn to_detector(&self, plot: PlotPoint) -> Point {
        self.mapping
            .to_detector(Point::new(plot.x, self.raster_height - plot.y))
    }

    pub fn to_plot(&self, detector: Point) -> [f64; 2] {
        let canvas = self.mapping.to_canvas(detector);
        [canvas.x, self.raster_height - canvas.y]
    }

    /// Converts a detector-space polyline.
    pub fn to_plot_points(&self, points: &[Point]) -> Vec<[f64; 2]> {
        points.iter().map(|p| self.to_plot(*p)).collect()
    }
}

/// Convert u32 to f32 with allowed precision loss.
#[allow(clippy::cast_precision_loss)]
pub fn u32_to_f32(value: u32) -> f32 {
    value as f32
}
