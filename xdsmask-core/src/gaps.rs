//! Module-gap grid for tiled pixel-array detectors.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::DetectorGeometry;
use crate::token::{XdsParam, UNTRUSTED_RECTANGLE};
use crate::{Error, Result};

/// Parameters of the gap grid. Any change regenerates the whole grid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GapGridConfig {
    /// Number of vertical gaps (splitting the X axis).
    pub count_x: u32,
    /// Number of horizontal gaps (splitting the Y axis).
    pub count_y: u32,
    /// Dilation of gap positions about the panel centre, in percent.
    pub scale_x_pct: f64,
    pub scale_y_pct: f64,
    /// Shift of gap positions, in percent of the panel extent.
    pub offset_x_pct: f64,
    pub offset_y_pct: f64,
    /// Gap widths in pixels.
    pub width_x: f64,
    pub width_y: f64,
}

impl Default for GapGridConfig {
    fn default() -> Self {
        Self {
            count_x: 0,
            count_y: 0,
            scale_x_pct: 100.0,
            scale_y_pct: 100.0,
            offset_x_pct: 0.0,
            offset_y_pct: 0.0,
            width_x: 7.0,
            width_y: 17.0,
        }
    }
}

/// Most gaps allowed along one axis.
pub const MAX_GAP_COUNT: u32 = 64;

impl GapGridConfig {
    /// Check counts, widths and percentages.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] for a count above [`MAX_GAP_COUNT`],
    /// a negative width or a non-finite value.
    pub fn validate(&self) -> Result<()> {
        if self.count_x > MAX_GAP_COUNT || self.count_y > MAX_GAP_COUNT {
            return Err(Error::InvalidGeometry(format!(
                "gap count {}x{} exceeds {MAX_GAP_COUNT}",
                self.count_x, self.count_y
            )));
        }
        let values = [
            self.scale_x_pct,
            self.scale_y_pct,
            self.offset_x_pct,
            self.offset_y_pct,
            self.width_x,
            self.width_y,
        ];
        if values.iter().any(|v| !v.is_finite()) || self.width_x < 0.0 || self.width_y < 0.0 {
            return Err(Error::InvalidGeometry(
                "gap widths must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the grid produces no gaps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count_x == 0 && self.count_y == 0
    }
}

/// A single gap rectangle in detector pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapRectangle {
    pub x1: f64,
    pub x2: f64,
    pub y1: f64,
    pub y2: f64,
}

impl GapRectangle {
    /// Exported as an untrusted rectangle.
    #[must_use]
    pub fn to_param(&self) -> XdsParam {
        XdsParam::pixels(UNTRUSTED_RECTANGLE, &[self.x1, self.x2, self.y1, self.y2])
    }
}

/// Regenerate the full gap set: X gaps first, then Y gaps.
#[must_use]
pub fn compute_gaps(geometry: &DetectorGeometry, config: &GapGridConfig) -> Vec<GapRectangle> {
    let width = f64::from(geometry.pixel_count_x);
    let height = f64::from(geometry.pixel_count_y);
    let count_x = config.count_x.min(MAX_GAP_COUNT);
    let count_y = config.count_y.min(MAX_GAP_COUNT);
    let mut gaps = Vec::new();

    for centre in gap_centres(count_x, width, config.scale_x_pct, config.offset_x_pct) {
        gaps.push(GapRectangle {
            x1: centre - 0.5 * config.width_x,
            x2: centre + 0.5 * config.width_x,
            y1: 0.0,
            y2: height,
        });
    }
    for centre in gap_centres(count_y, height, config.scale_y_pct, config.offset_y_pct) {
        gaps.push(GapRectangle {
            x1: 0.0,
            x2: width,
            y1: centre - 0.5 * config.width_y,
            y2: centre + 0.5 * config.width_y,
        });
    }
    gaps
}

/// Gap centre lines along one axis of extent `total`.
fn gap_centres(
    count: u32,
    total: f64,
    scale_pct: f64,
    offset_pct: f64,
) -> impl Iterator<Item = f64> {
    let scale = scale_pct / 100.0;
    let offset = offset_pct / 100.0;
    let parts = f64::from(count) + 1.0;
    (1..=count).map(move |k| {
        let frac = f64::from(k) * total / parts;
        let corrected = frac / total * scale * total - 0.5 * (scale - 1.0) * total;
        corrected + offset * total
    })
}
