//! Detector geometry, swing correction and the coordinate probe.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Scattering angle substituted for an exact zero before the Bragg formula.
const MIN_SCATTERING_ANGLE: f64 = 1.0e-6;

/// A 2-D point in detector pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Experimental geometry of a single detector image.
///
/// Populated from the image header, then overridden by explicit user input;
/// the last write wins. The `Default` values are the fallbacks used when the
/// header does not provide a field.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorGeometry {
    /// Crystal-to-detector distance in mm.
    pub distance_mm: f64,
    /// Wavelength in Ångström.
    pub wavelength_a: f64,
    /// Pixel size along X in mm.
    pub pixel_size_x_mm: f64,
    /// Pixel size along Y in mm.
    pub pixel_size_y_mm: f64,
    /// Number of pixels along X.
    pub pixel_count_x: u32,
    /// Number of pixels along Y.
    pub pixel_count_y: u32,
    /// Detector swing angle in degrees (signed).
    pub two_theta_deg: f64,
    /// Beam centre in pixels, before swing correction.
    pub beam_centre_px: Point,
}

impl Default for DetectorGeometry {
    fn default() -> Self {
        // Pilatus 6M
        Self {
            distance_mm: 200.0,
            wavelength_a: 1.0,
            pixel_size_x_mm: 0.172,
            pixel_size_y_mm: 0.172,
            pixel_count_x: 2463,
            pixel_count_y: 2527,
            two_theta_deg: 0.0,
            beam_centre_px: Point::new(1231.5, 1263.5),
        }
    }
}

impl DetectorGeometry {
    /// Check that every length is positive and finite.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let lengths = [
            ("distance", self.distance_mm),
            ("wavelength", self.wavelength_a),
            ("pixel size x", self.pixel_size_x_mm),
            ("pixel size y", self.pixel_size_y_mm),
        ];
        for (name, value) in lengths {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidGeometry(format!("{name} must be > 0, got {value}")));
            }
        }
        if self.pixel_count_x == 0 || self.pixel_count_y == 0 {
            return Err(Error::InvalidGeometry(format!(
                "pixel counts must be > 0, got {}x{}",
                self.pixel_count_x, self.pixel_count_y
            )));
        }
        if !self.two_theta_deg.is_finite() {
            return Err(Error::InvalidGeometry("two-theta is not finite".to_string()));
        }
        Ok(())
    }

    /// Geometric centre of the panel in pixels.
    #[must_use]
    pub fn panel_centre(&self) -> Point {
        Point::new(
            0.5 * f64::from(self.pixel_count_x),
            0.5 * f64::from(self.pixel_count_y),
        )
    }

    /// Horizontal beam displacement caused by the detector swing.
    #[must_use]
    pub fn x_offset(&self) -> f64 {
        two_theta_x_offset(self.distance_mm, self.two_theta_deg, self.pixel_size_x_mm)
    }

    /// Beam centre as displayed on the swung detector (X shifted, Y untouched).
    #[must_use]
    pub fn displayed_beam_centre(&self) -> Point {
        Point::new(self.beam_centre_px.x + self.x_offset(), self.beam_centre_px.y)
    }

    /// Inverse of [`Self::displayed_beam_centre`].
    #[must_use]
    pub fn beam_from_displayed(&self, displayed: Point) -> Point {
        Point::new(displayed.x - self.x_offset(), displayed.y)
    }

    /// Probe a clicked detector pixel.
    #[must_use]
    pub fn probe(&self, pixel: Point) -> ProbeReading {
        ProbeReading {
            pixel,
            resolution_a: resolution_at(self, pixel),
        }
    }
}

/// Result of a probe click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReading {
    /// Detector pixel that was clicked.
    pub pixel: Point,
    /// Resolution limit at that pixel in Ångström.
    pub resolution_a: f64,
}

/// X shift (pixels) of the displayed beam centre for a swung detector.
///
/// `h = d (1 - cos(|2θ|/2))`, `offset = 2 sqrt(2dh - h²) / pixel_size_x`,
/// signed like `two_theta_deg`. Exactly zero when the swing is zero.
#[must_use]
pub fn two_theta_x_offset(distance_mm: f64, two_theta_deg: f64, pixel_size_x_mm: f64) -> f64 {
    let half = 0.5 * two_theta_deg.abs().to_radians();
    let h = distance_mm * (1.0 - half.cos());
    // Rounding can push the radicand a hair below zero for tiny angles.
    let chord = 2.0 * (2.0 * distance_mm * h - h * h).max(0.0).sqrt();
    let offset = chord / pixel_size_x_mm;
    if two_theta_deg < 0.0 {
        -offset
    } else {
        offset
    }
}

/// Resolution (Å) at a detector pixel, measured from the displayed beam centre.
#[must_use]
pub fn resolution_at(geometry: &DetectorGeometry, pixel: Point) -> f64 {
    let radius = geometry.displayed_beam_centre().distance(pixel);
    let mut angle = (radius * geometry.pixel_size_y_mm / geometry.distance_mm).atan();
    if angle == 0.0 {
        angle = MIN_SCATTERING_ANGLE;
    }
    bragg_resolution(geometry.wavelength_a, angle)
}

/// d-spacing for a scattering angle `two_theta` in radians.
pub(crate) fn bragg_resolution(wavelength_a: f64, two_theta: f64) -> f64 {
    wavelength_a / (2.0 * (0.5 * two_theta).sin())
}

/// Scale mapping between a display raster (origin top-left) and detector pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasMapping {
    scale_x: f64,
    scale_y: f64,
}

impl CanvasMapping {
    /// Mapping for a `canvas_width` x `canvas_height` raster of the given panel.
    #[must_use]
    pub fn new(canvas_width: u32, canvas_height: u32, geometry: &DetectorGeometry) -> Self {
        Self {
            scale_x: f64::from(geometry.pixel_count_x) / f64::from(canvas_width.max(1)),
            scale_y: f64::from(geometry.pixel_count_y) / f64::from(canvas_height.max(1)),
        }
    }

    /// Canvas pixel to detector pixel.
    #[must_use]
    pub fn to_detector(&self, canvas: Point) -> Point {
        Point::new(canvas.x * self.scale_x, canvas.y * self.scale_y)
    }

    /// Detector pixel to canvas pixel.
    #[must_use]
    pub fn to_canvas(&self, detector: Point) -> Point {
        Point::new(detector.x / self.scale_x, detector.y / self.scale_y)
    }
}
