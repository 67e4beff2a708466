//! Image header values reported by the image-info tool.
//!
//! The tool prints one field per line in the form `label [unit] = value`.
//! Each recognised label updates a single geometry field; unrecognised
//! lines are ignored and `n/a` values leave the fallback in place.

use std::path::Path;
use std::process::Command;

use xdsmask_core::{DetectorGeometry, Point};

use crate::config::ToolConfig;
use crate::error::{Error, Result};

/// Header fields relevant to the annotation geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageHeader {
    pub distance_mm: Option<f64>,
    pub wavelength_a: Option<f64>,
    pub pixel_size_x_mm: Option<f64>,
    pub pixel_size_y_mm: Option<f64>,
    pub pixel_count_x: Option<u32>,
    pub pixel_count_y: Option<u32>,
    pub beam_x_px: Option<f64>,
    pub beam_y_px: Option<f64>,
    pub oscillation_deg: Option<f64>,
    pub overload: Option<f64>,
    pub two_theta_deg: Option<f64>,
    /// Labels whose value was reported as unavailable.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Distance,
    Wavelength,
    PixelSizeX,
    PixelSizeY,
    PixelCountX,
    PixelCountY,
    BeamX,
    BeamY,
    Oscillation,
    Overload,
    TwoTheta,
}

fn classify(label: &str, unit: &str) -> Option<Field> {
    let label = label.to_ascii_lowercase();
    let unit = unit.to_ascii_lowercase();
    let field = if label.starts_with("distance") {
        Field::Distance
    } else if label.starts_with("wavelength") {
        Field::Wavelength
    } else if label.starts_with("pixel size in x") {
        Field::PixelSizeX
    } else if label.starts_with("pixel size in y") {
        Field::PixelSizeY
    } else if label.starts_with("number of pixels in x") {
        Field::PixelCountX
    } else if label.starts_with("number of pixels in y") {
        Field::PixelCountY
    } else if (label.starts_with("beam centre in x") || label.starts_with("beam center in x"))
        && unit == "pixel"
    {
        Field::BeamX
    } else if (label.starts_with("beam centre in y") || label.starts_with("beam center in y"))
        && unit == "pixel"
    {
        Field::BeamY
    } else if label.starts_with("oscillation-angle") {
        Field::Oscillation
    } else if label.starts_with("overload value") {
        Field::Overload
    } else if label.starts_with("2-theta") {
        Field::TwoTheta
    } else {
        return None;
    };
    Some(field)
}

/// Splits `label [unit] = value` into its parts.
fn split_line(line: &str) -> Option<(&str, &str, &str)> {
    let (lhs, value) = line.split_once('=')?;
    let (label, unit) = match lhs.split_once('[') {
        Some((label, rest)) => (label, rest.split(']').next().unwrap_or_default()),
        None => (lhs, ""),
    };
    Some((label.trim(), unit.trim(), value.trim()))
}

impl ImageHeader {
    /// Parses image-info output.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut header = Self::default();
        for line in text.lines() {
            let Some((label, unit, value)) = split_line(line) else {
                continue;
            };
            let Some(field) = classify(label, unit) else {
                continue;
            };
            let number = value
                .split_whitespace()
                .next()
                .and_then(|token| token.parse::<f64>().ok())
                .filter(|v| v.is_finite());
            let Some(number) = number else {
                log::warn!("header value for '{label}' unavailable ({value}), keeping default");
                header.missing.push(label.to_string());
                continue;
            };
            header.set(field, number);
        }
        header
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set(&mut self, field: Field, value: f64) {
        let count = || (value >= 1.0).then(|| value.round() as u32);
        match field {
            Field::Distance => self.distance_mm = Some(value),
            Field::Wavelength => self.wavelength_a = Some(value),
            Field::PixelSizeX => self.pixel_size_x_mm = Some(value),
            Field::PixelSizeY => self.pixel_size_y_mm = Some(value),
            Field::PixelCountX => self.pixel_count_x = count(),
            Field::PixelCountY => self.pixel_count_y = count(),
            Field::BeamX => self.beam_x_px = Some(value),
            Field::BeamY => self.beam_y_px = Some(value),
            Field::Oscillation => self.oscillation_deg = Some(value),
            Field::Overload => self.overload = Some(value),
            Field::TwoTheta => self.two_theta_deg = Some(value),
        }
    }

    /// Overwrites the geometry fields this header provides.
    ///
    /// A missing beam centre falls back to the panel centre of the
    /// (possibly updated) pixel counts.
    pub fn apply(&self, geometry: &mut DetectorGeometry) {
        if let Some(v) = self.distance_mm {
            geometry.distance_mm = v;
        }
        if let Some(v) = self.wavelength_a {
            geometry.wavelength_a = v;
        }
        if let Some(v) = self.pixel_size_x_mm {
            geometry.pixel_size_x_mm = v;
        }
        if let Some(v) = self.pixel_size_y_mm {
            geometry.pixel_size_y_mm = v;
        }
        if let Some(v) = self.pixel_count_x {
            geometry.pixel_count_x = v;
        }
        if let Some(v) = self.pixel_count_y {
            geometry.pixel_count_y = v;
        }
        if let Some(v) = self.two_theta_deg {
            geometry.two_theta_deg = v;
        }
        let fallback = geometry.panel_centre();
        geometry.beam_centre_px = Point::new(
            self.beam_x_px.unwrap_or(fallback.x),
            self.beam_y_px.unwrap_or(fallback.y),
        );
    }

    /// Geometry built from the defaults overlaid with this header.
    #[must_use]
    pub fn to_geometry(&self) -> DetectorGeometry {
        let mut geometry = DetectorGeometry::default();
        self.apply(&mut geometry);
        geometry
    }
}

/// Runs the image-info tool on `image` and parses its output.
///
/// # Errors
/// `InputMissing` if the image does not exist, `ToolFailed` if the tool
/// exits unsuccessfully, `Io` if it cannot be started.
pub fn read_image_header(config: &ToolConfig, image: &Path) -> Result<ImageHeader> {
    if !image.exists() {
        return Err(Error::InputMissing(image.display().to_string()));
    }
    log::debug!("{} {}", config.image_info.display(), image.display());
    let output = Command::new(&config.image_info).arg(image).output()?;
    if !output.status.success() {
        return Err(Error::ToolFailed {
            program: config.image_info.display().to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let header = ImageHeader::parse(&String::from_utf8_lossy(&output.stdout));
    log::info!(
        "read header of {} ({} fields unavailable)",
        image.display(),
        header.missing.len()
    );
    Ok(header)
}
