//! Texture generation for the detector raster.

use egui::ColorImage;
use xdsmask_io::RasterHandle;

/// Convert a decoded raster to an egui image.
#[must_use]
pub fn raster_image(raster: &RasterHandle) -> ColorImage {
    let width = usize::try_from(raster.width).unwrap_or(0);
    let height = usize::try_from(raster.height).unwrap_or(0);
    if raster.rgba.len() != width.saturating_mul(height).saturating_mul(4) {
        log::warn!(
            "raster {} has {} bytes for {}x{}",
            raster.path.display(),
            raster.rgba.len(),
            width,
            height
        );
        return ColorImage::new([width.max(1), height.max(1)], egui::Color32::BLACK);
    }
    ColorImage::from_rgba_unmultiplied([width, height], &raster.rgba)
}
