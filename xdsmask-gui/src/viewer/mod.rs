//! Visualization modules for the annotation canvas.

mod overlay;
mod texture;

pub use overlay::{draw_overlays, draw_pending_clicks, OverlayOptions};
pub use texture::raster_image;
