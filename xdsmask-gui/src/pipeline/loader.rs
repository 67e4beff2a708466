//! Image header loading worker.
//!
//! The header is read on a worker thread because the image-info tool can
//! take a moment on network file systems. Raster conversion runs separately
//! through `ConversionTask`.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use xdsmask_io::{read_image_header, ToolConfig};

use crate::message::AppMessage;

/// Reads the header of `image` and reports it via the channel.
pub fn load_header_worker(image: &Path, tx: &Sender<AppMessage>, config: &ToolConfig) {
    match read_image_header(config, image) {
        Ok(header) => {
            let _ = tx.send(AppMessage::HeaderLoaded(image.to_path_buf(), header));
        }
        Err(e) => {
            log::warn!("header read failed for {}: {e}", image.display());
            let _ = tx.send(AppMessage::HeaderError(e.to_string()));
        }
    }
}

/// Scratch location of the converted raster for `image`.
pub fn raster_path_for(image: &Path) -> PathBuf {
    let stem = image
        .file_stem()
        .map_or_else(|| "image".into(), |s| s.to_string_lossy());
    std::env::temp_dir().join(format!("xdsmask_{}_{stem}.png", std::process::id()))
}
