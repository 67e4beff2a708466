//! I/O error types.

use thiserror::Error;

/// Result type for external tool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while talking to external tools and files.
#[derive(Error, Debug)]
pub enum Error {
    /// File or process I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A referenced image or value is absent.
    #[error("input missing: {0}")]
    InputMissing(String),

    /// The converter did not produce a usable raster.
    #[error("image conversion failed: {0}")]
    ConversionFailed(String),

    /// An external program exited unsuccessfully.
    #[error("{program} failed ({status}): {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// Raster decoding error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Saved state could not be (de)serialized.
    #[error("state file error: {0}")]
    Json(#[from] serde_json::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] xdsmask_core::Error),
}
