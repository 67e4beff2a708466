//! xdsmask-io: External collaborators of the annotation tool.
//!
//! This crate wraps the command-line programs xdsmask depends on: the
//! image-info tool that reports header geometry, the converter that renders
//! detector images to rasters, and the processing engine itself, together
//! with the progress tracker that follows a running job.
//!

pub mod command;
pub mod config;
pub mod convert;
mod error;
pub mod header;
pub mod job;
pub mod progress;
pub mod state_file;

pub use command::{CommandArg, ProcessingCommand, ProcessingParameters};
pub use config::ToolConfig;
pub use convert::{convert_image, read_raster, ConversionRequest, ConversionTask, RasterHandle, Slab};
pub use error::{Error, Result};
pub use header::{read_image_header, ImageHeader};
pub use job::ProcessingJob;
pub use progress::{detect_stage, ProgressTracker, ProgressUpdate, Stage};
pub use state_file::{load_state, save_state};
