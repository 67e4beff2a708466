//! Application message types for async communication.
//!
//! Messages are sent from background worker threads to the main UI thread
//! via channels to report header reads, job progress and errors.

use std::path::PathBuf;

use xdsmask_io::{ImageHeader, Stage};

/// Messages sent from background workers to the UI thread.
pub enum AppMessage {
    /// Image header read for the given image.
    HeaderLoaded(PathBuf, ImageHeader),

    /// Header could not be read; the current geometry is kept.
    HeaderError(String),

    /// The processing job reached a new stage.
    JobProgress(Stage),

    /// The processing job ended successfully; contains the log path.
    JobFinished(PathBuf),

    /// The processing job failed, stalled or was stopped.
    JobError(String),
}
