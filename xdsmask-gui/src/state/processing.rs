//! Processing state for background operations.

use xdsmask_io::Stage;

/// Tracks the state of background loading and processing operations.
pub struct ProcessingState {
    /// Whether the image header is being read.
    pub is_reading_header: bool,
    /// Whether the image is being converted to a raster.
    pub is_converting: bool,
    /// Whether a processing job is running.
    pub job_running: bool,
    /// Last stage reported by the running job.
    pub job_stage: Option<Stage>,
    /// User-facing status message.
    pub status_text: String,
}

impl ProcessingState {
    /// Whether any background work is in flight.
    pub fn is_busy(&self) -> bool {
        self.is_reading_header || self.is_converting || self.job_running
    }

    /// Job progress from 0.0 to 1.0.
    pub fn job_progress(&self) -> f32 {
        self.job_stage.map_or(0.0, Stage::fraction)
    }
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            is_reading_header: false,
            is_converting: false,
            job_running: false,
            job_stage: None,
            status_text: "Ready".to_string(),
        }
    }
}
