//! Locations and timing of the external tools.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// External programs and polling behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Prints image header fields as `label [unit] = value` lines.
    pub image_info: PathBuf,
    /// Renders a detector image to a raster file.
    pub converter: PathBuf,
    /// The processing engine entry point.
    pub processing: PathBuf,
    /// Delay between progress polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Consecutive polls without progress before a job is declared stalled.
    pub timeout_polls: u32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            image_info: PathBuf::from("imginfo"),
            converter: PathBuf::from("adxv"),
            processing: PathBuf::from("process"),
            poll_interval_ms: 2000,
            // 2 s polls: one hour without a new stage.
            timeout_polls: 1800,
        }
    }
}

impl ToolConfig {
    /// Poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
