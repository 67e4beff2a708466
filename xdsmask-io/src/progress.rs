//! Progress of a running processing job.
//!
//! The engine reports nothing on a channel we can read, so progress is
//! inferred from the files it leaves in the output directory: each stage has
//! a marker file, and the HTML summary grows a side-menu entry per section.

use std::fs;
use std::path::{Path, PathBuf};

/// Processing stages in the order the engine reaches them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Started,
    ImageAnalysis,
    Indexing,
    Integration,
    Scaling,
    Anisotropy,
    Reporting,
    Finished,
}

struct StageMarker {
    stage: Stage,
    file: &'static str,
    anchor: &'static str,
}

const MARKERS: [StageMarker; 8] = [
    StageMarker { stage: Stage::Started, file: "XDS.INP", anchor: "setup" },
    StageMarker { stage: Stage::ImageAnalysis, file: "COLSPOT.LP", anchor: "spotfinding" },
    StageMarker { stage: Stage::Indexing, file: "IDXREF.LP", anchor: "indexing" },
    StageMarker { stage: Stage::Integration, file: "INTEGRATE.LP", anchor: "integration" },
    StageMarker { stage: Stage::Scaling, file: "CORRECT.LP", anchor: "scaling" },
    StageMarker { stage: Stage::Anisotropy, file: "staraniso_alldata.log", anchor: "anisotropy" },
    StageMarker { stage: Stage::Reporting, file: "report.pdf", anchor: "report" },
    StageMarker { stage: Stage::Finished, file: "summary.tar.gz", anchor: "finished" },
];

/// HTML summary scanned for side-menu anchors.
pub const SUMMARY_FILE: &str = "summary.html";

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Started,
        Stage::ImageAnalysis,
        Stage::Indexing,
        Stage::Integration,
        Stage::Scaling,
        Stage::Anisotropy,
        Stage::Reporting,
        Stage::Finished,
    ];

    /// Position in [`Stage::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Completed fraction in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(self) -> f32 {
        self.index() as f32 / (Self::ALL.len() - 1) as f32
    }

    /// File whose presence marks this stage.
    #[must_use]
    pub fn marker_file(self) -> &'static str {
        MARKERS[self.index()].file
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Stage::Started => "started",
            Stage::ImageAnalysis => "image analysis",
            Stage::Indexing => "indexing",
            Stage::Integration => "integration",
            Stage::Scaling => "scaling",
            Stage::Anisotropy => "anisotropy analysis",
            Stage::Reporting => "reporting",
            Stage::Finished => "finished",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Furthest stage evidenced by the output directory.
#[must_use]
pub fn detect_stage(output_dir: &Path) -> Option<Stage> {
    let summary = fs::read_to_string(output_dir.join(SUMMARY_FILE)).unwrap_or_default();
    MARKERS
        .iter()
        .rev()
        .find(|m| {
            output_dir.join(m.file).exists()
                || summary.contains(&format!("href=\"#{}\"", m.anchor))
        })
        .map(|m| m.stage)
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// A later stage was reached.
    Advanced(Stage),
    /// Nothing new since the previous poll.
    Unchanged(Option<Stage>),
    Finished,
    /// No new stage within the poll budget.
    TimedOut(Option<Stage>),
}

/// Polls an output directory for stage markers.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    output_dir: PathBuf,
    stage: Option<Stage>,
    stalled_polls: u32,
    timeout_polls: u32,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, timeout_polls: u32) -> Self {
        Self {
            output_dir: output_dir.into(),
            stage: None,
            stalled_polls: 0,
            timeout_polls: timeout_polls.max(1),
        }
    }

    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.stage
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Inspects the output directory once.
    pub fn poll(&mut self) -> ProgressUpdate {
        let detected = detect_stage(&self.output_dir);
        if detected == Some(Stage::Finished) {
            self.stage = detected;
            return ProgressUpdate::Finished;
        }
        if detected > self.stage {
            self.stage = detected;
            self.stalled_polls = 0;
            if let Some(stage) = detected {
                log::info!("processing reached stage: {stage}");
                return ProgressUpdate::Advanced(stage);
            }
        }
        self.stalled_polls += 1;
        if self.stalled_polls >= self.timeout_polls {
            log::warn!(
                "no progress in {} after {} polls",
                self.output_dir.display(),
                self.stalled_polls
            );
            return ProgressUpdate::TimedOut(self.stage);
        }
        ProgressUpdate::Unchanged(self.stage)
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_fraction() {
        assert!(Stage::Started < Stage::Finished);
        assert_eq!(Stage::Started.fraction(), 0.0);
        assert_eq!(Stage::Finished.fraction(), 1.0);
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(MARKERS[i].stage, *stage);
        }
    }

    #[test]
    fn test_empty_dir_has_no_stage() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_stage(dir.path()), None);
    }

    #[test]
    fn test_furthest_marker_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("XDS.INP"), "").unwrap();
        fs::write(dir.path().join("IDXREF.LP"), "").unwrap();
        assert_eq!(detect_stage(dir.path()), Some(Stage::Indexing));
    }

    #[test]
    fn test_summary_anchor() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(SUMMARY_FILE),
            r##"<div class="menu"><a href="#setup">Setup</a><a href="#anisotropy">Aniso</a></div>"##,
        )
        .unwrap();
        assert_eq!(detect_stage(dir.path()), Some(Stage::Anisotropy));
    }
}
