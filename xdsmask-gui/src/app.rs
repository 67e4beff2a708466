//! Main application state and logic.
//!
//! `AnnotatorApp` owns the committed mask state, the open annotation
//! session, the background conversion and the processing job channel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use anyhow::Context as _;
use eframe::egui;
use xdsmask_core::{
    AnnotationEvent, AnnotationSession, CancelScope, DetectorGeometry, MaskState, Mode, Notice,
    ProbeReading, SessionPhase,
};
use xdsmask_io::{
    load_state, save_state, ConversionRequest, ConversionTask, ProcessingCommand,
    ProcessingParameters, RasterHandle, ToolConfig,
};

use crate::message::AppMessage;
use crate::pipeline::{load_header_worker, raster_path_for, run_job_worker, JobWorkerConfig};
use crate::state::{ProcessingState, UiState};
use crate::viewer::raster_image;

/// Main application state.
pub struct AnnotatorApp {
    /// External tool locations.
    pub(crate) config: ToolConfig,
    /// Image currently displayed.
    pub(crate) image_path: Option<PathBuf>,
    /// State file last loaded or saved.
    pub(crate) state_path: Option<PathBuf>,

    /// State as of the last accepted or cancelled session.
    pub(crate) committed: MaskState,
    /// Session in progress, if any.
    pub(crate) session: Option<AnnotationSession>,

    /// Overload threshold passed to the converter.
    pub(crate) overload: Option<f64>,
    pub(crate) raster: Option<RasterHandle>,
    pub(crate) conversion: Option<ConversionTask>,
    pub(crate) texture: Option<egui::TextureHandle>,

    /// Processing engine options.
    pub(crate) params: ProcessingParameters,
    /// Last probe reading under the pointer.
    pub(crate) cursor_info: Option<ProbeReading>,

    /// UI display state.
    pub(crate) ui_state: UiState,
    /// Background work state.
    pub(crate) processing: ProcessingState,
    job_cancel: Option<Arc<AtomicBool>>,

    /// Message receiver for async operations.
    pub(crate) rx: Receiver<AppMessage>,
    /// Message sender for async operations.
    pub(crate) tx: Sender<AppMessage>,
}

impl Default for AnnotatorApp {
    fn default() -> Self {
        let (tx, rx) = channel();
        Self {
            config: ToolConfig::default(),
            image_path: None,
            state_path: None,
            committed: MaskState::default(),
            session: None,
            overload: None,
            raster: None,
            conversion: None,
            texture: None,
            params: ProcessingParameters::default(),
            cursor_info: None,
            ui_state: UiState::default(),
            processing: ProcessingState::default(),
            job_cancel: None,
            rx,
            tx,
        }
    }
}

impl AnnotatorApp {
    /// Open an image or a saved state file.
    pub fn open_path(&mut self, path: PathBuf) {
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            if let Err(e) = self.load_state_file(&path) {
                self.report_error(&e);
            }
        } else {
            self.open_image(path);
        }
    }

    /// Read the header and convert the image in the background.
    pub fn open_image(&mut self, path: PathBuf) {
        self.image_path = Some(path.clone());
        if self.params.image_dir.as_os_str().is_empty() {
            if let Some(dir) = path.parent() {
                self.params.image_dir = dir.to_path_buf();
            }
        }

        self.processing.is_reading_header = true;
        let tx = self.tx.clone();
        let config = self.config.clone();
        let header_path = path.clone();
        thread::spawn(move || load_header_worker(&header_path, &tx, &config));

        self.start_conversion(&path);
    }

    /// (Re)convert the current image with the current overload threshold.
    pub fn start_conversion(&mut self, image: &Path) {
        let mut request = ConversionRequest::new(image, raster_path_for(image));
        if let Some(overload) = self.overload {
            request = request.with_overload(overload);
        }
        self.processing.is_converting = true;
        self.processing.status_text = format!("Converting {}...", image.display());
        self.conversion = Some(ConversionTask::spawn(self.config.converter.clone(), request));
    }

    /// State the canvas shows: the session's working copy, else the committed one.
    pub fn current_state(&self) -> &MaskState {
        self.session
            .as_ref()
            .map_or(&self.committed, AnnotationSession::state)
    }

    pub fn session_open(&self) -> bool {
        self.session.is_some()
    }

    /// Click mode of the open session; a new session starts in probe mode.
    pub fn mode(&self) -> Mode {
        self.session
            .as_ref()
            .map_or_else(Mode::default, AnnotationSession::mode)
    }

    /// Feed one event to the session, opening one on the committed state if needed.
    pub fn dispatch(&mut self, event: AnnotationEvent) {
        if matches!(event, AnnotationEvent::Accept | AnnotationEvent::Cancel(_))
            && self.session.is_none()
        {
            return;
        }
        let session = match self.session.take() {
            Some(session) => session,
            None => AnnotationSession::new(self.committed.clone())
                .handle(AnnotationEvent::ShapeKindChanged(self.ui_state.shape_kind)),
        };
        let session = session.handle(event);

        if let Some(notice) = session.notice() {
            if let Notice::Probed(reading) = notice {
                self.cursor_info = Some(*reading);
            }
            self.processing.status_text = notice.to_string();
        }

        match session.phase() {
            SessionPhase::Open => self.session = Some(session),
            phase => {
                if let Some(outcome) = session.into_outcome() {
                    self.committed = outcome;
                }
                self.ui_state.geometry_form.reset(&self.committed.geometry);
                self.ui_state.gap_form = self.committed.gaps.clone();
                self.processing.status_text = match phase {
                    SessionPhase::Accepted => {
                        format!("Accepted {} masks", self.committed.masks.len())
                    }
                    _ => "Session cancelled".to_string(),
                };
            }
        }
    }

    pub fn accept(&mut self) {
        self.dispatch(AnnotationEvent::Accept);
    }

    pub fn cancel(&mut self, scope: CancelScope) {
        self.ui_state.show_cancel_prompt = false;
        self.dispatch(AnnotationEvent::Cancel(scope));
    }

    /// Apply an edited geometry through the session.
    pub fn apply_geometry(&mut self, geometry: DetectorGeometry) {
        self.ui_state.geometry_form.dirty = false;
        self.dispatch(AnnotationEvent::GeometryChanged(geometry));
        let current = self.current_state().geometry.clone();
        self.ui_state.geometry_form.reset(&current);
    }

    /// Install header geometry as the caller's state. It is not a session
    /// edit: an open session is rebased so that cancelling keeps it.
    pub fn apply_header_geometry(&mut self, geometry: DetectorGeometry) {
        if let Err(e) = self.committed.set_geometry(geometry.clone()) {
            log::warn!("header geometry rejected: {e}");
            self.processing.status_text = format!("Header geometry rejected: {e}");
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.rebase_geometry(geometry) {
                log::warn!("could not rebase session geometry: {e}");
            }
        }
        let current = self.current_state().geometry.clone();
        self.ui_state.geometry_form.reset(&current);
        self.processing.status_text = "Header read".to_string();
    }

    /// Command line for the current state and parameters.
    pub fn processing_command(&self) -> ProcessingCommand {
        ProcessingCommand::assemble(
            self.config.processing.clone(),
            &self.params,
            &self.current_state().tokens(),
        )
    }

    /// Launch the processing engine on the committed state.
    pub fn run_processing(&mut self) {
        if self.processing.job_running {
            return;
        }
        if self.params.output_dir.as_os_str().is_empty() {
            self.processing.status_text = "Choose an output directory first".to_string();
            return;
        }
        let command = ProcessingCommand::assemble(
            self.config.processing.clone(),
            &self.params,
            &self.committed.tokens(),
        );
        let worker = JobWorkerConfig {
            command,
            output_dir: self.params.output_dir.clone(),
            poll_interval: self.config.poll_interval(),
            timeout_polls: self.config.timeout_polls,
        };
        let cancel = Arc::new(AtomicBool::new(false));
        self.job_cancel = Some(Arc::clone(&cancel));
        self.processing.job_running = true;
        self.processing.job_stage = None;
        self.processing.status_text = "Processing started".to_string();

        let tx = self.tx.clone();
        thread::spawn(move || run_job_worker(&worker, &tx, &cancel));
    }

    pub fn stop_processing(&mut self) {
        if let Some(flag) = &self.job_cancel {
            flag.store(true, Ordering::SeqCst);
        }
    }

    pub fn load_state_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let state = load_state(path)
            .with_context(|| format!("could not load {}", path.display()))?;
        self.session = None;
        self.ui_state.geometry_form.reset(&state.geometry);
        self.ui_state.gap_form = state.gaps.clone();
        self.committed = state;
        self.state_path = Some(path.to_path_buf());
        self.processing.status_text = format!("Loaded {}", path.display());
        Ok(())
    }

    /// Saves the committed state; an open session must be accepted first.
    pub fn save_state_file(&mut self, path: &Path) -> anyhow::Result<()> {
        save_state(path, &self.committed)
            .with_context(|| format!("could not save {}", path.display()))?;
        self.state_path = Some(path.to_path_buf());
        self.processing.status_text = format!("Saved {}", path.display());
        Ok(())
    }

    pub(crate) fn report_error(&mut self, error: &anyhow::Error) {
        log::error!("{error:#}");
        self.processing.status_text = format!("Error: {error:#}");
    }

    /// Handle pending messages from async workers and the conversion task.
    pub fn handle_messages(&mut self, ctx: &egui::Context) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                AppMessage::HeaderLoaded(path, header) => {
                    self.processing.is_reading_header = false;
                    if self.image_path.as_deref() != Some(path.as_path()) {
                        continue;
                    }
                    let mut geometry = self.committed.geometry.clone();
                    header.apply(&mut geometry);
                    if self.overload.is_none() {
                        self.overload = header.overload;
                    }
                    self.apply_header_geometry(geometry);
                    if !header.missing.is_empty() {
                        self.processing.status_text = format!(
                            "Header read; defaults kept for: {}",
                            header.missing.join(", ")
                        );
                    }
                }
                AppMessage::HeaderError(e) => {
                    self.processing.is_reading_header = false;
                    self.processing.status_text = format!("Header unavailable, using defaults: {e}");
                }
                AppMessage::JobProgress(stage) => {
                    self.processing.job_stage = Some(stage);
                    self.processing.status_text = format!("Processing: {stage}");
                }
                AppMessage::JobFinished(log_path) => {
                    self.processing.job_running = false;
                    self.job_cancel = None;
                    self.processing.job_stage = Some(xdsmask_io::Stage::Finished);
                    self.processing.status_text =
                        format!("Processing finished, log: {}", log_path.display());
                }
                AppMessage::JobError(e) => {
                    self.processing.job_running = false;
                    self.job_cancel = None;
                    self.processing.status_text = format!("Error: {e}");
                }
            }
        }

        let finished = self.conversion.as_mut().and_then(ConversionTask::try_result);
        if let Some(result) = finished {
            self.conversion = None;
            self.processing.is_converting = false;
            match result {
                Ok(raster) => {
                    self.texture = Some(ctx.load_texture(
                        "raster",
                        raster_image(&raster),
                        egui::TextureOptions::LINEAR,
                    ));
                    self.processing.status_text =
                        format!("Loaded {} x {} raster", raster.width, raster.height);
                    self.raster = Some(raster);
                }
                Err(e) => {
                    log::warn!("{e}");
                    self.processing.status_text = format!("Error: {e}");
                }
            }
        }
    }
}

impl eframe::App for AnnotatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_messages(ctx);
        let current = self.current_state().geometry.clone();
        self.ui_state.geometry_form.sync(&current);

        self.render_top_panel(ctx);
        self.render_side_panel(ctx);
        self.render_central_panel(ctx);
        self.render_cancel_prompt(ctx);
        self.render_command_window(ctx);

        if self.processing.is_busy() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use xdsmask_core::{GapGridConfig, Point, ShapeKind};
    use xdsmask_io::ImageHeader;

    fn click(app: &mut AnnotatorApp, x: f64, y: f64) {
        app.dispatch(AnnotationEvent::ClickAt(Point::new(x, y)));
    }

    #[test]
    fn test_first_event_opens_session() {
        let mut app = AnnotatorApp::default();
        assert!(!app.session_open());
        click(&mut app, 1231.5, 1763.5);
        assert!(app.session_open());
        assert!(app.cursor_info.is_some());
    }

    #[test]
    fn test_accept_commits_masks() {
        let mut app = AnnotatorApp::default();
        app.dispatch(AnnotationEvent::ModeChanged(Mode::Draw));
        app.dispatch(AnnotationEvent::ShapeKindChanged(ShapeKind::Ellipse));
        click(&mut app, 10.0, 10.0);
        click(&mut app, 40.0, 30.0);
        assert!(app.committed.masks.is_empty());
        app.accept();
        assert!(!app.session_open());
        assert_eq!(app.committed.masks.len(), 1);
        assert!(app.processing.status_text.starts_with("Accepted"));
    }

    #[test]
    fn test_cancel_reverts_gaps() {
        let mut app = AnnotatorApp::default();
        app.dispatch(AnnotationEvent::GapsChanged(GapGridConfig {
            count_y: 3,
            ..GapGridConfig::default()
        }));
        assert_eq!(app.current_state().gaps.count_y, 3);
        app.cancel(CancelScope::RevertAll);
        assert_eq!(app.committed.gaps, GapGridConfig::default());
        assert_eq!(app.ui_state.gap_form, GapGridConfig::default());
    }

    #[test]
    fn test_new_session_uses_selected_shape() {
        let mut app = AnnotatorApp::default();
        app.ui_state.shape_kind = ShapeKind::Quadrilateral;
        app.dispatch(AnnotationEvent::ModeChanged(Mode::Draw));
        assert_eq!(app.mode(), Mode::Draw);
        let draft = app.session.as_ref().map(|s| s.draft().kind());
        assert_eq!(draft, Some(ShapeKind::Quadrilateral));
    }

    #[test]
    fn test_accept_without_session_is_ignored() {
        let mut app = AnnotatorApp::default();
        app.accept();
        assert!(!app.session_open());
        assert_eq!(app.processing.status_text, "Ready");
    }

    #[test]
    fn test_invalid_geometry_keeps_previous() {
        let mut app = AnnotatorApp::default();
        let bad = DetectorGeometry {
            distance_mm: -5.0,
            ..DetectorGeometry::default()
        };
        app.apply_geometry(bad);
        assert_eq!(app.current_state().geometry, DetectorGeometry::default());
        assert!(app.processing.status_text.starts_with("Rejected"));
    }

    #[test]
    fn test_command_includes_fitted_beam() {
        let mut app = AnnotatorApp::default();
        app.params.image_dir = PathBuf::from("/data");
        app.params.output_dir = PathBuf::from("/proc");
        app.dispatch(AnnotationEvent::ModeChanged(Mode::FitBeam));
        click(&mut app, 100.0, 100.0);
        click(&mut app, 200.0, 100.0);
        click(&mut app, 150.0, 150.0);
        let line = app.processing_command().display_line();
        assert!(line.starts_with("process -I /data -d /proc"));
        assert!(line.contains("beam=\"150.00 100.00\""));
    }

    fn load_header(app: &mut AnnotatorApp, text: &str) {
        let path = PathBuf::from("/data/img_0001.cbf");
        app.image_path = Some(path.clone());
        app.tx
            .send(AppMessage::HeaderLoaded(path, ImageHeader::parse(text)))
            .unwrap();
        app.handle_messages(&egui::Context::default());
    }

    #[test]
    fn test_header_sets_committed_geometry() {
        let mut app = AnnotatorApp::default();
        load_header(&mut app, "distance [mm] = 350.0\nOverload value = 65535\n");
        assert!(!app.session_open());
        assert_eq!(app.committed.geometry.distance_mm, 350.0);
        assert_eq!(app.ui_state.geometry_form.geometry.distance_mm, 350.0);
        assert_eq!(app.overload, Some(65535.0));
    }

    #[test]
    fn test_cancel_keeps_header_geometry() {
        for scope in [CancelScope::DiscardNew, CancelScope::RevertAll] {
            let mut app = AnnotatorApp::default();
            app.dispatch(AnnotationEvent::ModeChanged(Mode::Draw));
            click(&mut app, 10.0, 10.0);
            load_header(&mut app, "distance [mm] = 350.0\n");
            assert!(app.session_open());
            assert_eq!(app.current_state().geometry.distance_mm, 350.0);

            app.cancel(scope);
            assert!(!app.session_open());
            assert_eq!(app.committed.geometry.distance_mm, 350.0);
        }
    }

    #[test]
    fn test_header_for_other_image_ignored() {
        let mut app = AnnotatorApp::default();
        app.image_path = Some(PathBuf::from("/data/other.cbf"));
        app.tx
            .send(AppMessage::HeaderLoaded(
                PathBuf::from("/data/img_0001.cbf"),
                ImageHeader::parse("distance [mm] = 350.0\n"),
            ))
            .unwrap();
        app.handle_messages(&egui::Context::default());
        assert_eq!(app.committed.geometry, DetectorGeometry::default());
    }

    #[test]
    fn test_run_requires_output_dir() {
        let mut app = AnnotatorApp::default();
        app.run_processing();
        assert!(!app.processing.job_running);
    }
}
