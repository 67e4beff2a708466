//! Annotation session: a typed event loop over geometry, masks and gaps.
//!
//! A session is opened on the caller's [`MaskState`], consumes
//! [`AnnotationEvent`]s one at a time through [`AnnotationSession::handle`],
//! and hands a state back only once it is accepted or cancelled. Failures
//! never abort the session; they are reported through [`Notice`] and leave
//! the working state as it was.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::circle::fit_circle;
use crate::gaps::{compute_gaps, GapGridConfig, GapRectangle};
use crate::geometry::{DetectorGeometry, Point, ProbeReading};
use crate::mask::{MaskOrigin, MaskRegion, MaskRegistry, ShapeDraft, ShapeKind};
use crate::token::{XdsParam, BEAM, UNTRUSTED_ELLIPSE, UNTRUSTED_QUADRILATERAL, UNTRUSTED_RECTANGLE};
use crate::{Error, Result};

/// Clicks needed for a beam-centre fit.
const BEAM_FIT_CLICKS: usize = 3;

/// Everything a session is handed and returns.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskState {
    pub geometry: DetectorGeometry,
    /// Beam centre set explicitly by a three-point fit.
    pub fitted_beam: Option<Point>,
    pub masks: MaskRegistry,
    pub gaps: GapGridConfig,
}

impl MaskState {
    /// State for a geometry with no masks.
    #[must_use]
    pub fn new(geometry: DetectorGeometry) -> Self {
        Self {
            geometry,
            ..Self::default()
        }
    }

    /// Rebuild a state from tokens of an earlier command line.
    ///
    /// Mask tokens become pre-existing masks and `beam` sets the fitted beam;
    /// other keys are ignored.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for a malformed mask or beam token.
    pub fn from_tokens(geometry: DetectorGeometry, tokens: &[XdsParam]) -> Result<Self> {
        let mut state = Self::new(geometry);
        for token in tokens {
            match token.key.as_str() {
                UNTRUSTED_RECTANGLE | UNTRUSTED_ELLIPSE | UNTRUSTED_QUADRILATERAL => {
                    let region = MaskRegion::from_param(token)?;
                    state.masks.insert(region, MaskOrigin::Preexisting);
                }
                BEAM => {
                    let values = token.numbers()?;
                    let [x, y] = values.as_slice() else {
                        return Err(Error::InvalidToken(format!(
                            "beam expects 2 values, got {}",
                            values.len()
                        )));
                    };
                    let beam = Point::new(*x, *y);
                    state.geometry.beam_centre_px = beam;
                    state.fitted_beam = Some(beam);
                }
                _ => {}
            }
        }
        Ok(state)
    }

    /// Replace the geometry. Last write wins: once a beam has been fitted,
    /// a new beam centre in `geometry` becomes the emitted beam.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] and leaves the state unchanged if
    /// `geometry` does not validate.
    pub fn set_geometry(&mut self, geometry: DetectorGeometry) -> Result<()> {
        geometry.validate()?;
        if self.fitted_beam.is_some() && geometry.beam_centre_px != self.geometry.beam_centre_px {
            self.fitted_beam = Some(geometry.beam_centre_px);
        }
        self.geometry = geometry;
        Ok(())
    }

    /// Gap rectangles for the current grid.
    #[must_use]
    pub fn gap_rectangles(&self) -> Vec<GapRectangle> {
        compute_gaps(&self.geometry, &self.gaps)
    }

    /// Tokens for the processing command line: beam, masks, then gaps.
    #[must_use]
    pub fn tokens(&self) -> Vec<XdsParam> {
        let mut tokens = Vec::with_capacity(1 + self.masks.len());
        if let Some(beam) = self.fitted_beam {
            tokens.push(XdsParam::new(BEAM, format!("{:.2} {:.2}", beam.x, beam.y)));
        }
        tokens.extend(self.masks.serialize());
        tokens.extend(self.gap_rectangles().iter().map(GapRectangle::to_param));
        tokens
    }
}

/// What a click does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Report pixel and resolution.
    #[default]
    Probe,
    /// Collect three points on a powder/ice ring to fit the beam centre.
    FitBeam,
    /// Draw untrusted regions of the selected shape.
    Draw,
    /// Remove the first region under the pointer.
    Delete,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Probe => write!(f, "Probe"),
            Mode::FitBeam => write!(f, "Fit beam centre"),
            Mode::Draw => write!(f, "Draw mask"),
            Mode::Delete => write!(f, "Delete mask"),
        }
    }
}

/// How much of the session to throw away on cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelScope {
    /// Drop masks drawn in this session; deletions of pre-existing masks stay.
    DiscardNew,
    /// Return the caller's state exactly as handed in.
    RevertAll,
}

/// Input to [`AnnotationSession::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationEvent {
    /// Click at a detector pixel.
    ClickAt(Point),
    ModeChanged(Mode),
    ShapeKindChanged(ShapeKind),
    GapsChanged(GapGridConfig),
    GeometryChanged(DetectorGeometry),
    Accept,
    Cancel(CancelScope),
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Open,
    Accepted,
    Cancelled,
}

/// Feedback from the last handled event.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Probed(ProbeReading),
    BeamClick { collected: usize },
    BeamFitted(Point),
    ShapeClick { kind: ShapeKind, collected: usize },
    MaskAdded(usize),
    MaskDeleted(usize),
    NothingHit,
    GeometryDegenerate,
    Rejected(String),
    SessionClosed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Probed(reading) => write!(
                f,
                "x={:.1} y={:.1}  resolution {:.2} Å",
                reading.pixel.x, reading.pixel.y, reading.resolution_a
            ),
            Notice::BeamClick { collected } => {
                write!(f, "Beam centre: point {collected} of {BEAM_FIT_CLICKS}")
            }
            Notice::BeamFitted(beam) => write!(f, "Beam centre set to {:.2} {:.2}", beam.x, beam.y),
            Notice::ShapeClick { kind, collected } => write!(
                f,
                "{kind}: point {collected} of {}",
                kind.clicks_required()
            ),
            Notice::MaskAdded(id) => write!(f, "Added mask #{id}"),
            Notice::MaskDeleted(id) => write!(f, "Deleted mask #{id}"),
            Notice::NothingHit => write!(f, "No mask under pointer"),
            Notice::GeometryDegenerate => write!(f, "Points are collinear, try again"),
            Notice::Rejected(reason) => write!(f, "Rejected: {reason}"),
            Notice::SessionClosed => write!(f, "Session already closed"),
        }
    }
}

/// One interactive annotation session.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    initial: MaskState,
    working: MaskState,
    mode: Mode,
    beam_clicks: Vec<Point>,
    phase: SessionPhase,
    notice: Option<Notice>,
    outcome: Option<MaskState>,
}

impl AnnotationSession {
    /// Open a session on the caller's state. Its masks count as pre-existing.
    #[must_use]
    pub fn new(state: MaskState) -> Self {
        let mut working = state.clone();
        working.masks = MaskRegistry::with_regions(
            state.masks.iter().map(|m| m.region.clone()),
            MaskOrigin::Preexisting,
        );
        Self {
            initial: state,
            working,
            mode: Mode::default(),
            beam_clicks: Vec::with_capacity(BEAM_FIT_CLICKS),
            phase: SessionPhase::Open,
            notice: None,
            outcome: None,
        }
    }

    /// Apply one event.
    #[must_use]
    pub fn handle(mut self, event: AnnotationEvent) -> Self {
        if self.phase != SessionPhase::Open {
            self.notice = Some(Notice::SessionClosed);
            return self;
        }
        self.notice = None;
        match event {
            AnnotationEvent::ClickAt(point) => self.click(point),
            AnnotationEvent::ModeChanged(mode) => {
                self.mode = mode;
                self.beam_clicks.clear();
                self.working.masks.cancel_draft();
            }
            AnnotationEvent::ShapeKindChanged(kind) => self.working.masks.set_shape_kind(kind),
            AnnotationEvent::GapsChanged(gaps) => match gaps.validate() {
                Ok(()) => self.working.gaps = gaps,
                Err(e) => self.notice = Some(Notice::Rejected(e.to_string())),
            },
            AnnotationEvent::GeometryChanged(geometry) => {
                if let Err(e) = self.working.set_geometry(geometry) {
                    self.notice = Some(Notice::Rejected(e.to_string()));
                }
            }
            AnnotationEvent::Accept => {
                self.working.masks.cancel_draft();
                self.outcome = Some(self.working.clone());
                self.phase = SessionPhase::Accepted;
            }
            AnnotationEvent::Cancel(scope) => {
                let mut restored = self.initial.clone();
                if scope == CancelScope::DiscardNew {
                    let mut masks = self.working.masks.clone();
                    masks.retain_origin(MaskOrigin::Preexisting);
                    masks.cancel_draft();
                    restored.masks = masks;
                }
                self.outcome = Some(restored);
                self.phase = SessionPhase::Cancelled;
            }
        }
        self
    }

    fn click(&mut self, point: Point) {
        let notice = match self.mode {
            Mode::Probe => Notice::Probed(self.working.geometry.probe(point)),
            Mode::FitBeam => self.beam_click(point),
            Mode::Draw => match self.working.masks.click(point) {
                Ok(Some(id)) => Notice::MaskAdded(id),
                Ok(None) => {
                    let draft = self.working.masks.draft();
                    Notice::ShapeClick {
                        kind: draft.kind(),
                        collected: draft.clicks().len(),
                    }
                }
                Err(Error::GeometryDegenerate) => Notice::GeometryDegenerate,
                Err(e) => Notice::Rejected(e.to_string()),
            },
            Mode::Delete => match self.working.masks.delete_at(point) {
                Some(mask) => Notice::MaskDeleted(mask.id),
                None => Notice::NothingHit,
            },
        };
        self.notice = Some(notice);
    }

    fn beam_click(&mut self, point: Point) -> Notice {
        self.beam_clicks.push(point);
        if self.beam_clicks.len() < BEAM_FIT_CLICKS {
            return Notice::BeamClick {
                collected: self.beam_clicks.len(),
            };
        }
        let clicks = std::mem::take(&mut self.beam_clicks);
        match fit_circle(clicks[0], clicks[1], clicks[2]) {
            Ok(circle) => {
                // Clicks are taken on the displayed image; store the unswung centre.
                let beam = self.working.geometry.beam_from_displayed(circle.centre);
                self.working.geometry.beam_centre_px = beam;
                self.working.fitted_beam = Some(beam);
                Notice::BeamFitted(beam)
            }
            Err(_) => Notice::GeometryDegenerate,
        }
    }

    /// Replace the geometry of both the opening and the working state.
    ///
    /// Used when the authoritative geometry (the image header) arrives after
    /// the session opened; a later cancel restores it rather than the
    /// geometry the session was opened with. Ignored once closed.
    ///
    /// # Errors
    /// Returns [`Error::InvalidGeometry`] and leaves the session unchanged if
    /// `geometry` does not validate.
    pub fn rebase_geometry(&mut self, geometry: DetectorGeometry) -> Result<()> {
        geometry.validate()?;
        if self.phase == SessionPhase::Open {
            self.initial.set_geometry(geometry.clone())?;
            self.working.set_geometry(geometry)?;
        }
        Ok(())
    }

    /// Working state including uncommitted edits.
    #[must_use]
    pub fn state(&self) -> &MaskState {
        &self.working
    }

    /// State handed in when the session opened.
    #[must_use]
    pub fn initial_state(&self) -> &MaskState {
        &self.initial
    }

    /// Current click mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Feedback from the last event, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    /// Beam-fit clicks collected so far.
    #[must_use]
    pub fn beam_clicks(&self) -> &[Point] {
        &self.beam_clicks
    }

    /// In-progress mask draft.
    #[must_use]
    pub fn draft(&self) -> &ShapeDraft {
        self.working.masks.draft()
    }

    /// State handed back to the caller once the session is closed.
    #[must_use]
    pub fn outcome(&self) -> Option<&MaskState> {
        self.outcome.as_ref()
    }

    /// Consume the session, returning its outcome.
    #[must_use]
    pub fn into_outcome(self) -> Option<MaskState> {
        self.outcome
    }
}
