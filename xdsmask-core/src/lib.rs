//! xdsmask-core: Geometry and mask types for diffraction image annotation.
//!
//! This crate provides the detector geometry model, the three-point circle
//! fit, resolution/ice ring placement, module-gap generation, the untrusted
//! region registry and the annotation session that ties them together.
//!

pub mod circle;
pub mod error;
pub mod gaps;
pub mod geometry;
pub mod mask;
pub mod rings;
pub mod session;
pub mod token;

pub use circle::{fit_circle, Circle};
pub use error::{Error, Result};
pub use gaps::{compute_gaps, GapGridConfig, GapRectangle, MAX_GAP_COUNT};
pub use geometry::{
    resolution_at, two_theta_x_offset, CanvasMapping, DetectorGeometry, Point, ProbeReading,
};
pub use mask::{
    canonical_quadrilateral, Mask, MaskOrigin, MaskRegion, MaskRegistry, ShapeDraft, ShapeKind,
};
pub use rings::{
    compute_ice_rings, compute_rings, ResolutionRing, RingKind, RingShape, ICE_RINGS_A,
};
pub use session::{
    AnnotationEvent, AnnotationSession, CancelScope, MaskState, Mode, Notice, SessionPhase,
};
pub use token::XdsParam;
