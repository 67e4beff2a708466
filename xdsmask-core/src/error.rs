//! Error types for xdsmask-core.

use thiserror::Error;

/// Result type alias for xdsmask operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for geometry and mask operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Three-point fit on coincident or collinear points.
    #[error("points are collinear, no unique circle passes through them")]
    GeometryDegenerate,

    /// Detector geometry with a non-positive or non-finite length.
    #[error("invalid detector geometry: {0}")]
    InvalidGeometry(String),

    /// Parameter token that cannot be parsed.
    #[error("invalid parameter token: {0}")]
    InvalidToken(String),
}
