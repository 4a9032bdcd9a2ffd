//! Error types.

use std::error;
use std::fmt;

use crate::surface_utils::shared_surface::SurfaceError;

/// Errors that prevent a filter from producing any output at all.
///
/// Failures of individual primitives are not reported here; see
/// [`FilterError`](crate::filters::FilterError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderingError {
    /// An error while creating or wrapping a surface.
    Rendering(String),

    /// A non-invertible transform was passed in.
    InvalidTransform,

    /// Not enough memory was available for rendering.
    OutOfMemory(String),
}

impl error::Error for RenderingError {}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RenderingError::Rendering(ref s) => write!(f, "rendering error: {s}"),
            RenderingError::InvalidTransform => write!(f, "invalid transform"),
            RenderingError::OutOfMemory(ref s) => write!(f, "out of memory: {s}"),
        }
    }
}

impl From<SurfaceError> for RenderingError {
    fn from(e: SurfaceError) -> RenderingError {
        match e {
            SurfaceError::OutOfMemory { .. } => RenderingError::OutOfMemory(e.to_string()),
            _ => RenderingError::Rendering(e.to_string()),
        }
    }
}
