use std::fmt;

use crate::surface_utils::shared_surface::SurfaceError;

/// An enumeration of errors that can occur during filter primitive rendering.
///
/// None of these abort the whole filter; the primitive simply produces no result.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// The filter was passed invalid input (the `in` or `in2` attribute).
    InvalidInput,
    /// The filter was passed an invalid parameter.
    InvalidParameter(String),
    /// The background image could not be obtained.
    BadInputSurfaceStatus(String),
    /// An intermediate or output surface could not be created.
    SurfaceAllocation(SurfaceError),
    /// The primitive transform cannot be inverted.
    NonInvertibleTransform,
    /// A lighting filter input surface is too small.
    LightingInputTooSmall,
    /// The primitive subregion has no area.
    EmptyRegion,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FilterError::InvalidInput => write!(f, "invalid value of the `in` attribute"),
            FilterError::InvalidParameter(ref s) => write!(f, "invalid parameter value: {}", s),
            FilterError::BadInputSurfaceStatus(ref s) => {
                write!(f, "invalid status of the input surface: {}", s)
            }
            FilterError::SurfaceAllocation(ref e) => write!(f, "surface error: {}", e),
            FilterError::NonInvertibleTransform => write!(f, "transform is not invertible"),
            FilterError::LightingInputTooSmall => write!(
                f,
                "lighting filter input surface is too small (less than 2×2 pixels)"
            ),
            FilterError::EmptyRegion => write!(f, "primitive subregion is empty"),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<SurfaceError> for FilterError {
    #[inline]
    fn from(e: SurfaceError) -> Self {
        FilterError::SurfaceAllocation(e)
    }
}
