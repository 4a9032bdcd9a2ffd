//! Apply SVG filter effects to premultiplied ARGB32 rasters.
//!
//! This crate implements the filter primitives of [SVG 1.1 Filter Effects]:
//! blurs, convolutions, lighting, compositing, color remapping, displacement
//! and noise synthesis.  It does not parse SVG; the caller builds a [`Filter`]
//! with its list of [`FilterPrimitive`] values, and hands it a rendered source
//! raster.
//!
//! # Basic usage
//!
//! * Wrap the rendered element in a [`SharedImageSurface`].
//! * Describe the filter with a [`Filter`] and its primitives.
//! * Call [`render`] with a [`FilterContextParams`] and a [`Session`].
//!
//! # Example
//!
//! ```
//! use rsvg_filters::filters::gaussian_blur::GaussianBlur;
//! use rsvg_filters::{
//!     render, ChannelMap, Filter, FilterContextParams, FilterPrimitive, Input,
//!     PrimitiveParams, Rect, Session, SharedImageSurface, SurfaceType, Transform,
//! };
//!
//! let source = SharedImageSurface::empty(100, 100, ChannelMap::cairo(), SurfaceType::SRgb)
//!     .unwrap();
//!
//! let filter = Filter {
//!     primitives: vec![FilterPrimitive::new(PrimitiveParams::GaussianBlur(
//!         GaussianBlur {
//!             in1: Input::SourceGraphic,
//!             std_deviation: (2.0, 2.0),
//!         },
//!     ))],
//!     ..Default::default()
//! };
//!
//! // The element's bounding box resolves the default objectBoundingBox filter region.
//! let params = FilterContextParams::new(source, Transform::identity())
//!     .with_bbox(Rect::new(10.0, 10.0, 90.0, 90.0));
//!
//! let output = render(&filter, &params, &Session::new()).unwrap();
//! assert_eq!((output.width(), output.height()), (100, 100));
//! ```
//!
//! # Logging
//!
//! Set the `RSVG_LOG` environment variable to get a trace of each filter
//! invocation on stdout: the effects region, the time taken by each primitive,
//! and the reason why a primitive produced no output.
//!
//! [SVG 1.1 Filter Effects]: https://www.w3.org/TR/SVG11/filters.html

#![allow(clippy::too_many_arguments)]
#![warn(nonstandard_style, rust_2018_idioms, unused)]
// Some lints no longer exist
#![warn(renamed_and_removed_lints)]
// Standalone lints
#![warn(trivial_casts, trivial_numeric_casts)]

#[macro_use]
mod log;

mod coord_units;
mod error;
mod rect;
mod session;
mod transform;
mod util;

pub mod filters;
pub mod surface_utils;

pub use crate::coord_units::CoordUnits;
pub use crate::error::RenderingError;
pub use crate::filters::context::{
    BackgroundSource, FilterContextParams, FilterInput, FilterOutput, ImageResolver,
};
pub use crate::filters::{
    render, Filter, FilterError, FilterPrimitive, FilterUnits, Input, InputRequirements,
    PrimitiveParams, PrimitiveUnits,
};
pub use crate::rect::{IRect, Rect};
pub use crate::session::Session;
pub use crate::surface_utils::shared_surface::{
    ExclusiveImageSurface, SharedImageSurface, SurfaceError, SurfaceType,
};
pub use crate::surface_utils::{ChannelMap, EdgeMode, Pixel, PixelOps};
pub use crate::transform::Transform;

#[doc(hidden)]
pub mod bench_only {
    pub use crate::filters::lighting::Normal;
    pub use crate::rect::IRect;
    pub use crate::surface_utils::{
        iterators::{PixelRectangle, Pixels},
        shared_surface::{
            composite_arithmetic, AlphaOnly, ExclusiveImageSurface, Horizontal, NotAlphaOnly,
            SharedImageSurface, SurfaceType, Vertical,
        },
        ChannelMap, EdgeMode, ImageSurfaceDataExt, Pixel, PixelOps,
    };
}
