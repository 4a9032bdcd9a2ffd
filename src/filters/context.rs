use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::coord_units::CoordUnits;
use crate::rect::{IRect, Rect};
use crate::session::Session;
use crate::surface_utils::shared_surface::{SharedImageSurface, SurfaceError, SurfaceType};
use crate::transform::Transform;

use super::error::FilterError;
use super::{Filter, Input};

/// A filter primitive output.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    /// The surface after the filter primitive was applied.
    pub surface: SharedImageSurface,

    /// The filter primitive subregion.
    pub bounds: IRect,
}

/// A filter primitive result.
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// The name of this result: the value of the `result` attribute.
    pub name: Option<String>,

    /// The output.
    pub output: FilterOutput,
}

/// An input to a filter primitive.
#[derive(Debug, Clone)]
pub enum FilterInput {
    /// One of the standard inputs.
    StandardInput(SharedImageSurface),
    /// Output of another filter primitive.
    PrimitiveOutput(FilterOutput),
}

/// Supplies the backdrop behind the filtered element, for `BackgroundImage` and
/// `BackgroundAlpha`.
///
/// It is called at most once per filter invocation, and only if a primitive asks for
/// one of those inputs.  The returned surface must have the given size.
pub trait BackgroundSource {
    fn background_image(&self, width: i32, height: i32) -> Result<SharedImageSurface, FilterError>;
}

impl<F> BackgroundSource for F
where
    F: Fn(i32, i32) -> Result<SharedImageSurface, FilterError>,
{
    fn background_image(&self, width: i32, height: i32) -> Result<SharedImageSurface, FilterError> {
        self(width, height)
    }
}

/// Loads the raster referenced by an `feImage` primitive.
///
/// The resolver renders `href` with `transform` as the mapping from the primitive
/// coordinate system to pixels, so that it covers `bounds`.  Pixels of the returned
/// surface are used at the same coordinates in the filter's pixel space; anything
/// outside `bounds` is ignored.
pub trait ImageResolver {
    fn resolve(
        &self,
        href: &str,
        transform: Transform,
        bounds: IRect,
    ) -> Result<SharedImageSurface, FilterError>;
}

/// Everything a filter invocation needs from its caller.
pub struct FilterContextParams<'a> {
    /// The rendered element to be filtered, in device pixels.
    pub source: SharedImageSurface,

    /// The user space to device space transform of the filtered element.
    pub transform: Transform,

    /// The element's bounding box in user space, if it has one.
    pub bbox: Option<Rect>,

    /// Callback for `BackgroundImage` and `BackgroundAlpha`.
    pub background: Option<&'a dyn BackgroundSource>,

    /// Callback for `feImage`.
    pub images: Option<&'a dyn ImageResolver>,
}

impl<'a> FilterContextParams<'a> {
    /// Parameters with just a source surface and a transform.
    pub fn new(source: SharedImageSurface, transform: Transform) -> Self {
        FilterContextParams {
            source,
            transform,
            bbox: None,
            background: None,
            images: None,
        }
    }

    pub fn with_bbox(mut self, bbox: Rect) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_background(mut self, background: &'a dyn BackgroundSource) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_images(mut self, images: &'a dyn ImageResolver) -> Self {
        self.images = Some(images);
        self
    }
}

/// Context for rendering a single [`Filter`].
///
/// Rendering a [`Filter`] involves keeping track of possibly-named results
/// for each filter primitive (e.g. those that have a `result` attribute).  This struct
/// maintains that information, plus all the extra data used during filtering.
pub struct FilterContext<'a> {
    session: Session,

    /// The source graphic surface.
    source_surface: SharedImageSurface,

    /// Callback for the background image, and its result once computed.
    background: Option<&'a dyn BackgroundSource>,
    background_surface: OnceCell<Result<SharedImageSurface, FilterError>>,

    /// Callback for `feImage`.
    images: Option<&'a dyn ImageResolver>,

    /// Output of the last filter primitive.
    last_result: Option<FilterOutput>,
    /// Surfaces of the previous filter primitives by name.
    previous_results: HashMap<String, FilterOutput>,

    /// Primtive units
    primitive_units: CoordUnits,
    /// The filter effects region.
    effects_region: Rect,

    /// The filter element affine matrix.
    ///
    /// If `filterUnits == userSpaceOnUse`, equal to the element's transform.  If
    /// `filterUnits == objectBoundingBox`, equal to the bounding box matrix multiplied by
    /// the element's transform, so that the unit square maps onto the bounding box.
    _affine: Transform,

    /// The filter primitive affine matrix.
    ///
    /// See the comments for `_affine`, they largely apply here.
    paffine: Transform,

    /// The inverse of `paffine`, for mapping pixel bounds back into primitive space.
    paffine_inverse: Transform,
}

#[cfg(test)]
impl std::fmt::Debug for FilterContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterContext").finish_non_exhaustive()
    }
}

fn units_transform(
    units: CoordUnits,
    transform: Transform,
    bbox: Option<Rect>,
) -> Result<Transform, FilterError> {
    units.to_device(transform, bbox).ok_or_else(|| {
        FilterError::InvalidParameter(
            "objectBoundingBox units on an element without a bounding box".to_string(),
        )
    })
}

impl<'a> FilterContext<'a> {
    /// Creates a new `FilterContext`.
    pub fn new(
        filter: &Filter,
        params: &FilterContextParams<'a>,
        session: &Session,
    ) -> Result<Self, FilterError> {
        let source_surface = params.source.clone();

        let affine = units_transform(filter.filter_units.into(), params.transform, params.bbox)?;
        let paffine =
            units_transform(filter.primitive_units.into(), params.transform, params.bbox)?;

        if !affine.is_invertible() {
            return Err(FilterError::NonInvertibleTransform);
        }

        let paffine_inverse = paffine
            .invert()
            .ok_or(FilterError::NonInvertibleTransform)?;

        // At this point all of the previous matrix business gets converted to pixel
        // coordinates in the final surface.  Finally, clip to the size of our surface.
        let effects_region = affine
            .transform_rect(&filter.rect())
            .intersection(&Rect::from(source_surface.bounds()))
            .ok_or(FilterError::EmptyRegion)?;

        Ok(Self {
            session: session.clone(),
            source_surface,
            background: params.background,
            background_surface: OnceCell::new(),
            images: params.images,
            last_result: None,
            previous_results: HashMap::new(),
            primitive_units: filter.primitive_units.into(),
            effects_region,
            _affine: affine,
            paffine,
            paffine_inverse,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns the surface corresponding to the source graphic.
    #[inline]
    pub fn source_graphic(&self) -> &SharedImageSurface {
        &self.source_surface
    }

    /// Returns the image resolver for `feImage`, if the caller supplied one.
    #[inline]
    pub fn image_resolver(&self) -> Option<&'a dyn ImageResolver> {
        self.images
    }

    /// Returns the surface corresponding to the background image snapshot.
    ///
    /// The background callback is invoked the first time this is called; later calls
    /// return the same surface, or the same error.
    fn background_image(&self) -> Result<SharedImageSurface, FilterError> {
        self.background_surface
            .get_or_init(|| {
                let (width, height) = (self.source_surface.width(), self.source_surface.height());

                let background = self.background.ok_or_else(|| {
                    FilterError::BadInputSurfaceStatus("no background is available".to_string())
                })?;

                let surface = background.background_image(width, height)?;

                if surface.width() != width || surface.height() != height {
                    return Err(FilterError::BadInputSurfaceStatus(format!(
                        "background is {}×{} but the source is {}×{}",
                        surface.width(),
                        surface.height(),
                        width,
                        height
                    )));
                }

                Ok(surface)
            })
            .clone()
    }

    /// Converts this `FilterContext` into the surface corresponding to the output of the filter
    /// chain.
    ///
    /// The output has the same size and channel layout as the source graphic.
    #[inline]
    pub fn into_output(self) -> Result<SharedImageSurface, SurfaceError> {
        match self.last_result {
            Some(FilterOutput { surface, .. }) => {
                surface.to_channels(self.source_surface.channels())
            }
            None => SharedImageSurface::empty(
                self.source_surface.width(),
                self.source_surface.height(),
                self.source_surface.channels(),
                SurfaceType::AlphaOnly,
            ),
        }
    }

    /// Stores a filter primitive result into the context.
    ///
    /// The result always becomes the last result; it is also remembered under its name,
    /// if it has a non-empty one.
    #[inline]
    pub fn store_result(&mut self, result: FilterResult) {
        if let Some(name) = result.name.filter(|name| !name.is_empty()) {
            self.previous_results.insert(name, result.output.clone());
        }

        self.last_result = Some(result.output);
    }

    /// Returns the paffine matrix.
    #[inline]
    pub fn paffine(&self) -> Transform {
        self.paffine
    }

    /// Returns the inverse of the paffine matrix.
    #[inline]
    pub fn paffine_inverse(&self) -> Transform {
        self.paffine_inverse
    }

    /// Returns the primitive units.
    #[inline]
    pub fn primitive_units(&self) -> CoordUnits {
        self.primitive_units
    }

    /// Returns the filter effects region.
    #[inline]
    pub fn effects_region(&self) -> Rect {
        self.effects_region
    }

    /// Get a filter primitive's default input as if its `in=\"...\"` were not specified.
    ///
    /// That is, the last result in the filter chain, or if this is the first in the chain,
    /// just SourceGraphic.
    fn get_unspecified_input(&self) -> FilterInput {
        if let Some(output) = self.last_result.as_ref() {
            FilterInput::PrimitiveOutput(output.clone())
        } else {
            FilterInput::StandardInput(self.source_graphic().clone())
        }
    }

    /// Retrieves the filter input surface according to the SVG rules.
    ///
    /// A name that was never stored resolves to [`FilterError::InvalidInput`], so the
    /// primitive that asked for it produces no output either.
    pub fn get_input(&self, in_: &Input) -> Result<FilterInput, FilterError> {
        match *in_ {
            Input::Unspecified => Ok(self.get_unspecified_input()),

            Input::SourceGraphic => Ok(FilterInput::StandardInput(self.source_graphic().clone())),

            Input::SourceAlpha => self
                .source_graphic()
                .extract_alpha(self.effects_region().into())
                .map_err(FilterError::from)
                .map(FilterInput::StandardInput),

            Input::BackgroundImage => self.background_image().map(FilterInput::StandardInput),

            Input::BackgroundAlpha => self
                .background_image()?
                .extract_alpha(self.effects_region().into())
                .map_err(FilterError::from)
                .map(FilterInput::StandardInput),

            Input::FilterOutput(ref name) if name.is_empty() || name == "none" => {
                Ok(self.get_unspecified_input())
            }

            Input::FilterOutput(ref name) => self
                .previous_results
                .get(name)
                .cloned()
                .map(FilterInput::PrimitiveOutput)
                .ok_or(FilterError::InvalidInput),
        }
    }
}

impl FilterInput {
    /// Retrieves the surface from `FilterInput`.
    #[inline]
    pub fn surface(&self) -> &SharedImageSurface {
        match *self {
            FilterInput::StandardInput(ref surface) => surface,
            FilterInput::PrimitiveOutput(FilterOutput { ref surface, .. }) => surface,
        }
    }
}
