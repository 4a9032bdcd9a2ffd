//! Entry point for the filter effects engine.
use std::convert::Infallible;
use std::str::FromStr;
use std::time::Instant;

use crate::coord_units::CoordUnits;
use crate::error::RenderingError;
use crate::rect::Rect;
use crate::rsvg_log;
use crate::session::Session;
use crate::surface_utils::shared_surface::{SharedImageSurface, SurfaceType};

mod bounds;
use self::bounds::BoundsBuilder;

pub mod context;
use self::context::{FilterContext, FilterContextParams, FilterOutput, FilterResult};

mod error;
pub use self::error::FilterError;

pub mod blend;
pub mod color_matrix;
pub mod component_transfer;
pub mod composite;
pub mod convolve_matrix;
pub mod displacement_map;
pub mod flood;
pub mod gaussian_blur;
pub mod image;
pub mod lighting;
pub mod merge;
pub mod morphology;
pub mod offset;
pub mod tile;
pub mod turbulence;

crate::coord_units!(FilterUnits, CoordUnits::ObjectBoundingBox);
crate::coord_units!(PrimitiveUnits, CoordUnits::UserSpaceOnUse);

/// A `<filter>` element, with its primitives already parsed.
///
/// This is everything needed to take a surface and apply a list of SVG filter
/// primitives to it, apart from the per-invocation data in [`FilterContextParams`].
#[derive(Clone)]
pub struct Filter {
    /// Human-readable identifier for the filter, for logging/debugging purposes.
    pub name: String,

    pub filter_units: FilterUnits,
    pub primitive_units: PrimitiveUnits,

    /// The filter region, in the units given by `filter_units`.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,

    /// List of filter primitives to apply to the surface, in order.
    pub primitives: Vec<FilterPrimitive>,
}

impl Default for Filter {
    /// The SVG 1.1 defaults: `-10%`, `-10%`, `120%`, `120%` of the bounding box.
    fn default() -> Self {
        Filter {
            name: String::new(),
            filter_units: FilterUnits::default(),
            primitive_units: PrimitiveUnits::default(),
            x: -0.1,
            y: -0.1,
            width: 1.2,
            height: 1.2,
            primitives: Vec::new(),
        }
    }
}

impl Filter {
    /// Returns the filter region in `filter_units`.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Returns which optional inputs the primitives of this filter refer to.
    pub fn input_requirements(&self) -> InputRequirements {
        self.primitives
            .iter()
            .map(|primitive| primitive.params.get_input_requirements())
            .fold(InputRequirements::default(), |a, b| a.fold(b))
    }
}

/// Which surfaces need to be computed before rendering a [`Filter`].
///
/// A caller can use this to avoid rendering the backdrop when no primitive asks for it.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InputRequirements {
    pub needs_source_alpha: bool,
    pub needs_background_image: bool,
    pub needs_background_alpha: bool,
}

impl InputRequirements {
    #[rustfmt::skip]
    fn fold(self, r: InputRequirements) -> InputRequirements {
        InputRequirements {
            needs_source_alpha:     self.needs_source_alpha     || r.needs_source_alpha,
            needs_background_image: self.needs_background_image || r.needs_background_image,
            needs_background_alpha: self.needs_background_alpha || r.needs_background_alpha,
        }
    }
}

/// Parameters for each filter primitive.
///
/// These gather all the data that a primitive may need during rendering: the
/// `feFoo` element's attributes and the parameters extracted from the element's
/// children (for example, `feMerge` gathers info from its `feMergeNode` children).
#[derive(Clone)]
pub enum PrimitiveParams {
    Blend(blend::Blend),
    ColorMatrix(color_matrix::ColorMatrix),
    ComponentTransfer(component_transfer::ComponentTransfer),
    Composite(composite::Composite),
    ConvolveMatrix(convolve_matrix::ConvolveMatrix),
    DiffuseLighting(lighting::DiffuseLighting),
    DisplacementMap(displacement_map::DisplacementMap),
    Flood(flood::Flood),
    GaussianBlur(gaussian_blur::GaussianBlur),
    Image(image::Image),
    Merge(merge::Merge),
    Morphology(morphology::Morphology),
    Offset(offset::Offset),
    SpecularLighting(lighting::SpecularLighting),
    Tile(tile::Tile),
    Turbulence(turbulence::Turbulence),
}

impl PrimitiveParams {
    /// Returns a human-readable name for a primitive.
    #[rustfmt::skip]
    fn name(&self) -> &'static str {
        use PrimitiveParams::*;
        match self {
            Blend(..)             => "feBlend",
            ColorMatrix(..)       => "feColorMatrix",
            ComponentTransfer(..) => "feComponentTransfer",
            Composite(..)         => "feComposite",
            ConvolveMatrix(..)    => "feConvolveMatrix",
            DiffuseLighting(..)   => "feDiffuseLighting",
            DisplacementMap(..)   => "feDisplacementMap",
            Flood(..)             => "feFlood",
            GaussianBlur(..)      => "feGaussianBlur",
            Image(..)             => "feImage",
            Merge(..)             => "feMerge",
            Morphology(..)        => "feMorphology",
            Offset(..)            => "feOffset",
            SpecularLighting(..)  => "feSpecularLighting",
            Tile(..)              => "feTile",
            Turbulence(..)        => "feTurbulence",
        }
    }

    #[rustfmt::skip]
    fn get_input_requirements(&self) -> InputRequirements {
        use PrimitiveParams::*;
        match self {
            Blend(p)             => p.get_input_requirements(),
            ColorMatrix(p)       => p.get_input_requirements(),
            ComponentTransfer(p) => p.get_input_requirements(),
            Composite(p)         => p.get_input_requirements(),
            ConvolveMatrix(p)    => p.get_input_requirements(),
            DiffuseLighting(p)   => p.get_input_requirements(),
            DisplacementMap(p)   => p.get_input_requirements(),
            Flood(_)             => InputRequirements::default(),
            GaussianBlur(p)      => p.get_input_requirements(),
            Image(_)             => InputRequirements::default(),
            Merge(p)             => p.get_input_requirements(),
            Morphology(p)        => p.get_input_requirements(),
            Offset(p)            => p.get_input_requirements(),
            SpecularLighting(p)  => p.get_input_requirements(),
            Tile(p)              => p.get_input_requirements(),
            Turbulence(_)        => InputRequirements::default(),
        }
    }
}

/// A filter primitive with its common attributes.
///
/// The subregion is in the units given by the filter's `primitive_units`; each of
/// `x`, `y`, `width`, `height` may be left unspecified independently.
#[derive(Clone)]
pub struct FilterPrimitive {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,

    /// The `result` attribute.
    pub result: Option<String>,

    pub params: PrimitiveParams,
}

impl FilterPrimitive {
    /// A primitive without a subregion or a result name.
    pub fn new(params: PrimitiveParams) -> FilterPrimitive {
        FilterPrimitive {
            x: None,
            y: None,
            width: None,
            height: None,
            result: None,
            params,
        }
    }

    pub fn with_result(mut self, name: &str) -> FilterPrimitive {
        self.result = Some(name.to_string());
        self
    }

    pub fn with_subregion(
        mut self,
        x: Option<f64>,
        y: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
    ) -> FilterPrimitive {
        self.x = x;
        self.y = y;
        self.width = width;
        self.height = height;
        self
    }

    /// Returns the `BoundsBuilder` for bounds computation.
    #[inline]
    fn get_bounds(&self, ctx: &FilterContext<'_>) -> BoundsBuilder {
        BoundsBuilder::new(
            self.x,
            self.y,
            self.width,
            self.height,
            ctx.paffine(),
            ctx.paffine_inverse(),
        )
    }
}

/// An enumeration of possible inputs for a filter primitive.
#[derive(Debug, Default, Clone, Eq, PartialEq, Hash)]
pub enum Input {
    #[default]
    Unspecified,
    SourceGraphic,
    SourceAlpha,
    BackgroundImage,
    BackgroundAlpha,
    FilterOutput(String),
}

impl Input {
    pub fn get_requirements(&self) -> InputRequirements {
        use Input::*;

        let mut reqs = InputRequirements::default();

        match self {
            SourceAlpha => reqs.needs_source_alpha = true,
            BackgroundImage => reqs.needs_background_image = true,
            BackgroundAlpha => reqs.needs_background_alpha = true,
            _ => (),
        }

        reqs
    }
}

impl FromStr for Input {
    type Err = Infallible;

    /// Any name that is not one of the standard inputs refers to a `result`.
    fn from_str(s: &str) -> Result<Input, Infallible> {
        Ok(match s.trim() {
            "SourceGraphic" => Input::SourceGraphic,
            "SourceAlpha" => Input::SourceAlpha,
            "BackgroundImage" => Input::BackgroundImage,
            "BackgroundAlpha" => Input::BackgroundAlpha,
            name => Input::FilterOutput(name.to_string()),
        })
    }
}

/// Applies a filter and returns the resulting surface.
///
/// The result has the size and channel layout of `params.source`.  Primitives that fail
/// are logged and skipped; if the filter cannot run at all (for example, because its
/// region is empty) the result is fully transparent.  Errors are only returned when
/// the transform is not invertible or a surface cannot be allocated.
pub fn render(
    filter: &Filter,
    params: &FilterContextParams<'_>,
    session: &Session,
) -> Result<SharedImageSurface, RenderingError> {
    let source_surface = &params.source;

    FilterContext::new(filter, params, session)
        .and_then(|mut filter_ctx| {
            // the message has an unclosed parenthesis; we'll close it below.
            rsvg_log!(
                session,
                "(filter \"{}\" with effects_region={:?}",
                filter.name,
                filter_ctx.effects_region()
            );

            for primitive in &filter.primitives {
                let start = Instant::now();

                match render_primitive(primitive, &filter_ctx) {
                    Ok(output) => {
                        let elapsed = start.elapsed();
                        rsvg_log!(
                            session,
                            "(rendered filter primitive {} in {} seconds)",
                            primitive.params.name(),
                            elapsed.as_secs_f64()
                        );

                        filter_ctx.store_result(FilterResult {
                            name: primitive.result.clone(),
                            output,
                        });
                    }

                    Err(err) => {
                        rsvg_log!(
                            session,
                            "(filter primitive {} returned an error: {})",
                            primitive.params.name(),
                            err
                        );

                        // Exit early on allocation errors. Continue rendering otherwise.
                        if let FilterError::SurfaceAllocation(e) = err {
                            // close the opening parenthesis from the message at the start of this function
                            rsvg_log!(session, ")");
                            return Err(FilterError::SurfaceAllocation(e));
                        }
                    }
                }
            }

            // close the opening parenthesis from the message at the start of this function
            rsvg_log!(session, ")");

            Ok(filter_ctx.into_output()?)
        })
        .or_else(|err| match err {
            FilterError::SurfaceAllocation(e) => Err(RenderingError::from(e)),
            FilterError::NonInvertibleTransform => Err(RenderingError::InvalidTransform),
            _ => {
                rsvg_log!(
                    session,
                    "(filter \"{}\" produced no output: {})",
                    filter.name,
                    err
                );

                // ignore other filter errors and just return an empty surface
                Ok(SharedImageSurface::empty(
                    source_surface.width(),
                    source_surface.height(),
                    source_surface.channels(),
                    SurfaceType::AlphaOnly,
                )?)
            }
        })
}

#[rustfmt::skip]
fn render_primitive(
    primitive: &FilterPrimitive,
    ctx: &FilterContext<'_>,
) -> Result<FilterOutput, FilterError> {
    use PrimitiveParams::*;

    let bounds_builder = primitive.get_bounds(ctx);

    match primitive.params {
        Blend(ref p)             => p.render(bounds_builder, ctx),
        ColorMatrix(ref p)       => p.render(bounds_builder, ctx),
        ComponentTransfer(ref p) => p.render(bounds_builder, ctx),
        Composite(ref p)         => p.render(bounds_builder, ctx),
        ConvolveMatrix(ref p)    => p.render(bounds_builder, ctx),
        DiffuseLighting(ref p)   => p.render(bounds_builder, ctx),
        DisplacementMap(ref p)   => p.render(bounds_builder, ctx),
        Flood(ref p)             => p.render(bounds_builder, ctx),
        GaussianBlur(ref p)      => p.render(bounds_builder, ctx),
        Image(ref p)             => p.render(bounds_builder, ctx),
        Merge(ref p)             => p.render(bounds_builder, ctx),
        Morphology(ref p)        => p.render(bounds_builder, ctx),
        Offset(ref p)            => p.render(bounds_builder, ctx),
        SpecularLighting(ref p)  => p.render(bounds_builder, ctx),
        Tile(ref p)              => p.render(bounds_builder, ctx),
        Turbulence(ref p)        => p.render(bounds_builder, ctx),
    }
}
