//! Filter primitive subregion computation.
use crate::rect::{IRect, Rect};
use crate::transform::Transform;

use super::context::{FilterContext, FilterInput};
use super::error::FilterError;

/// A helper type for filter primitive subregion computation.
pub struct BoundsBuilder {
    /// Filter primitive properties.
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,

    /// The transform to use when generating the rect
    transform: Transform,

    /// The inverse transform used when adding rects
    inverse: Transform,

    /// Whether one of the input nodes is standard input.
    standard_input_was_referenced: bool,

    /// The current bounding rectangle.
    rect: Option<Rect>,
}

impl BoundsBuilder {
    /// Constructs a new `BoundsBuilder`.
    ///
    /// `inverse` must be the inverse of `transform`.
    #[inline]
    pub fn new(
        x: Option<f64>,
        y: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
        transform: Transform,
        inverse: Transform,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            transform,
            inverse,
            standard_input_was_referenced: false,
            rect: None,
        }
    }

    /// Adds a filter primitive input to the bounding box.
    #[inline]
    pub fn add_input(mut self, input: &FilterInput) -> Self {
        // If a standard input was referenced, the default value is the filter effects region
        // regardless of other referenced inputs. This means we can skip computing the bounds.
        if self.standard_input_was_referenced {
            return self;
        }

        match *input {
            FilterInput::StandardInput(_) => {
                self.standard_input_was_referenced = true;
            }
            FilterInput::PrimitiveOutput(ref output) => {
                let input_rect = self.inverse.transform_rect(&Rect::from(output.bounds));
                self.rect = Some(self.rect.map_or(input_rect, |r| input_rect.union(&r)));
            }
        }

        self
    }

    fn any_specified(&self) -> bool {
        self.x.is_some() || self.y.is_some() || self.width.is_some() || self.height.is_some()
    }

    /// Returns the final exact bounds, clipped to the effects region.
    pub fn compute(self, ctx: &FilterContext<'_>) -> Option<Rect> {
        let effects_region = ctx.effects_region();

        // A primitive without its own subregion covers the whole filter region.
        if !self.any_specified() {
            return Some(effects_region);
        }

        // The default value for unspecified properties is the union of the input
        // subregions, or the filter effects region, converted into the primitive
        // coordinate system.
        let mut rect = match self.rect {
            Some(r) if !self.standard_input_was_referenced => r,
            _ => self.inverse.transform_rect(&effects_region),
        };

        // These replacements are possible because of the primitive coordinate system.
        if let Some(x) = self.x {
            let w = rect.width();
            rect.x0 = x;
            rect.x1 = rect.x0 + w;
        }
        if let Some(y) = self.y {
            let h = rect.height();
            rect.y0 = y;
            rect.y1 = rect.y0 + h;
        }
        if let Some(width) = self.width {
            rect.x1 = rect.x0 + width;
        }
        if let Some(height) = self.height {
            rect.y1 = rect.y0 + height;
        }

        // Convert into the surface coordinate system.
        self.transform
            .transform_rect(&rect)
            .intersection(&effects_region)
    }

    /// Returns the bounds in whole pixels.
    ///
    /// An empty subregion is reported as [`FilterError::EmptyRegion`], so that the
    /// primitive produces no output.
    pub fn into_irect(self, ctx: &FilterContext<'_>) -> Result<IRect, FilterError> {
        self.compute(ctx)
            .map(IRect::from)
            .filter(|r| !r.is_empty())
            .ok_or(FilterError::EmptyRegion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::coord_units::CoordUnits;
    use crate::filters::context::{FilterContextParams, FilterOutput};
    use crate::filters::{Filter, FilterUnits, PrimitiveUnits};
    use crate::session::Session;
    use crate::surface_utils::shared_surface::{SharedImageSurface, SurfaceType};
    use crate::surface_utils::ChannelMap;

    fn source() -> SharedImageSurface {
        SharedImageSurface::empty(100, 100, ChannelMap::cairo(), SurfaceType::SRgb).unwrap()
    }

    fn builder(
        ctx: &FilterContext<'_>,
        x: Option<f64>,
        y: Option<f64>,
        w: Option<f64>,
        h: Option<f64>,
    ) -> BoundsBuilder {
        BoundsBuilder::new(x, y, w, h, ctx.paffine(), ctx.paffine_inverse())
    }

    fn user_space_filter() -> Filter {
        Filter {
            filter_units: FilterUnits(CoordUnits::UserSpaceOnUse),
            x: 10.0,
            y: 10.0,
            width: 80.0,
            height: 80.0,
            ..Default::default()
        }
    }

    #[test]
    fn unspecified_subregion_is_filter_region() {
        let params = FilterContextParams::new(source(), Transform::identity());
        let ctx =
            FilterContext::new(&user_space_filter(), &params, &Session::new_for_test_suite())
                .unwrap();

        let input = FilterInput::PrimitiveOutput(FilterOutput {
            surface: source(),
            bounds: IRect::new(20, 20, 30, 30),
        });

        let b = builder(&ctx, None, None, None, None).add_input(&input);
        assert_eq!(b.into_irect(&ctx), Ok(IRect::new(10, 10, 90, 90)));
    }

    #[test]
    fn partial_subregion_defaults_to_input_bounds() {
        let params = FilterContextParams::new(source(), Transform::identity());
        let ctx =
            FilterContext::new(&user_space_filter(), &params, &Session::new_for_test_suite())
                .unwrap();

        let input = FilterInput::PrimitiveOutput(FilterOutput {
            surface: source(),
            bounds: IRect::new(20, 20, 30, 30),
        });

        let b = builder(&ctx, Some(25.0), None, None, None).add_input(&input);
        assert_eq!(b.into_irect(&ctx), Ok(IRect::new(25, 20, 35, 30)));

        // A standard input makes the filter region the default.
        let b = builder(&ctx, None, None, Some(5.0), None)
            .add_input(&input)
            .add_input(&FilterInput::StandardInput(source()));
        assert_eq!(b.into_irect(&ctx), Ok(IRect::new(10, 10, 15, 90)));
    }

    #[test]
    fn subregion_is_clipped_to_filter_region() {
        let params = FilterContextParams::new(source(), Transform::identity());
        let ctx =
            FilterContext::new(&user_space_filter(), &params, &Session::new_for_test_suite())
                .unwrap();

        let b = builder(&ctx, Some(0.0), Some(50.0), Some(200.0), Some(10.0));
        assert_eq!(b.into_irect(&ctx), Ok(IRect::new(10, 50, 90, 60)));

        let b = builder(&ctx, Some(0.0), Some(0.0), Some(5.0), Some(5.0));
        assert_eq!(b.into_irect(&ctx), Err(FilterError::EmptyRegion));
    }

    #[test]
    fn bounding_box_primitive_units() {
        let filter = Filter {
            primitive_units: PrimitiveUnits(CoordUnits::ObjectBoundingBox),
            ..user_space_filter()
        };
        let params = FilterContextParams::new(source(), Transform::new_scale(2.0, 2.0))
            .with_bbox(Rect::new(10.0, 10.0, 30.0, 40.0));
        let ctx = FilterContext::new(&filter, &params, &Session::new_for_test_suite()).unwrap();

        // The unit square maps onto the bounding box, then gets scaled by two.
        let b = builder(&ctx, Some(0.0), Some(0.5), Some(0.5), Some(0.5));
        assert_eq!(b.into_irect(&ctx), Ok(IRect::new(20, 50, 40, 80)));
    }
}
