use std::cmp::{max, min};

use crate::rect::IRect;
use crate::surface_utils::{
    iterators::Pixels, shared_surface::ExclusiveImageSurface, ImageSurfaceDataExt, Pixel,
};

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// Enumeration of the possible morphology operations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Operator {
    Erode,
    Dilate,
}

crate::enum_default!(Operator, Operator::Erode);

/// The `feMorphology` filter primitive.
#[derive(Debug, Clone, Default)]
pub struct Morphology {
    pub in1: Input,
    pub operator: Operator,
    /// The `radius` attribute, in primitive units.
    pub radius: (f64, f64),
}

impl Morphology {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds = bounds_builder.add_input(&input_1).into_irect(ctx)?;

        let paffine = ctx.paffine();
        let (rx, ry) = self.radius;

        let input_surface = input_1.surface();
        let surface_bounds = input_surface.bounds();

        // Whole pixels only; the radii can become negative due to the transform.  A
        // kernel wider than the raster covers the same pixels as one exactly as wide.
        let kernel_radius = |r: f64, extent: i32| r.abs().trunc().min(f64::from(extent)) as i32;
        let kx = kernel_radius(rx * paffine.xx, surface_bounds.width());
        let ky = kernel_radius(ry * paffine.yy, surface_bounds.height());

        let (initial, op): (u8, fn(u8, u8) -> u8) = match self.operator {
            Operator::Erode => (u8::MAX, min),
            Operator::Dilate => (u8::MIN, max),
        };

        let mut surface = ExclusiveImageSurface::new_with_channels(
            ctx.source_graphic().width(),
            ctx.source_graphic().height(),
            input_surface.channels(),
            input_surface.surface_type(),
        )?;

        surface.modify(&mut |data, stride, channels| {
            for (x, y, _pixel) in Pixels::within(input_surface, bounds) {
                let (xi, yi) = (x as i32, y as i32);

                // Neighbours that fall off the raster are skipped.
                let kernel_bounds = IRect::new(
                    xi.saturating_sub(kx),
                    yi.saturating_sub(ky),
                    xi.saturating_add(kx).saturating_add(1),
                    yi.saturating_add(ky).saturating_add(1),
                )
                .intersection(&surface_bounds);

                let mut output_pixel = Pixel {
                    r: initial,
                    g: initial,
                    b: initial,
                    a: initial,
                };

                if let Some(kernel_bounds) = kernel_bounds {
                    for (_x, _y, pixel) in Pixels::within(input_surface, kernel_bounds) {
                        output_pixel.r = op(output_pixel.r, pixel.r);
                        output_pixel.g = op(output_pixel.g, pixel.g);
                        output_pixel.b = op(output_pixel.b, pixel.b);
                        output_pixel.a = op(output_pixel.a, pixel.a);
                    }
                }

                data.set_pixel(stride, channels, output_pixel, x, y);
            }
        });

        Ok(FilterOutput {
            surface: surface.share(),
            bounds,
        })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}
