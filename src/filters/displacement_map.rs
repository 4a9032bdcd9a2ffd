use crate::surface_utils::{iterators::Pixels, shared_surface::ExclusiveImageSurface, Pixel};

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// Enumeration of the color channels the displacement map can source.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ColorChannel {
    R,
    G,
    B,
    A,
}

impl ColorChannel {
    fn get(self, pixel: Pixel) -> u8 {
        match self {
            ColorChannel::R => pixel.r,
            ColorChannel::G => pixel.g,
            ColorChannel::B => pixel.b,
            ColorChannel::A => pixel.a,
        }
    }
}

/// The `feDisplacementMap` filter primitive.
///
/// `in2` is the displacement map and `in1` the image that gets displaced.  A channel
/// selector of `None` leaves that axis undisplaced.
#[derive(Debug, Clone)]
pub struct DisplacementMap {
    pub in1: Input,
    pub in2: Input,
    pub scale: f64,
    pub x_channel_selector: Option<ColorChannel>,
    pub y_channel_selector: Option<ColorChannel>,
}

impl Default for DisplacementMap {
    #[inline]
    fn default() -> DisplacementMap {
        DisplacementMap {
            in1: Default::default(),
            in2: Default::default(),
            scale: 0.0,
            x_channel_selector: Some(ColorChannel::R),
            y_channel_selector: Some(ColorChannel::G),
        }
    }
}

impl DisplacementMap {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let displacement_input = ctx.get_input(&self.in2)?;
        let bounds = bounds_builder
            .add_input(&input_1)
            .add_input(&displacement_input)
            .into_irect(ctx)?;

        // Displacement map's values need to be non-premultiplied.
        let displacement_surface = displacement_input.surface().unpremultiply(bounds)?;

        let paffine = ctx.paffine();
        let (sx, sy) = (self.scale * paffine.xx, self.scale * paffine.yy);

        let mut surface = ExclusiveImageSurface::new_with_channels(
            ctx.source_graphic().width(),
            ctx.source_graphic().height(),
            input_1.surface().channels(),
            input_1.surface().surface_type(),
        )?;

        for (x, y, displacement_pixel) in Pixels::within(&displacement_surface, bounds) {
            let displace = |selector: Option<ColorChannel>, scale: f64| {
                selector.map_or(0.0, |channel| {
                    scale * (f64::from(channel.get(displacement_pixel)) / 255.0 - 0.5)
                })
            };

            let ox = f64::from(x) + displace(self.x_channel_selector, sx);
            let oy = f64::from(y) + displace(self.y_channel_selector, sy);

            let pixel = input_1.surface().interpolate_bilinear(bounds, ox, oy);
            surface.set_pixel(pixel, x, y);
        }

        Ok(FilterOutput {
            surface: surface.share(),
            bounds,
        })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1
            .get_requirements()
            .fold(self.in2.get_requirements())
    }
}
