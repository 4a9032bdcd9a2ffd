use crate::rect::IRect;
use crate::surface_utils::{
    iterators::Pixels,
    shared_surface::{SharedImageSurface, SurfaceError},
    Pixel,
};
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// Enumeration of the possible blending modes.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Mode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Darken,
    Lighten,
    Overlay,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

/// The `feBlend` filter primitive.
///
/// `in1` is the top layer and `in2` the one below it.
#[derive(Debug, Clone, Default)]
pub struct Blend {
    pub in1: Input,
    pub in2: Input,
    pub mode: Mode,
}

impl Mode {
    /// Blends one premultiplied color channel.
    ///
    /// `ca` and `cb` are the channels of the top and bottom layers, `qa` and `qb`
    /// their alphas, all in `[0, 1]`.
    #[inline]
    fn blend_channel(self, ca: f64, qa: f64, cb: f64, qb: f64) -> f64 {
        let bcb = (1.0 - qa) * cb + ca;
        let bca = (1.0 - qb) * ca + cb;

        match self {
            Mode::Normal => (1.0 - qa) * cb + ca,
            Mode::Multiply => (1.0 - qa) * cb + (1.0 - qb) * ca + ca * cb,
            Mode::Screen => cb + ca - ca * cb,
            Mode::Darken => f64::min((1.0 - qa) * cb + ca, (1.0 - qb) * ca + cb),
            Mode::Lighten => f64::max((1.0 - qa) * cb + ca, (1.0 - qb) * ca + cb),
            Mode::SoftLight => {
                if bcb < 0.5 {
                    2.0 * bca * bcb + bca * bca * (1.0 - 2.0 * bcb)
                } else {
                    bca.sqrt() * (2.0 * bcb - 1.0) + (2.0 * bca) * (1.0 - bcb)
                }
            }
            Mode::HardLight => {
                if cb < 0.5 {
                    2.0 * bca * bcb
                } else {
                    1.0 - 2.0 * (1.0 - bca) * (1.0 - bcb)
                }
            }
            Mode::ColorDodge => {
                if bcb == 1.0 {
                    1.0
                } else {
                    f64::min(bca / (1.0 - bcb), 1.0)
                }
            }
            Mode::ColorBurn => {
                if bcb == 0.0 {
                    0.0
                } else {
                    f64::max(1.0 - (1.0 - bca) / bcb, 0.0)
                }
            }
            Mode::Overlay => {
                if bca < 0.5 {
                    2.0 * bca * bcb
                } else {
                    1.0 - 2.0 * (1.0 - bca) * (1.0 - bcb)
                }
            }
            Mode::Exclusion => bca + bcb - 2.0 * bca * bcb,
            Mode::Difference => (bca - bcb).abs(),
        }
    }

    /// Blends the premultiplied pixel `top` onto `bottom`.
    ///
    /// Channels are rounded to the nearest 8-bit value, then clamped to the resulting
    /// alpha so the output is always a valid premultiplied pixel.
    pub fn apply(self, top: Pixel, bottom: Pixel) -> Pixel {
        let qa = f64::from(top.a) / 255.0;
        let qb = f64::from(bottom.a) / 255.0;
        let qr = 1.0 - (1.0 - qa) * (1.0 - qb);

        let a = (clamp(qr * 255.0, 0.0, 255.0) + 0.5) as u8;

        let compute = |ca: u8, cb: u8| {
            let cr = self.blend_channel(f64::from(ca) / 255.0, qa, f64::from(cb) / 255.0, qb);
            let cr = (clamp(cr * 255.0, 0.0, 255.0) + 0.5) as u8;
            cr.min(a)
        };

        Pixel {
            r: compute(top.r, bottom.r),
            g: compute(top.g, bottom.g),
            b: compute(top.b, bottom.b),
            a,
        }
    }
}

/// Blends `top` onto `bottom` inside `bounds`; the rest of the result is transparent.
fn blend_surfaces(
    top: &SharedImageSurface,
    bottom: &SharedImageSurface,
    bounds: IRect,
    mode: Mode,
) -> Result<SharedImageSurface, SurfaceError> {
    let mut output_surface = top.new_like(top.surface_type().combine(bottom.surface_type()))?;

    for (x, y, pixel) in Pixels::within(top, bounds) {
        let output_pixel = mode.apply(pixel, bottom.get_pixel(x, y));
        output_surface.set_pixel(output_pixel, x, y);
    }

    Ok(output_surface.share())
}

impl Blend {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let input_2 = ctx.get_input(&self.in2)?;
        let bounds = bounds_builder
            .add_input(&input_1)
            .add_input(&input_2)
            .into_irect(ctx)?;

        let surface = blend_surfaces(input_1.surface(), input_2.surface(), bounds, self.mode)?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1
            .get_requirements()
            .fold(self.in2.get_requirements())
    }
}
