use std::cmp::min;

use crate::surface_utils::{
    iterators::Pixels,
    shared_surface::{ExclusiveImageSurface, SurfaceType},
    ImageSurfaceDataExt, Pixel,
};
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// The `feComponentTransfer` filter primitive.
#[derive(Clone, Debug, Default)]
pub struct ComponentTransfer {
    pub in1: Input,
    pub functions: Functions,
}

/// Component transfer functions, with their parameters.
///
/// Values are in the `[0, 1]` range, as in the SVG attributes.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TransferFunction {
    #[default]
    Identity,
    Table(Vec<f64>),
    Discrete(Vec<f64>),
    Linear {
        slope: f64,
        intercept: f64,
    },
    Gamma {
        amplitude: f64,
        exponent: f64,
        offset: f64,
    },
}

/// The channel an `feFuncX` element applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

/// An `feFuncR`, `feFuncG`, `feFuncB` or `feFuncA` child element.
#[derive(Clone, Debug, PartialEq)]
pub struct FeFunc {
    pub channel: Channel,
    pub function: TransferFunction,
}

/// The function for each channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Functions {
    pub r: TransferFunction,
    pub g: TransferFunction,
    pub b: TransferFunction,
    pub a: TransferFunction,
}

impl Functions {
    /// Collects the functions of the `feFuncX` children, in document order.
    ///
    /// If there are several functions for the same channel, the last one wins; channels
    /// without a function use the identity.
    pub fn from_children(children: &[FeFunc]) -> Functions {
        let mut functions = Functions::default();

        for child in children {
            let slot = match child.channel {
                Channel::R => &mut functions.r,
                Channel::G => &mut functions.g,
                Channel::B => &mut functions.b,
                Channel::A => &mut functions.a,
            };

            *slot = child.function.clone();
        }

        functions
    }
}

impl TransferFunction {
    /// Applies the function to a channel value in `[0, 1]`.
    ///
    /// The result is not clamped.
    pub fn compute(&self, value: f64) -> f64 {
        match *self {
            TransferFunction::Identity => value,

            // A table without values is the identity function.
            TransferFunction::Table(ref values) | TransferFunction::Discrete(ref values)
                if values.is_empty() =>
            {
                value
            }

            TransferFunction::Table(ref values) => {
                let n = values.len() - 1;
                let k = (value * (n as f64)).floor() as usize;

                let k = min(k, n); // Just in case.

                if k == n {
                    return values[k];
                }

                let vk = values[k];
                let vk1 = values[k + 1];
                let k = k as f64;
                let n = n as f64;

                vk + (value - k / n) * n * (vk1 - vk)
            }

            TransferFunction::Discrete(ref values) => {
                let n = values.len();
                let k = (value * (n as f64)).floor() as usize;

                values[min(k, n - 1)]
            }

            TransferFunction::Linear { slope, intercept } => slope * value + intercept,

            TransferFunction::Gamma {
                amplitude,
                exponent,
                offset,
            } => {
                // Integral exponents are common and need no call to pow().
                let powered = if exponent.fract() == 0.0 && exponent.abs() <= f64::from(i32::MAX) {
                    value.powi(exponent as i32)
                } else {
                    value.powf(exponent)
                };

                amplitude * powered + offset
            }
        }
    }
}

impl ComponentTransfer {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds = bounds_builder.add_input(&input_1).into_irect(ctx)?;

        // Create the output surface.
        let mut surface = ExclusiveImageSurface::new_with_channels(
            ctx.source_graphic().width(),
            ctx.source_graphic().height(),
            input_1.surface().channels(),
            SurfaceType::SRgb,
        )?;

        fn compute_func(func: &TransferFunction) -> impl Fn(u8, f64, f64) -> u8 + '_ {
            move |value, alpha, new_alpha| {
                let value = f64::from(value) / 255f64;

                let unpremultiplied = if alpha == 0f64 { 0f64 } else { value / alpha };

                let new_value = func.compute(unpremultiplied);
                let new_value = clamp(new_value, 0f64, 1f64);

                ((new_value * new_alpha * 255f64) + 0.5) as u8
            }
        }

        let compute_r = compute_func(&self.functions.r);
        let compute_g = compute_func(&self.functions.g);
        let compute_b = compute_func(&self.functions.b);

        // Alpha gets special handling since everything else depends on it.
        let compute_a = |alpha| clamp(self.functions.a.compute(alpha), 0f64, 1f64);

        // Do the actual processing.
        surface.modify(&mut |data, stride, channels| {
            for (x, y, pixel) in Pixels::within(input_1.surface(), bounds) {
                let alpha = f64::from(pixel.a) / 255f64;
                let new_alpha = compute_a(alpha);

                let output_pixel = Pixel {
                    r: compute_r(pixel.r, alpha, new_alpha),
                    g: compute_g(pixel.g, alpha, new_alpha),
                    b: compute_b(pixel.b, alpha, new_alpha),
                    a: ((new_alpha * 255f64) + 0.5) as u8,
                };

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
