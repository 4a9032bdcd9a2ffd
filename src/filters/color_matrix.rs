use nalgebra::{Matrix3, Matrix4x5, Matrix5, Vector5};

use crate::surface_utils::{
    iterators::Pixels,
    shared_surface::{ExclusiveImageSurface, SurfaceType},
    ImageSurfaceDataExt, Pixel,
};
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// The `feColorMatrix` filter primitive.
///
/// The `saturate`, `hueRotate` and `luminanceToAlpha` types are expanded into a
/// general matrix by the constructors; rendering only knows about the matrix.
#[derive(Debug, Clone)]
pub struct ColorMatrix {
    pub in1: Input,
    pub matrix: Matrix5<f64>,
}

impl Default for ColorMatrix {
    fn default() -> ColorMatrix {
        ColorMatrix {
            in1: Default::default(),
            // nalgebra's Default for Matrix5 is all zeroes, so we actually need this :(
            matrix: Matrix5::identity(),
        }
    }
}

impl ColorMatrix {
    /// A `type="matrix"` primitive from the 20 values of its `values` attribute,
    /// in row-major order.
    ///
    /// Any other number of values gives the identity matrix.
    pub fn from_values(in1: Input, values: &[f64]) -> ColorMatrix {
        let matrix = if values.len() == 20 {
            let matrix = Matrix4x5::from_row_slice(values);
            let mut matrix = matrix.fixed_resize(0.0);
            matrix[(4, 4)] = 1.0;
            matrix
        } else {
            Matrix5::identity()
        };

        ColorMatrix { in1, matrix }
    }

    /// A `type="saturate"` primitive.
    pub fn saturate(in1: Input, s: f64) -> ColorMatrix {
        ColorMatrix {
            in1,
            matrix: Self::saturate_matrix(s),
        }
    }

    /// A `type="hueRotate"` primitive; the angle is in degrees.
    pub fn hue_rotate(in1: Input, degrees: f64) -> ColorMatrix {
        ColorMatrix {
            in1,
            matrix: Self::hue_rotate_matrix(degrees.to_radians()),
        }
    }

    /// A `type="luminanceToAlpha"` primitive.
    pub fn luminance_to_alpha(in1: Input) -> ColorMatrix {
        ColorMatrix {
            in1,
            matrix: Self::luminance_to_alpha_matrix(),
        }
    }

    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds = bounds_builder.add_input(&input_1).into_irect(ctx)?;

        let mut surface = ExclusiveImageSurface::new_with_channels(
            ctx.source_graphic().width(),
            ctx.source_graphic().height(),
            input_1.surface().channels(),
            SurfaceType::SRgb,
        )?;

        surface.modify(&mut |data, stride, channels| {
            for (x, y, pixel) in Pixels::within(input_1.surface(), bounds) {
                let alpha = f64::from(pixel.a) / 255f64;

                let pixel_vec = if alpha == 0.0 {
                    Vector5::new(0.0, 0.0, 0.0, 0.0, 1.0)
                } else {
                    Vector5::new(
                        f64::from(pixel.r) / 255f64 / alpha,
                        f64::from(pixel.g) / 255f64 / alpha,
                        f64::from(pixel.b) / 255f64 / alpha,
                        alpha,
                        1.0,
                    )
                };
                let mut new_pixel_vec = Vector5::zeros();
                self.matrix.mul_to(&pixel_vec, &mut new_pixel_vec);

                let new_alpha = clamp(new_pixel_vec[3], 0.0, 1.0);

                let premultiply = |x: f64| ((clamp(x, 0.0, 1.0) * new_alpha * 255f64) + 0.5) as u8;

                let output_pixel = Pixel {
                    r: premultiply(new_pixel_vec[0]),
                    g: premultiply(new_pixel_vec[1]),
                    b: premultiply(new_pixel_vec[2]),
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

    /// Compute a `type="hueRotate"` matrix.
    #[rustfmt::skip]
    pub fn hue_rotate_matrix(radians: f64) -> Matrix5<f64> {
        let (sin, cos) = radians.sin_cos();

        let a = Matrix3::new(
            0.213, 0.715, 0.072,
            0.213, 0.715, 0.072,
            0.213, 0.715, 0.072,
        );

        let b = Matrix3::new(
             0.787, -0.715, -0.072,
            -0.213,  0.285, -0.072,
            -0.213, -0.715,  0.928,
        );

        let c = Matrix3::new(
            -0.213, -0.715,  0.928,
             0.143,  0.140, -0.283,
            -0.787,  0.715,  0.072,
        );

        let top_left = a + b * cos + c * sin;

        let mut matrix = top_left.fixed_resize(0.0);
        matrix[(3, 3)] = 1.0;
        matrix[(4, 4)] = 1.0;
        matrix
    }

    /// Compute a `type="luminanceToAlpha"` matrix.
    #[rustfmt::skip]
    pub fn luminance_to_alpha_matrix() -> Matrix5<f64> {
        Matrix5::new(
            0.0,    0.0,    0.0,    0.0, 0.0,
            0.0,    0.0,    0.0,    0.0, 0.0,
            0.0,    0.0,    0.0,    0.0, 0.0,
            0.2125, 0.7154, 0.0721, 0.0, 0.0,
            0.0,    0.0,    0.0,    0.0, 1.0,
        )
    }

    /// Compute a `type="saturate"` matrix.
    #[rustfmt::skip]
    pub fn saturate_matrix(s: f64) -> Matrix5<f64> {
        Matrix5::new(
            0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s, 0.0, 0.0,
            0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s, 0.0, 0.0,
            0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s, 0.0, 0.0,
            0.0,               0.0,               0.0,               1.0, 0.0,
            0.0,               0.0,               0.0,               0.0, 1.0,
        )
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}
