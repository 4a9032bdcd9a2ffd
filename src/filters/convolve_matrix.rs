use nalgebra::DMatrix;

use crate::rect::IRect;
use crate::surface_utils::{
    iterators::{PixelRectangle, Pixels},
    shared_surface::{ExclusiveImageSurface, SurfaceType},
    EdgeMode, ImageSurfaceDataExt, Pixel, PixelOps,
};
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// The `feConvolveMatrix` filter primitive.
#[derive(Debug, Clone)]
pub struct ConvolveMatrix {
    pub in1: Input,
    /// Number of columns and rows of the kernel.
    pub order: (u32, u32),
    /// The kernel, in row-major order; it must have `order.0 * order.1` values.
    pub kernel_matrix: Vec<f64>,
    /// Zero means "use the sum of the kernel values".
    pub divisor: f64,
    /// Added to every channel after dividing, as a fraction of full intensity.
    pub bias: f64,
    /// The target is a tap index, so its offset in pixels grows with `kernel_unit_length`.
    pub target_x: Option<u32>,
    pub target_y: Option<u32>,
    pub edge_mode: EdgeMode,
    pub kernel_unit_length: Option<(f64, f64)>,
    pub preserve_alpha: bool,
}

impl Default for ConvolveMatrix {
    /// Constructs a new `ConvolveMatrix` with empty properties.
    #[inline]
    fn default() -> ConvolveMatrix {
        ConvolveMatrix {
            in1: Default::default(),
            order: (3, 3),
            kernel_matrix: Vec::new(),
            divisor: 0.0,
            bias: 0.0,
            target_x: None,
            target_y: None,
            edge_mode: EdgeMode::Duplicate,
            kernel_unit_length: None,
            preserve_alpha: false,
        }
    }
}

impl ConvolveMatrix {
    /// Checks the parameters and returns the kernel and the target point.
    fn kernel(&self) -> Result<(DMatrix<f64>, u32, u32), FilterError> {
        let (cols, rows) = self.order;

        if cols == 0 || rows == 0 {
            return Err(FilterError::InvalidParameter(
                "order must be greater than zero".to_string(),
            ));
        }

        if self.kernel_matrix.len() != cols as usize * rows as usize {
            return Err(FilterError::InvalidParameter(format!(
                "kernelMatrix has {} values, expected {}",
                self.kernel_matrix.len(),
                cols * rows
            )));
        }

        let target_x = match self.target_x {
            Some(x) if x >= cols => {
                return Err(FilterError::InvalidParameter(
                    "targetX must be less than orderX".to_string(),
                ))
            }
            Some(x) => x,
            None => cols / 2,
        };

        let target_y = match self.target_y {
            Some(y) if y >= rows => {
                return Err(FilterError::InvalidParameter(
                    "targetY must be less than orderY".to_string(),
                ))
            }
            Some(y) => y,
            None => rows / 2,
        };

        let matrix = DMatrix::from_row_slice(rows as usize, cols as usize, &self.kernel_matrix);

        Ok((matrix, target_x, target_y))
    }

    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        #![allow(clippy::many_single_char_names)]

        let input_1 = ctx.get_input(&self.in1)?;
        let bounds = bounds_builder.add_input(&input_1).into_irect(ctx)?;

        let (matrix, target_x, target_y) = self.kernel()?;
        let (cols, rows) = (self.order.0 as i32, self.order.1 as i32);

        let divisor = if self.divisor != 0.0 {
            self.divisor
        } else {
            let d = matrix.iter().sum();

            if d != 0.0 {
                d
            } else {
                1.0
            }
        };

        // The distance between kernel taps, in device pixels.
        let (dx, dy) = match self.kernel_unit_length {
            Some((kx, ky)) => {
                let paffine = ctx.paffine();
                let step = |v: f64| (v.abs().round() as i32).max(1);
                (step(kx * paffine.xx), step(ky * paffine.yy))
            }
            None => (1, 1),
        };

        let kernel_span = |taps: i32, step: i32| {
            taps.checked_mul(step).ok_or_else(|| {
                FilterError::InvalidParameter("kernelUnitLength is too large".to_string())
            })
        };
        let (span_x, span_y) = (kernel_span(cols, dx)?, kernel_span(rows, dy)?);

        let input_surface = input_1.surface();

        let mut surface = ExclusiveImageSurface::new_with_channels(
            ctx.source_graphic().width(),
            ctx.source_graphic().height(),
            input_surface.channels(),
            SurfaceType::SRgb,
        )?;

        surface.modify(&mut |data, stride, channels| {
            for (x, y, pixel) in Pixels::within(input_surface, bounds) {
                let x0 = x as i32 - target_x as i32 * dx;
                let y0 = y as i32 - target_y as i32 * dy;
                let kernel_bounds = IRect::new(
                    x0,
                    y0,
                    x0.saturating_add(span_x),
                    y0.saturating_add(span_y),
                );

                let mut r = 0.0;
                let mut g = 0.0;
                let mut b = 0.0;
                let mut a = 0.0;

                for (sx, sy, sample) in
                    PixelRectangle::within(input_surface, bounds, kernel_bounds, self.edge_mode)
                        .with_step(dx, dy)
                {
                    if sample.a == 0 {
                        continue;
                    }

                    // The kernel is applied rotated by 180 degrees.
                    let kx = (cols - (sx - x0) / dx - 1) as usize;
                    let ky = (rows - (sy - y0) / dy - 1) as usize;
                    let k = matrix[(ky, kx)];

                    let alpha = u32::from(sample.a);
                    let unpremultiply = |c: u8| f64::from(u32::from(c) * 255 / alpha);

                    r += unpremultiply(sample.r) * k;
                    g += unpremultiply(sample.g) * k;
                    b += unpremultiply(sample.b) * k;
                    a += f64::from(sample.a) * k;
                }

                let compute = |sum: f64| {
                    let v = sum / divisor + self.bias * 255.0;
                    (clamp(v, 0.0, 255.0) + 0.5) as u8
                };

                let output_pixel = Pixel {
                    r: compute(r),
                    g: compute(g),
                    b: compute(b),
                    a: if self.preserve_alpha {
                        pixel.a
                    } else {
                        compute(a)
                    },
                }
                .premultiply();

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
