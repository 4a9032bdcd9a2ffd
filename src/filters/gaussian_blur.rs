use std::f64;

use crate::rect::IRect;
use crate::surface_utils::{
    shared_surface::{BlurDirection, Horizontal, SharedImageSurface, Vertical},
    Pixel,
};

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// Deviations at or above this use three box blurs instead of a true gaussian kernel.
const BOX_BLUR_THRESHOLD: f64 = 10.0;

/// Deviations above this are not blurred at all.
const MAXIMUM_DEVIATION: f64 = 1000.0;

/// The `feGaussianBlur` filter primitive.
#[derive(Debug, Default, Clone)]
pub struct GaussianBlur {
    pub in1: Input,
    /// Standard deviation along the X and Y axes, in primitive units.
    pub std_deviation: (f64, f64),
}

/// Computes a gaussian kernel line for the given standard deviation.
///
/// The kernel is widened a little: it is the gaussian for `std_deviation + 1`,
/// truncated at twice that.
fn gaussian_kernel(std_deviation: f64) -> Vec<f64> {
    let std_dev = std_deviation + 1.0;
    let radius = std_dev * 2.0;

    let diameter = ((2.0 * (radius - 0.5).ceil()) as usize + 1).max(1);
    let middle = diameter / 2;

    let gauss_point = |x: f64| (-x.powi(2) / (2.0 * std_dev.powi(2))).exp();

    let mut kernel = vec![0.0; diameter];

    // Fill the matrix by doing numerical integration approximation, sampling 50 points per
    // pixel. We do the upper half, mirror it to the lower half, then compute the center
    // point. Otherwise asymmetric quantization errors will occur.
    for i in middle + 1..diameter {
        let base_x = (i - middle) as f64 - 0.5;

        let sum: f64 = (1..=50)
            .map(|j| base_x + 0.02 * f64::from(j))
            .filter(|&r| r <= radius)
            .map(gauss_point)
            .sum();

        kernel[i] = sum / 50.0;
    }

    for i in 0..middle {
        kernel[i] = kernel[diameter - 1 - i];
    }

    // Find center val -- calculate an odd number of quanta to make it symmetric, even if the
    // center point is weighted slightly higher than others.
    let sum: f64 = (0..=50)
        .map(|j| gauss_point(-0.5 + 0.02 * f64::from(j)))
        .sum();
    kernel[middle] = sum / 51.0;

    // Normalize the distribution by scaling the total sum to 1.
    let sum = kernel.iter().sum::<f64>();
    kernel.iter_mut().for_each(|x| *x /= sum);

    kernel
}

/// Returns a size of the box blur kernel to approximate the gaussian blur.
fn box_blur_kernel_size(std_deviation: f64) -> usize {
    (std_deviation * 3.0 * (2.0 * f64::consts::PI).sqrt() / 4.0 + 0.5) as usize
}

/// Applies three box blurs to approximate the gaussian blur.
///
/// This is intended to be used in two steps, horizontal and vertical.
fn three_box_blurs<B: BlurDirection>(
    surface: &SharedImageSurface,
    bounds: IRect,
    std_deviation: f64,
) -> Result<SharedImageSurface, FilterError> {
    let d = box_blur_kernel_size(std_deviation);
    if d == 0 {
        return Ok(surface.clone());
    }

    let surface = if d % 2 == 1 {
        // Odd kernel sizes just get three successive box blurs.
        let mut surface = surface.clone();

        for _ in 0..3 {
            surface = surface.box_blur::<B>(bounds, d, d / 2)?;
        }

        surface
    } else {
        // Even kernel sizes get one pass centered between the output pixel and the one
        // before it, one between the output pixel and the one after it, and a last,
        // centered pass of size d + 1.
        let surface = surface.box_blur::<B>(bounds, d, d / 2 - 1)?;
        let surface = surface.box_blur::<B>(bounds, d, d / 2)?;

        let d = d + 1;
        surface.box_blur::<B>(bounds, d, d / 2)?
    };

    Ok(surface)
}

/// Convolves every line of `bounds` with a symmetric kernel.
///
/// Near the edges only the kernel taps that fall inside `bounds` are used, and the
/// result is divided by their total weight.
fn gaussian_blur<B: BlurDirection>(
    surface: &SharedImageSurface,
    bounds: IRect,
    std_deviation: f64,
) -> Result<SharedImageSurface, FilterError> {
    let kernel = gaussian_kernel(std_deviation);
    let middle = (kernel.len() / 2) as i32;

    let (main_range, other_range) = if B::IS_VERTICAL {
        (bounds.y_range(), bounds.x_range())
    } else {
        (bounds.x_range(), bounds.y_range())
    };

    let (start, end) = (main_range.start, main_range.end);

    let mut output_surface = surface.new_like(surface.surface_type())?;

    for j in other_range {
        let pixel_at = |i: i32| {
            if B::IS_VERTICAL {
                surface.get_pixel(j as u32, i as u32)
            } else {
                surface.get_pixel(i as u32, j as u32)
            }
        };

        for i in main_range.clone() {
            let first = (i - middle).max(start);
            let last = (i + middle + 1).min(end);

            let mut sum = [0.0f64; 4];
            let mut scale = 0.0;

            for k in first..last {
                let weight = kernel[(k - i + middle) as usize];
                let p = pixel_at(k);

                for (s, c) in sum.iter_mut().zip(p.iter()) {
                    *s += f64::from(c) * weight;
                }
                scale += weight;
            }

            let compute = |s: f64| (s / scale + 0.5) as u8;

            let output_pixel = Pixel {
                r: compute(sum[0]),
                g: compute(sum[1]),
                b: compute(sum[2]),
                a: compute(sum[3]),
            };

            if B::IS_VERTICAL {
                output_surface.set_pixel(output_pixel, j as u32, i as u32);
            } else {
                output_surface.set_pixel(output_pixel, i as u32, j as u32);
            }
        }
    }

    Ok(output_surface.share())
}

/// Blurs along one direction, choosing the method from the deviation.
fn blur<B: BlurDirection>(
    surface: &SharedImageSurface,
    bounds: IRect,
    std_deviation: f64,
    use_box_blur: bool,
) -> Result<SharedImageSurface, FilterError> {
    if std_deviation == 0.0 {
        Ok(surface.clone())
    } else if use_box_blur {
        three_box_blurs::<B>(surface, bounds, std_deviation)
    } else {
        gaussian_blur::<B>(surface, bounds, std_deviation)
    }
}

impl GaussianBlur {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds = bounds_builder.add_input(&input_1).into_irect(ctx)?;

        let (std_x, std_y) = self.std_deviation;
        let paffine = ctx.paffine();

        // The deviation can become negative here due to the transform.
        let std_x = (std_x.max(0.0) * paffine.xx).abs();
        let std_y = (std_y.max(0.0) * paffine.yy).abs();

        let input_surface = input_1.surface();

        // Blur the whole surface; the subregion only clips the result.
        let blur_bounds = input_surface.bounds();

        let blurred = if (std_x == 0.0 && std_y == 0.0)
            || std_x > MAXIMUM_DEVIATION
            || std_y > MAXIMUM_DEVIATION
        {
            input_surface.clone()
        } else {
            let use_box_blur = std_x >= BOX_BLUR_THRESHOLD || std_y >= BOX_BLUR_THRESHOLD;

            let horizontal =
                blur::<Horizontal>(input_surface, blur_bounds, std_x, use_box_blur)?;
            blur::<Vertical>(&horizontal, blur_bounds, std_y, use_box_blur)?
        };

        let surface = blurred.copy_surface(bounds)?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    use crate::filters::test_utils::{render_chain, render_one, surface_from_fn};
    use crate::filters::{FilterPrimitive, PrimitiveParams};
    use crate::surface_utils::iterators::Pixels;

    fn blur_source(source: &SharedImageSurface, std_x: f64, std_y: f64) -> SharedImageSurface {
        render_one(
            PrimitiveParams::GaussianBlur(GaussianBlur {
                in1: Input::SourceGraphic,
                std_deviation: (std_x, std_y),
            }),
            source,
        )
    }

    fn dot(width: i32, height: i32) -> SharedImageSurface {
        let (cx, cy) = ((width / 2) as u32, (height / 2) as u32);
        surface_from_fn(width, height, |x, y| {
            if (x, y) == (cx, cy) {
                Pixel::new(255, 255, 255, 255)
            } else {
                Pixel::default()
            }
        })
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        for &std_deviation in &[0.5, 1.0, 3.7, 9.9] {
            let kernel = gaussian_kernel(std_deviation);

            assert_eq!(kernel.len() % 2, 1);
            assert!(approx_eq!(f64, kernel.iter().sum::<f64>(), 1.0, epsilon = 1e-9));

            for i in 0..kernel.len() / 2 {
                assert!(approx_eq!(f64, kernel[i], kernel[kernel.len() - 1 - i]));
                assert!(kernel[i] <= kernel[i + 1]);
            }
        }
    }

    #[test]
    fn box_blur_sizes() {
        assert_eq!(box_blur_kernel_size(10.0), 19);
        assert_eq!(box_blur_kernel_size(16.0), 30);
    }

    #[test]
    fn zero_deviation_copies_input() {
        let source = dot(7, 7);
        let output = blur_source(&source, 0.0, 0.0);

        for (x, y, pixel) in Pixels::new(&output) {
            assert_eq!(pixel, source.get_pixel(x, y));
        }
    }

    #[test]
    fn negative_deviation_is_zero() {
        let source = dot(7, 7);
        let output = blur_source(&source, -3.0, 0.0);

        assert_eq!(output.get_pixel(3, 3), Pixel::new(255, 255, 255, 255));
    }

    #[test]
    fn uniform_surfaces_stay_uniform() {
        let source = surface_from_fn(40, 30, |_, _| Pixel::new(50, 100, 150, 200));

        for &(sx, sy) in &[(1.5, 2.5), (12.0, 3.0)] {
            let output = blur_source(&source, sx, sy);

            for (_, _, pixel) in Pixels::new(&output) {
                assert_eq!(pixel, Pixel::new(50, 100, 150, 200));
            }
        }
    }

    #[test]
    fn small_blur_spreads_symmetrically() {
        let output = blur_source(&dot(21, 21), 2.0, 2.0);

        let center = output.get_pixel(10, 10);
        assert!(center.a < 255 && center.a > 0);

        for d in 1..5 {
            let left = output.get_pixel(10 - d, 10);
            assert_eq!(left, output.get_pixel(10 + d, 10));
            assert!(left.a <= center.a);

            let above = output.get_pixel(10, 10 - d);
            assert_eq!(above, output.get_pixel(10, 10 + d));
            assert!(above.a <= center.a);
        }
    }

    #[test]
    fn large_blur_spreads_symmetrically() {
        let output = blur_source(&dot(121, 1), 10.0, 0.0);

        assert!(output.get_pixel(60, 0).a > 0);
        for d in 1..20 {
            assert_eq!(output.get_pixel(60 - d, 0), output.get_pixel(60 + d, 0));
        }
    }

    #[test]
    fn output_is_clipped_to_subregion() {
        let source = surface_from_fn(10, 10, |_, _| Pixel::new(0, 0, 0, 255));
        let output = render_chain(
            &source,
            vec![FilterPrimitive::new(PrimitiveParams::GaussianBlur(GaussianBlur {
                in1: Input::SourceGraphic,
                std_deviation: (2.0, 2.0),
            }))
            .with_subregion(Some(2.0), Some(2.0), Some(4.0), Some(4.0))],
        );

        assert_eq!(output.get_pixel(1, 3), Pixel::default());
        assert_eq!(output.get_pixel(6, 3), Pixel::default());
        assert_eq!(output.get_pixel(3, 3), Pixel::new(0, 0, 0, 255));
    }
}
