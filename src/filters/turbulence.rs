use crate::surface_utils::{shared_surface::SurfaceType, Pixel, PixelOps};
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::FilterError;

/// Enumeration of the tile stitching modes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StitchTiles {
    Stitch,
    NoStitch,
}

crate::enum_default!(StitchTiles, StitchTiles::NoStitch);

/// Enumeration of the noise types.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum NoiseType {
    FractalNoise,
    Turbulence,
}

crate::enum_default!(NoiseType, NoiseType::Turbulence);

/// The `feTurbulence` filter primitive.
#[derive(Debug, Clone)]
pub struct Turbulence {
    pub base_frequency: (f64, f64),
    pub num_octaves: i32,
    /// The `seed` attribute; it is a number, truncated to an integer before use.
    pub seed: f64,
    pub stitch_tiles: StitchTiles,
    pub type_: NoiseType,
}

impl Default for Turbulence {
    fn default() -> Turbulence {
        Turbulence {
            base_frequency: (0.0, 0.0),
            num_octaves: 1,
            seed: 0.0,
            stitch_tiles: Default::default(),
            type_: Default::default(),
        }
    }
}

// Produces results in the range [1, 2**31 - 2].
// Algorithm is: r = (a * r) mod m
// where a = 16807 and m = 2**31 - 1 = 2147483647
// See [Park & Miller], CACM vol. 31 no. 10 p. 1195, Oct. 1988
// To test: the algorithm should produce the result 1043618065
// as the 10,000th generated number if the original seed is 1.
const RAND_M: i32 = 2147483647; // 2**31 - 1
const RAND_A: i32 = 16807; // 7**5; primitive root of m
const RAND_Q: i32 = 127773; // m / a
const RAND_R: i32 = 2836; // m % a

fn setup_seed(mut seed: i32) -> i32 {
    if seed <= 0 {
        seed = -(seed % (RAND_M - 1)) + 1;
    }
    if seed > RAND_M - 1 {
        seed = RAND_M - 1;
    }
    seed
}

fn random(seed: i32) -> i32 {
    let mut result = RAND_A * (seed % RAND_Q) - RAND_R * (seed / RAND_Q);
    if result <= 0 {
        result += RAND_M;
    }
    result
}

const B_SIZE: usize = 0x100;
const PERLIN_N: i32 = 0x1000;

/// Lattice and per-channel gradient tables, fully determined by the seed.
struct NoiseGenerator {
    base_frequency: (f64, f64),
    num_octaves: i32,
    stitch_tiles: StitchTiles,
    type_: NoiseType,

    tile_width: f64,
    tile_height: f64,

    lattice_selector: [usize; B_SIZE + B_SIZE + 2],
    gradient: [[[f64; 2]; B_SIZE + B_SIZE + 2]; 4],
}

#[derive(Clone, Copy)]
struct StitchInfo {
    width: usize, // How much to subtract to wrap for stitching.
    height: usize,
    wrap_x: usize, // Minimum value to wrap.
    wrap_y: usize,
}

impl NoiseGenerator {
    fn new(turbulence: &Turbulence, tile_width: f64, tile_height: f64) -> Self {
        let (fx, fy) = turbulence.base_frequency;

        let mut rv = Self {
            base_frequency: (fx.max(0.0), fy.max(0.0)),
            num_octaves: turbulence.num_octaves,
            type_: turbulence.type_,
            stitch_tiles: turbulence.stitch_tiles,

            tile_width,
            tile_height,

            lattice_selector: [0; B_SIZE + B_SIZE + 2],
            gradient: [[[0.0; 2]; B_SIZE + B_SIZE + 2]; 4],
        };

        let seed = clamp(
            turbulence.seed.trunc(),
            f64::from(i32::MIN),
            f64::from(i32::MAX),
        ) as i32;
        let mut seed = setup_seed(seed);

        for channel in rv.gradient.iter_mut() {
            for (i, gradient) in channel.iter_mut().take(B_SIZE).enumerate() {
                rv.lattice_selector[i] = i;

                for g in gradient.iter_mut() {
                    seed = random(seed);
                    *g = f64::from((seed % (B_SIZE + B_SIZE) as i32) - B_SIZE as i32)
                        / B_SIZE as f64;
                }

                let s = (gradient[0] * gradient[0] + gradient[1] * gradient[1]).sqrt();
                gradient[0] /= s;
                gradient[1] /= s;
            }
        }

        for i in (1..B_SIZE).rev() {
            let k = rv.lattice_selector[i];
            seed = random(seed);
            let j = seed as usize % B_SIZE;
            rv.lattice_selector[i] = rv.lattice_selector[j];
            rv.lattice_selector[j] = k;
        }

        for i in 0..B_SIZE + 2 {
            rv.lattice_selector[B_SIZE + i] = rv.lattice_selector[i];
            for channel in rv.gradient.iter_mut() {
                channel[B_SIZE + i] = channel[i];
            }
        }

        rv
    }

    fn noise2(&self, color_channel: usize, vec: [f64; 2], stitch_info: Option<StitchInfo>) -> f64 {
        const BM: usize = 0xff;

        let s_curve = |t: f64| t * t * (3. - 2. * t);
        let lerp = |t: f64, a: f64, b: f64| a + t * (b - a);

        let t = vec[0] + f64::from(PERLIN_N);
        let mut bx0 = t as usize;
        let mut bx1 = bx0 + 1;
        let rx0 = t.fract();
        let rx1 = rx0 - 1.0;
        let t = vec[1] + f64::from(PERLIN_N);
        let mut by0 = t as usize;
        let mut by1 = by0 + 1;
        let ry0 = t.fract();
        let ry1 = ry0 - 1.0;

        // If stitching, adjust lattice points accordingly.
        if let Some(stitch_info) = stitch_info {
            if bx0 >= stitch_info.wrap_x {
                bx0 -= stitch_info.width;
            }
            if bx1 >= stitch_info.wrap_x {
                bx1 -= stitch_info.width;
            }
            if by0 >= stitch_info.wrap_y {
                by0 -= stitch_info.height;
            }
            if by1 >= stitch_info.wrap_y {
                by1 -= stitch_info.height;
            }
        }

        bx0 &= BM;
        bx1 &= BM;
        by0 &= BM;
        by1 &= BM;

        let i = self.lattice_selector[bx0];
        let j = self.lattice_selector[bx1];
        let b00 = self.lattice_selector[i + by0];
        let b10 = self.lattice_selector[j + by0];
        let b01 = self.lattice_selector[i + by1];
        let b11 = self.lattice_selector[j + by1];

        let sx = s_curve(rx0);
        let sy = s_curve(ry0);

        let gradient = &self.gradient[color_channel];
        let dot = |q: [f64; 2], rx: f64, ry: f64| rx * q[0] + ry * q[1];

        let a = lerp(sx, dot(gradient[b00], rx0, ry0), dot(gradient[b10], rx1, ry0));
        let b = lerp(sx, dot(gradient[b01], rx0, ry1), dot(gradient[b11], rx1, ry1));

        lerp(sy, a, b)
    }

    /// Adjusts a base frequency so that the noise is periodic over `tile_size`.
    fn stitched_frequency(frequency: f64, tile_size: f64) -> f64 {
        if frequency == 0.0 {
            return frequency;
        }

        let freq_lo = (tile_size * frequency).floor() / tile_size;
        let freq_hi = (tile_size * frequency).ceil() / tile_size;

        if frequency / freq_lo < freq_hi / frequency {
            freq_lo
        } else {
            freq_hi
        }
    }

    fn turbulence(&self, color_channel: usize, point: [f64; 2], tile_x: f64, tile_y: f64) -> f64 {
        let mut stitch_info = None;
        let mut base_frequency = self.base_frequency;

        if self.stitch_tiles == StitchTiles::Stitch {
            // When stitching tiled turbulence, the frequencies must be adjusted
            // so that the tile borders will be continuous.
            base_frequency = (
                Self::stitched_frequency(base_frequency.0, self.tile_width),
                Self::stitched_frequency(base_frequency.1, self.tile_height),
            );

            // Set up initial stitch values.
            let width = (self.tile_width * base_frequency.0 + 0.5) as usize;
            let height = (self.tile_height * base_frequency.1 + 0.5) as usize;
            stitch_info = Some(StitchInfo {
                width,
                wrap_x: (tile_x * base_frequency.0) as usize + PERLIN_N as usize + width,
                height,
                wrap_y: (tile_y * base_frequency.1) as usize + PERLIN_N as usize + height,
            });
        }

        let mut sum = 0.0;
        let mut vec = [point[0] * base_frequency.0, point[1] * base_frequency.1];
        let mut ratio = 1.0;

        for _ in 0..self.num_octaves {
            let noise = self.noise2(color_channel, vec, stitch_info);

            sum += match self.type_ {
                NoiseType::FractalNoise => noise,
                NoiseType::Turbulence => noise.abs(),
            } / ratio;

            vec[0] *= 2.0;
            vec[1] *= 2.0;
            ratio *= 2.0;

            if let Some(stitch_info) = stitch_info.as_mut() {
                // Update stitch values. Subtracting PerlinN before the multiplication and
                // adding it afterward simplifies to subtracting it once.
                stitch_info.width *= 2;
                stitch_info.wrap_x = 2 * stitch_info.wrap_x - PERLIN_N as usize;
                stitch_info.height *= 2;
                stitch_info.wrap_y = 2 * stitch_info.wrap_y - PERLIN_N as usize;
            }
        }

        sum
    }
}

impl Turbulence {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let bounds = bounds_builder.into_irect(ctx)?;

        let mut surface = ctx.source_graphic().new_like(SurfaceType::SRgb)?;

        if self.num_octaves <= 0 {
            return Ok(FilterOutput {
                surface: surface.share(),
                bounds,
            });
        }

        let affine = ctx.paffine_inverse();

        let noise_generator = NoiseGenerator::new(
            self,
            f64::from(bounds.width()),
            f64::from(bounds.height()),
        );

        for y in bounds.y_range() {
            for x in bounds.x_range() {
                let point = affine.transform_point(f64::from(x), f64::from(y));
                let point = [point.0, point.1];

                let generate = |color_channel| {
                    let v = noise_generator.turbulence(
                        color_channel,
                        point,
                        f64::from(x - bounds.x0),
                        f64::from(y - bounds.y0),
                    );

                    let v = match self.type_ {
                        NoiseType::FractalNoise => (v * 255.0 + 255.0) / 2.0,
                        NoiseType::Turbulence => v * 255.0,
                    };

                    (clamp(v, 0.0, 255.0) + 0.5) as u8
                };

                let pixel = Pixel {
                    r: generate(0),
                    g: generate(1),
                    b: generate(2),
                    a: generate(3),
                }
                .premultiply();

                surface.set_pixel(pixel, x as u32, y as u32);
            }
        }

        Ok(FilterOutput {
            surface: surface.share(),
            bounds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::filters::test_utils::{render_chain, render_one, surface_from_fn};
    use crate::filters::{FilterPrimitive, PrimitiveParams};
    use crate::surface_utils::iterators::Pixels;
    use crate::surface_utils::shared_surface::SharedImageSurface;

    fn blank() -> SharedImageSurface {
        surface_from_fn(16, 16, |_, _| Pixel::default())
    }

    fn noise(type_: NoiseType, seed: f64) -> Turbulence {
        Turbulence {
            base_frequency: (0.1, 0.2),
            num_octaves: 3,
            seed,
            type_,
            ..Default::default()
        }
    }

    #[test]
    fn turbulence_rng() {
        let mut r = 1;
        r = setup_seed(r);

        for _ in 0..10_000 {
            r = random(r);
        }

        assert_eq!(r, 1043618065);
    }

    #[test]
    fn seeds_are_clamped() {
        assert_eq!(setup_seed(0), 1);
        assert_eq!(setup_seed(-5), 6);
        assert_eq!(setup_seed(RAND_M), RAND_M - 1);
    }

    #[test]
    fn output_is_deterministic() {
        let source = blank();
        let params = || PrimitiveParams::Turbulence(noise(NoiseType::FractalNoise, 7.0));

        let first = render_one(params(), &source);
        let second = render_one(params(), &source);
        assert_eq!(first.data(), second.data());

        // Seeds are truncated.
        let truncated = render_one(
            PrimitiveParams::Turbulence(noise(NoiseType::FractalNoise, 7.9)),
            &source,
        );
        assert_eq!(first.data(), truncated.data());

        let other = render_one(
            PrimitiveParams::Turbulence(noise(NoiseType::FractalNoise, 8.0)),
            &source,
        );
        assert_ne!(first.data(), other.data());
    }

    #[test]
    fn output_is_premultiplied() {
        for &type_ in &[NoiseType::FractalNoise, NoiseType::Turbulence] {
            let output = render_one(PrimitiveParams::Turbulence(noise(type_, 3.0)), &blank());

            assert!(Pixels::new(&output).all(|(_, _, pixel)| pixel.is_premultiplied()));
        }
    }

    #[test]
    fn zero_octaves_is_transparent() {
        for &type_ in &[NoiseType::FractalNoise, NoiseType::Turbulence] {
            let output = render_one(
                PrimitiveParams::Turbulence(Turbulence {
                    num_octaves: 0,
                    ..noise(type_, 1.0)
                }),
                &blank(),
            );

            assert!(Pixels::new(&output).all(|(_, _, pixel)| pixel == Pixel::default()));
        }
    }

    #[test]
    fn negative_frequency_is_zero() {
        let render_with = |base_frequency| {
            render_one(
                PrimitiveParams::Turbulence(Turbulence {
                    base_frequency,
                    ..noise(NoiseType::FractalNoise, 2.0)
                }),
                &blank(),
            )
        };

        assert_eq!(
            render_with((-0.5, -1.0)).data(),
            render_with((0.0, 0.0)).data()
        );
    }

    #[test]
    fn fills_only_the_subregion() {
        let output = render_chain(
            &blank(),
            vec![FilterPrimitive::new(PrimitiveParams::Turbulence(Turbulence {
                stitch_tiles: StitchTiles::Stitch,
                ..noise(NoiseType::Turbulence, 4.0)
            }))
            .with_subregion(Some(4.0), Some(4.0), Some(8.0), Some(8.0))],
        );

        assert_eq!(output.get_pixel(2, 2), Pixel::default());
        assert_eq!(output.get_pixel(13, 13), Pixel::default());
        assert!(Pixels::within(&output, crate::rect::IRect::new(4, 4, 12, 12))
            .any(|(_, _, pixel)| pixel.a > 0));
    }
}
