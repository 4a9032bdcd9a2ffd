//! Lighting filters and light sources.

use float_cmp::approx_eq;
use nalgebra::{Vector2, Vector3};
use num_traits::identities::Zero;
use rgb::RGB8;
use std::cmp::max;

use crate::rect::IRect;
use crate::surface_utils::{
    shared_surface::{ExclusiveImageSurface, SharedImageSurface, SurfaceType},
    Pixel,
};
use crate::transform::Transform;
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// A light source as given in user space, by the `feDistantLight`, `fePointLight`
/// or `feSpotLight` child of a lighting primitive.
///
/// Angles are in degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum LightSource {
    Distant {
        azimuth: f64,
        elevation: f64,
    },
    Point {
        x: f64,
        y: f64,
        z: f64,
    },
    Spot {
        x: f64,
        y: f64,
        z: f64,
        points_at_x: f64,
        points_at_y: f64,
        points_at_z: f64,
        specular_exponent: f64,
        limiting_cone_angle: Option<f64>,
    },
}

impl Default for LightSource {
    fn default() -> LightSource {
        LightSource::Distant {
            azimuth: 0.0,
            elevation: 0.0,
        }
    }
}

/// A light source with the primitive transform applied.
enum TransformedLight {
    Distant {
        azimuth: f64,
        elevation: f64,
    },
    Point {
        origin: Vector3<f64>,
    },
    Spot {
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        specular_exponent: f64,
        limiting_cone_angle: Option<f64>,
    },
}

impl LightSource {
    fn transform(&self, paffine: Transform) -> TransformedLight {
        match *self {
            LightSource::Distant { azimuth, elevation } => {
                TransformedLight::Distant { azimuth, elevation }
            }

            LightSource::Point { x, y, z } => TransformedLight::Point {
                origin: transform_position(paffine, x, y, z),
            },

            LightSource::Spot {
                x,
                y,
                z,
                points_at_x,
                points_at_y,
                points_at_z,
                specular_exponent,
                limiting_cone_angle,
            } => {
                let origin = transform_position(paffine, x, y, z);
                let points_at = transform_position(paffine, points_at_x, points_at_y, points_at_z);

                let mut direction = points_at - origin;
                let _ = direction.try_normalize_mut(0.0);

                TransformedLight::Spot {
                    origin,
                    direction,
                    specular_exponent,
                    limiting_cone_angle,
                }
            }
        }
    }
}

/// Maps a light position to device space; `z` is scaled by the mean axis scale.
#[inline]
fn transform_position(t: Transform, x: f64, y: f64, z: f64) -> Vector3<f64> {
    let (x, y) = t.transform_point(x, y);
    let z = z * (t.xx.powi(2) + t.yy.powi(2)).sqrt() / std::f64::consts::SQRT_2;

    Vector3::new(x, y, z)
}

impl TransformedLight {
    /// Returns the light color reaching the sample and the unit (or null) vector
    /// from the sample to the light.
    #[inline]
    fn color_and_vector(
        &self,
        lighting_color: RGB8,
        x: f64,
        y: f64,
        z: f64,
    ) -> (RGB8, Vector3<f64>) {
        let vector = match *self {
            TransformedLight::Distant { azimuth, elevation } => {
                let azimuth = azimuth.to_radians();
                let elevation = elevation.to_radians();
                Vector3::new(
                    azimuth.cos() * elevation.cos(),
                    azimuth.sin() * elevation.cos(),
                    elevation.sin(),
                )
            }

            TransformedLight::Point { origin } | TransformedLight::Spot { origin, .. } => {
                let mut v = origin - Vector3::new(x, y, z);
                let _ = v.try_normalize_mut(0.0);
                v
            }
        };

        let color = match *self {
            TransformedLight::Spot {
                direction,
                specular_exponent,
                limiting_cone_angle,
                ..
            } => {
                let minus_l_dot_s = -vector.dot(&direction);

                match limiting_cone_angle {
                    _ if minus_l_dot_s <= 0.0 => RGB8::new(0, 0, 0),
                    Some(a) if minus_l_dot_s < a.to_radians().cos() => RGB8::new(0, 0, 0),
                    _ => {
                        let factor = minus_l_dot_s.powf(specular_exponent);
                        let compute =
                            |c: u8| (clamp(f64::from(c) * factor, 0.0, 255.0) + 0.5) as u8;

                        RGB8::new(
                            compute(lighting_color.r),
                            compute(lighting_color.g),
                            compute(lighting_color.b),
                        )
                    }
                }
            }

            _ => lighting_color,
        };

        (color, vector)
    }
}

/// The `feDiffuseLighting` filter primitive.
#[derive(Debug, Clone)]
pub struct DiffuseLighting {
    pub in1: Input,
    pub surface_scale: f64,
    pub kernel_unit_length: Option<(f64, f64)>,
    pub diffuse_constant: f64,
    pub light: LightSource,
    /// The unpremultiplied `lighting-color`.
    pub lighting_color: RGB8,
}

impl Default for DiffuseLighting {
    fn default() -> DiffuseLighting {
        DiffuseLighting {
            in1: Default::default(),
            surface_scale: 1.0,
            kernel_unit_length: None,
            diffuse_constant: 1.0,
            light: Default::default(),
            lighting_color: RGB8::new(255, 255, 255),
        }
    }
}

/// The `feSpecularLighting` filter primitive.
#[derive(Debug, Clone)]
pub struct SpecularLighting {
    pub in1: Input,
    pub surface_scale: f64,
    pub kernel_unit_length: Option<(f64, f64)>,
    pub specular_constant: f64,
    pub specular_exponent: f64,
    pub light: LightSource,
    /// The unpremultiplied `lighting-color`.
    pub lighting_color: RGB8,
}

impl Default for SpecularLighting {
    fn default() -> SpecularLighting {
        SpecularLighting {
            in1: Default::default(),
            surface_scale: 1.0,
            kernel_unit_length: None,
            specular_constant: 1.0,
            specular_exponent: 1.0,
            light: Default::default(),
            lighting_color: RGB8::new(255, 255, 255),
        }
    }
}

/// Scales the normal of a sample into a 3D vector with a `z` of 1.
#[inline]
fn surface_normal(normal: Normal, surface_scale: f64) -> Vector3<f64> {
    let mut n = normal.normal.map(|x| f64::from(x) * surface_scale / 255.);
    n.component_mul_assign(&normal.factor);
    Vector3::new(n.x, n.y, 1.0)
}

impl DiffuseLighting {
    #[inline]
    fn compute_factor(&self, normal: Normal, light_vector: Vector3<f64>) -> f64 {
        let k = if normal.normal.is_zero() {
            // Common case of (0, 0, 1) normal.
            light_vector.z
        } else {
            let normal = surface_normal(normal, self.surface_scale);
            normal.dot(&light_vector) / normal.norm()
        };

        self.diffuse_constant * k
    }
}

impl SpecularLighting {
    #[inline]
    fn compute_factor(&self, normal: Normal, light_vector: Vector3<f64>) -> f64 {
        let h = light_vector + Vector3::new(0.0, 0.0, 1.0);
        let h_norm = h.norm();

        if h_norm == 0.0 {
            return 0.0;
        }

        let n_dot_h = if normal.normal.is_zero() {
            // Common case of (0, 0, 1) normal.
            h.z / h_norm
        } else {
            let normal = surface_normal(normal, self.surface_scale);
            normal.dot(&h) / normal.norm() / h_norm
        };

        if approx_eq!(f64, self.specular_exponent, 1.0) {
            self.specular_constant * n_dot_h
        } else {
            self.specular_constant * n_dot_h.powf(self.specular_exponent)
        }
    }
}

macro_rules! impl_lighting_filter {
    ($lighting_type:ident, $alpha_func:ident) => {
        impl $lighting_type {
            pub fn render(
                &self,
                bounds_builder: BoundsBuilder,
                ctx: &FilterContext<'_>,
            ) -> Result<FilterOutput, FilterError> {
                let input_1 = ctx.get_input(&self.in1)?;
                let mut bounds = bounds_builder.add_input(&input_1).into_irect(ctx)?;
                let original_bounds = bounds;

                let scale = self
                    .kernel_unit_length
                    .map(|(dx, dy)| ctx.paffine().transform_distance(dx, dy))
                    .map(|(ox, oy)| (ox.abs(), oy.abs()))
                    .filter(|&(ox, oy)| ox > 0.0 && oy > 0.0);

                let mut input_surface = input_1.surface().clone();

                if let Some((ox, oy)) = scale {
                    // Scale the input surface to match kernel_unit_length.
                    let (new_surface, new_bounds) =
                        input_surface.scale(bounds, 1.0 / ox, 1.0 / oy)?;

                    input_surface = new_surface;
                    bounds = new_bounds;
                }

                let (bounds_w, bounds_h) = bounds.size();

                // The normals need at least a 2×2 neighbourhood.
                if bounds_w < 2 || bounds_h < 2 {
                    return Err(FilterError::LightingInputTooSmall);
                }

                let (ox, oy) = scale.unwrap_or((1.0, 1.0));

                let light = self.light.transform(ctx.paffine());

                let mut surface = ExclusiveImageSurface::new_with_channels(
                    input_surface.width(),
                    input_surface.height(),
                    input_surface.channels(),
                    SurfaceType::SRgb,
                )?;

                for y in bounds.y_range().map(|y| y as u32) {
                    for x in bounds.x_range().map(|x| x as u32) {
                        let normal = Normal::at(&input_surface, bounds, x, y);

                        let pixel = input_surface.get_pixel(x, y);
                        let z = f64::from(pixel.a) / 255.0 * self.surface_scale;

                        let (color, vector) = light.color_and_vector(
                            self.lighting_color,
                            f64::from(x) * ox,
                            f64::from(y) * oy,
                            z,
                        );

                        // compute the factor just once for the three colors
                        let factor = self.compute_factor(normal, vector);
                        let compute =
                            |c: u8| (clamp(factor * f64::from(c), 0.0, 255.0) + 0.5) as u8;

                        let r = compute(color.r);
                        let g = compute(color.g);
                        let b = compute(color.b);
                        let a = $alpha_func(r, g, b);

                        surface.set_pixel(Pixel { r, g, b, a }, x, y);
                    }
                }

                let mut surface = surface.share();

                if let Some((ox, oy)) = scale {
                    // Scale the output surface back.
                    surface = surface.scale_to(
                        ctx.source_graphic().width(),
                        ctx.source_graphic().height(),
                        original_bounds,
                        ox,
                        oy,
                    )?;

                    bounds = original_bounds;
                }

                Ok(FilterOutput { surface, bounds })
            }

            pub fn get_input_requirements(&self) -> InputRequirements {
                self.in1.get_requirements()
            }
        }
    };
}

const fn diffuse_alpha(_r: u8, _g: u8, _b: u8) -> u8 {
    255
}

fn specular_alpha(r: u8, g: u8, b: u8) -> u8 {
    max(max(r, g), b)
}

impl_lighting_filter!(DiffuseLighting, diffuse_alpha);
impl_lighting_filter!(SpecularLighting, specular_alpha);

/// 2D normal and factor stored separately.
///
/// The normal needs to be multiplied by `surface_scale * factor / 255` and
/// normalized with 1 as the z component.
/// pub for the purpose of accessing this from benchmarks.
#[derive(Debug, Clone, Copy)]
pub struct Normal {
    pub factor: Vector2<f64>,
    pub normal: Vector2<i16>,
}

impl Normal {
    /// Computes the normal of the alpha channel at `(x, y)`.
    ///
    /// This is a Sobel operator whose taps are clipped to `bounds`: on an edge or a
    /// corner the missing row or column is dropped and the factor grows to match, so
    /// the nine edge cases of the lighting filters fall out of one formula.
    ///
    /// # Panics
    /// Panics if `bounds` is smaller than 2×2.
    #[inline]
    pub fn at(surface: &SharedImageSurface, bounds: IRect, x: u32, y: u32) -> Normal {
        assert!(bounds.width() >= 2);
        assert!(bounds.height() >= 2);

        let get = |x, y| i16::from(surface.get_pixel(x, y).a);

        let (left, right) = neighbours(x, bounds.x0 as u32, bounds.x1 as u32);
        let (top, bottom) = neighbours(y, bounds.y0 as u32, bounds.y1 as u32);

        let mut nx = 0;
        let mut weight_x = 0;
        for (row, weight) in taps(top, y, bottom) {
            nx += weight * (get(right, row) - get(left, row));
            weight_x += weight;
        }

        let mut ny = 0;
        let mut weight_y = 0;
        for (column, weight) in taps(left, x, right) {
            ny += weight * (get(column, bottom) - get(column, top));
            weight_y += weight;
        }

        let factor = |weight: i16, span: u32| 2.0 / (f64::from(weight) * f64::from(span));

        // Negative nx and ny to account for the different coordinate system.
        Normal {
            factor: Vector2::new(factor(weight_x, right - left), factor(weight_y, bottom - top)),
            normal: Vector2::new(-nx, -ny),
        }
    }
}

/// Returns the previous and next coordinates of `i`, clamped to `[start, end)`.
#[inline]
fn neighbours(i: u32, start: u32, end: u32) -> (u32, u32) {
    let prev = if i > start { i - 1 } else { i };
    let next = if i + 1 < end { i + 1 } else { i };
    (prev, next)
}

/// The Sobel weights of the rows (or columns) around `center` that lie in bounds.
#[inline]
fn taps(prev: u32, center: u32, next: u32) -> impl Iterator<Item = (u32, i16)> {
    [(prev, 1), (center, 2), (next, 1)]
        .into_iter()
        .filter(move |&(i, weight)| weight == 2 || i != center)
}
