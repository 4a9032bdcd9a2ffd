//! Shared access to premultiplied ARGB32 pixel buffers.
use std::rc::Rc;

use byteorder::{ByteOrder, NativeEndian};
use tiny_skia::{Pixmap, PixmapPaint};

use crate::rect::IRect;
use crate::util::clamp;

use super::{iterators::Pixels, ChannelMap, ImageSurfaceDataExt, Pixel, PixelOps};

/// Largest width or height accepted for a surface.
///
/// This is the same limit that Cairo imposes on its image surfaces.
pub const MAX_SURFACE_SIZE: i32 = 32767;

/// Errors from creating or wrapping a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// The requested size is zero, negative or above [`MAX_SURFACE_SIZE`].
    #[error("invalid surface size {width}×{height}")]
    InvalidSize { width: i32, height: i32 },

    /// A row of pixels does not fit in the stride.
    #[error("stride of {stride} bytes is too small for {width} pixels")]
    InvalidStride { width: i32, stride: usize },

    /// The buffer length does not match `stride * height`.
    #[error("pixel buffer has {len} bytes but {expected} are needed")]
    InvalidLength { len: usize, expected: usize },

    /// The pixel buffer could not be allocated.
    #[error("out of memory while allocating a {width}×{height} surface")]
    OutOfMemory { width: i32, height: i32 },
}

/// Types of pixel data in a `ImageSurface`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SurfaceType {
    /// The pixel data is premultiplied sRGB with alpha.
    SRgb,
    /// The pixel data is alpha-only (contains meaningful data only in the alpha channel).
    ///
    /// A number of methods are optimized for alpha-only surfaces. For example, blurring
    /// only needs to touch the alpha channel.
    AlphaOnly,
}

impl SurfaceType {
    /// Combines surface types
    ///
    /// If combining two alpha-only surfaces, the result is alpha-only.
    /// Otherwise the result carries color.
    pub fn combine(self, other: SurfaceType) -> SurfaceType {
        match (self, other) {
            (SurfaceType::AlphaOnly, SurfaceType::AlphaOnly) => SurfaceType::AlphaOnly,
            _ => SurfaceType::SRgb,
        }
    }
}

/// Porter-Duff operators supported by `ImageSurface<Shared>::compose`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Operator {
    Over,
    In,
    Out,
    Atop,
    Xor,
}

impl From<Operator> for tiny_skia::BlendMode {
    fn from(operator: Operator) -> tiny_skia::BlendMode {
        use tiny_skia::BlendMode;

        match operator {
            Operator::Over => BlendMode::SourceOver,
            Operator::In => BlendMode::SourceIn,
            Operator::Out => BlendMode::SourceOut,
            Operator::Atop => BlendMode::SourceAtop,
            Operator::Xor => BlendMode::Xor,
        }
    }
}

/// Read-only access to the bytes behind an `ImageSurface`.
pub trait PixelData {
    fn bytes(&self) -> &[u8];
}

/// Wrapper for a pixel buffer that enforces exclusive access when modifying it.
///
/// Filter outputs are referenced from several places at once: the last result, the
/// table of named results, and any primitive currently reading them.  A shared buffer
/// is reference counted and never written again.
///
/// It uses the typestate pattern to ensure that the buffer can be modified only when
/// it is in the `Exclusive` state, while in the `Shared` state it only allows read-only access.
#[derive(Debug, Clone)]
pub struct ImageSurface<T> {
    data: T,

    width: i32,
    height: i32,
    stride: isize,

    channels: ChannelMap,
    surface_type: SurfaceType,
}

#[derive(Debug, Clone)]
pub struct Shared(Rc<Vec<u8>>);

/// Shared state of `ImageSurface`
pub type SharedImageSurface = ImageSurface<Shared>;

#[derive(Debug)]
pub struct Exclusive(Vec<u8>);

/// Exclusive state of `ImageSurface`
pub type ExclusiveImageSurface = ImageSurface<Exclusive>;

impl PixelData for Shared {
    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PixelData for Exclusive {
    #[inline]
    fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A compile-time blur direction variable.
pub trait BlurDirection {
    const IS_VERTICAL: bool;
}

/// Vertical blur direction.
pub enum Vertical {}
/// Horizontal blur direction.
pub enum Horizontal {}

impl BlurDirection for Vertical {
    const IS_VERTICAL: bool = true;
}

impl BlurDirection for Horizontal {
    const IS_VERTICAL: bool = false;
}

/// A compile-time alpha-only marker variable.
pub trait IsAlphaOnly {
    const IS_ALPHA_ONLY: bool;
}

/// Alpha-only.
pub enum AlphaOnly {}
/// Not alpha-only.
pub enum NotAlphaOnly {}

impl IsAlphaOnly for AlphaOnly {
    const IS_ALPHA_ONLY: bool = true;
}

impl IsAlphaOnly for NotAlphaOnly {
    const IS_ALPHA_ONLY: bool = false;
}

fn check_size(width: i32, height: i32) -> Result<(usize, usize), SurfaceError> {
    if width <= 0 || height <= 0 || width > MAX_SURFACE_SIZE || height > MAX_SURFACE_SIZE {
        return Err(SurfaceError::InvalidSize { width, height });
    }

    let w = cast::usize(width).map_err(|_| SurfaceError::InvalidSize { width, height })?;
    let h = cast::usize(height).map_err(|_| SurfaceError::InvalidSize { width, height })?;

    Ok((w, h))
}

impl<T> ImageSurface<T> {
    /// Returns the surface width.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Returns the surface height.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Returns the surface stride.
    #[inline]
    pub fn stride(&self) -> isize {
        self.stride
    }

    /// Returns the byte layout of the pixels.
    #[inline]
    pub fn channels(&self) -> ChannelMap {
        self.channels
    }

    /// Returns the type of this surface.
    #[inline]
    pub fn surface_type(&self) -> SurfaceType {
        self.surface_type
    }

    /// Returns the rectangle covering the whole surface.
    #[inline]
    pub fn bounds(&self) -> IRect {
        IRect::from_size(self.width, self.height)
    }
}

impl<T: PixelData> ImageSurface<T> {
    /// Retrieves the pixel value at the given coordinates.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        assert!(x < self.width as u32);
        assert!(y < self.height as u32);

        let offset = y as usize * self.stride as usize + x as usize * 4;
        self.channels.read(&self.data.bytes()[offset..offset + 4])
    }

    /// Retrieves the pixel value by offset into the pixel data array.
    #[inline]
    pub fn get_pixel_by_offset(&self, offset: isize) -> Pixel {
        assert!(offset >= 0);
        assert!(offset < self.stride * self.height as isize);

        let offset = offset as usize;
        self.channels.read(&self.data.bytes()[offset..offset + 4])
    }

    /// Raw access to the image data as a slice.
    #[inline]
    pub fn data(&self) -> &[u8] {
        self.data.bytes()
    }
}

impl ImageSurface<Shared> {
    /// Wraps a pixel buffer produced elsewhere.
    ///
    /// The buffer must hold premultiplied pixels laid out according to `channels`, with
    /// `stride >= width * 4` and `data.len() == stride * height`.
    pub fn from_data(
        width: i32,
        height: i32,
        stride: usize,
        data: Vec<u8>,
        channels: ChannelMap,
        surface_type: SurfaceType,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let (w, h) = check_size(width, height)?;

        if stride < w * 4 {
            return Err(SurfaceError::InvalidStride { width, stride });
        }

        let expected = stride
            .checked_mul(h)
            .ok_or(SurfaceError::InvalidSize { width, height })?;

        if data.len() != expected {
            return Err(SurfaceError::InvalidLength {
                len: data.len(),
                expected,
            });
        }

        Ok(SharedImageSurface {
            data: Shared(Rc::new(data)),
            width,
            height,
            stride: stride as isize,
            channels,
            surface_type,
        })
    }

    /// Wraps native-endian ARGB32 words, the way Cairo stores them.
    pub fn from_argb32(
        width: i32,
        height: i32,
        pixels: &[u32],
    ) -> Result<SharedImageSurface, SurfaceError> {
        let (w, h) = check_size(width, height)?;

        if pixels.len() != w * h {
            return Err(SurfaceError::InvalidLength {
                len: pixels.len() * 4,
                expected: w * h * 4,
            });
        }

        let mut surface = ExclusiveImageSurface::new(width, height, SurfaceType::SRgb)?;

        for (i, &p) in pixels.iter().enumerate() {
            surface.set_pixel(Pixel::from_u32(p), (i % w) as u32, (i / w) as u32);
        }

        Ok(surface.share())
    }

    /// Creates an empty surface of the given size and channel layout.
    #[inline]
    pub fn empty(
        width: i32,
        height: i32,
        channels: ChannelMap,
        surface_type: SurfaceType,
    ) -> Result<Self, SurfaceError> {
        Ok(ExclusiveImageSurface::new_with_channels(width, height, channels, surface_type)?.share())
    }

    /// Returns the pixels as native-endian ARGB32 words packed into bytes.
    pub fn to_argb32_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.width as usize * self.height as usize * 4];

        for (x, y, pixel) in Pixels::new(self) {
            let offset = (y as usize * self.width as usize + x as usize) * 4;
            NativeEndian::write_u32(&mut bytes[offset..offset + 4], pixel.to_u32());
        }

        bytes
    }

    /// Returns the same pixels laid out with another channel map.
    pub fn to_channels(&self, channels: ChannelMap) -> Result<SharedImageSurface, SurfaceError> {
        if channels == self.channels {
            return Ok(self.clone());
        }

        let mut output_surface = ExclusiveImageSurface::new_with_channels(
            self.width,
            self.height,
            channels,
            self.surface_type,
        )?;

        for (x, y, pixel) in Pixels::new(self) {
            output_surface.set_pixel(pixel, x, y);
        }

        Ok(output_surface.share())
    }

    /// Returns `true` if the surface contains meaningful data only in the alpha channel.
    #[inline]
    fn is_alpha_only(&self) -> bool {
        self.surface_type == SurfaceType::AlphaOnly
    }

    /// Creates an empty surface with the same size and layout as this one.
    #[inline]
    pub fn new_like(
        &self,
        surface_type: SurfaceType,
    ) -> Result<ExclusiveImageSurface, SurfaceError> {
        ExclusiveImageSurface::new_with_channels(
            self.width,
            self.height,
            self.channels,
            surface_type,
        )
    }

    /// Returns a copy of this surface with everything outside `bounds` cleared.
    pub fn copy_surface(&self, bounds: IRect) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(self.surface_type)?;

        for (x, y, pixel) in Pixels::within(self, bounds) {
            output_surface.set_pixel(pixel, x, y);
        }

        Ok(output_surface.share())
    }

    /// Returns a surface with black background and alpha channel matching this surface.
    pub fn extract_alpha(&self, bounds: IRect) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(SurfaceType::AlphaOnly)?;

        for (x, y, Pixel { a, .. }) in Pixels::within(self, bounds) {
            let output_pixel = Pixel {
                r: 0,
                g: 0,
                b: 0,
                a,
            };
            output_surface.set_pixel(output_pixel, x, y);
        }

        Ok(output_surface.share())
    }

    /// Returns a surface with pre-multiplication of color values undone.
    ///
    /// The result is only meant as a lookup table for other primitives; it is never
    /// stored as a filter result.
    pub fn unpremultiply(&self, bounds: IRect) -> Result<SharedImageSurface, SurfaceError> {
        // Unpremultiplication doesn't affect the alpha channel.
        if self.is_alpha_only() {
            return Ok(self.clone());
        }

        let mut output_surface = self.new_like(self.surface_type)?;

        for (x, y, pixel) in Pixels::within(self, bounds) {
            output_surface.set_pixel(pixel.unpremultiply(), x, y);
        }

        Ok(output_surface.share())
    }

    /// Samples the surface at a fractional position with bilinear interpolation.
    ///
    /// Only the corners lying inside `bounds` contribute, and their weights are
    /// renormalized.  Returns transparent black when no corner is inside.
    pub fn interpolate_bilinear(&self, bounds: IRect, x: f64, y: f64) -> Pixel {
        let (fx, fy) = (x.floor(), y.floor());
        let (tx, ty) = (x - fx, y - fy);
        let (fx, fy) = (fx as i32, fy as i32);

        let corners = [
            (fx, fy, (1.0 - tx) * (1.0 - ty)),
            (fx + 1, fy, tx * (1.0 - ty)),
            (fx + 1, fy + 1, tx * ty),
            (fx, fy + 1, (1.0 - tx) * ty),
        ];

        let mut sum = [0.0f64; 4];
        let mut total = 0.0;

        for &(cx, cy, weight) in &corners {
            if weight <= 0.0 || !bounds.contains(cx, cy) {
                continue;
            }

            let p = self.get_pixel(cx as u32, cy as u32);
            for (s, c) in sum.iter_mut().zip(p.iter()) {
                *s += f64::from(c) * weight;
            }
            total += weight;
        }

        if total <= 0.0 {
            return Pixel::default();
        }

        let compute = |v: f64| (clamp(v / total, 0.0, 255.0) + 0.5) as u8;

        Pixel {
            r: compute(sum[0]),
            g: compute(sum[1]),
            b: compute(sum[2]),
            a: compute(sum[3]),
        }
    }

    /// Scales part of the surface by `(x, y)` into a new surface of the given size.
    ///
    /// Only the destination pixels inside `bounds` are computed.
    pub fn scale_to(
        &self,
        width: i32,
        height: i32,
        bounds: IRect,
        x: f64,
        y: f64,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = ExclusiveImageSurface::new_with_channels(
            width,
            height,
            self.channels,
            self.surface_type,
        )?;

        let source_bounds = self.bounds();

        if let Some(bounds) = bounds.intersection(&output_surface.bounds()) {
            for oy in bounds.y_range() {
                for ox in bounds.x_range() {
                    let sx = (f64::from(ox) + 0.5) / x - 0.5;
                    let sy = (f64::from(oy) + 0.5) / y - 0.5;

                    let pixel = self.interpolate_bilinear(source_bounds, sx, sy);
                    output_surface.set_pixel(pixel, ox as u32, oy as u32);
                }
            }
        }

        Ok(output_surface.share())
    }

    /// Returns a scaled version of a surface and bounds.
    pub fn scale(
        &self,
        bounds: IRect,
        x: f64,
        y: f64,
    ) -> Result<(SharedImageSurface, IRect), SurfaceError> {
        let new_width = (f64::from(self.width) * x).ceil() as i32;
        let new_height = (f64::from(self.height) * y).ceil() as i32;
        let new_bounds = bounds.scale(x, y);

        Ok((
            self.scale_to(new_width, new_height, new_bounds, x, y)?,
            new_bounds,
        ))
    }

    /// Performs a horizontal or vertical box blur.
    ///
    /// The `target` parameter determines the position of the output pixel inside the
    /// kernel: the pixels covered are `[i - target, i - target + kernel_size)`.  Only
    /// pixels inside `bounds` are read; near the edges the sum is divided by the number
    /// of covered pixels rather than by `kernel_size`.
    ///
    /// # Panics
    /// Panics if `kernel_size` is `0` or if `target >= kernel_size`.
    // This is public (and not inlined into box_blur()) for the purpose of accessing it from the
    // benchmarks.
    pub fn box_blur_loop<B: BlurDirection, A: IsAlphaOnly>(
        &self,
        output_surface: &mut ExclusiveImageSurface,
        bounds: IRect,
        kernel_size: usize,
        target: usize,
    ) {
        assert_ne!(kernel_size, 0);
        assert!(target < kernel_size);
        assert_eq!(self.is_alpha_only(), A::IS_ALPHA_ONLY);

        let (main_range, other_range) = if B::IS_VERTICAL {
            (bounds.y_range(), bounds.x_range())
        } else {
            (bounds.x_range(), bounds.y_range())
        };

        let (start, end) = (main_range.start, main_range.end);
        let kernel_size = kernel_size as i32;
        let target = target as i32;

        let pixel_at = |i: i32, j: i32| {
            if B::IS_VERTICAL {
                self.get_pixel(j as u32, i as u32)
            } else {
                self.get_pixel(i as u32, j as u32)
            }
        };

        for j in other_range {
            let mut sum = [0u32; 4];

            let add = |sum: &mut [u32; 4], i: i32, sign: bool| {
                let p = pixel_at(i, j);
                let values = [p.r, p.g, p.b, p.a];

                for (c, s) in sum.iter_mut().enumerate() {
                    if A::IS_ALPHA_ONLY && c < 3 {
                        continue;
                    }

                    if sign {
                        *s += u32::from(values[c]);
                    } else {
                        *s -= u32::from(values[c]);
                    }
                }
            };

            // The window for output pixel i is [lo, hi).
            let mut lo = start - target;
            let mut hi = lo + kernel_size;

            for i in lo.max(start)..hi.min(end) {
                add(&mut sum, i, true);
            }

            for i in main_range.clone() {
                let coverage = (hi.min(end) - lo.max(start)) as u32;

                if coverage > 0 {
                    let compute = |s: u32| ((s + coverage / 2) / coverage) as u8;

                    let output_pixel = if A::IS_ALPHA_ONLY {
                        Pixel {
                            r: 0,
                            g: 0,
                            b: 0,
                            a: compute(sum[3]),
                        }
                    } else {
                        Pixel {
                            r: compute(sum[0]),
                            g: compute(sum[1]),
                            b: compute(sum[2]),
                            a: compute(sum[3]),
                        }
                    };

                    if B::IS_VERTICAL {
                        output_surface.set_pixel(output_pixel, j as u32, i as u32);
                    } else {
                        output_surface.set_pixel(output_pixel, i as u32, j as u32);
                    }
                }

                if lo >= start && lo < end {
                    add(&mut sum, lo, false);
                }
                if hi >= start && hi < end {
                    add(&mut sum, hi, true);
                }

                lo += 1;
                hi += 1;
            }
        }
    }

    /// Performs a horizontal or vertical box blur.
    ///
    /// See [`box_blur_loop`](Self::box_blur_loop) for the meaning of the parameters.
    #[inline]
    pub fn box_blur<B: BlurDirection>(
        &self,
        bounds: IRect,
        kernel_size: usize,
        target: usize,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(self.surface_type)?;

        if self.is_alpha_only() {
            self.box_blur_loop::<B, AlphaOnly>(&mut output_surface, bounds, kernel_size, target);
        } else {
            self.box_blur_loop::<B, NotAlphaOnly>(&mut output_surface, bounds, kernel_size, target);
        }

        Ok(output_surface.share())
    }

    /// Fills the given bounds with a premultiplied color.
    pub fn flood(&self, bounds: IRect, color: Pixel) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(SurfaceType::SRgb)?;

        if color.a > 0 {
            if let Some(bounds) = bounds.intersection(&self.bounds()) {
                for y in bounds.y_range() {
                    for x in bounds.x_range() {
                        output_surface.set_pixel(color, x as u32, y as u32);
                    }
                }
            }
        }

        Ok(output_surface.share())
    }

    /// Offsets the image of the specified amount of whole pixels.
    ///
    /// Destination pixels whose source lies outside `bounds` are left transparent.
    pub fn offset(
        &self,
        bounds: IRect,
        dx: i32,
        dy: i32,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(self.surface_type)?;

        // output_bounds contains all pixels within bounds,
        // for which (x - dx) and (y - dy) also lie within bounds.
        if let Some(output_bounds) = bounds.translate((dx, dy)).intersection(&bounds) {
            for y in output_bounds.y_range() {
                for x in output_bounds.x_range() {
                    let pixel = self.get_pixel((x - dx) as u32, (y - dy) as u32);
                    output_surface.set_pixel(pixel, x as u32, y as u32);
                }
            }
        }

        Ok(output_surface.share())
    }

    /// Fills `bounds` by repeating the contents of `tile_bounds`.
    pub fn tile(
        &self,
        tile_bounds: IRect,
        bounds: IRect,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(self.surface_type)?;

        if tile_bounds.is_empty() {
            return Ok(output_surface.share());
        }

        let (tile_w, tile_h) = tile_bounds.size();

        for y in bounds.y_range() {
            let sy = tile_bounds.y0 + (y - tile_bounds.y0).rem_euclid(tile_h);

            for x in bounds.x_range() {
                let sx = tile_bounds.x0 + (x - tile_bounds.x0).rem_euclid(tile_w);

                let pixel = self.get_pixel(sx as u32, sy as u32);
                output_surface.set_pixel(pixel, x as u32, y as u32);
            }
        }

        Ok(output_surface.share())
    }

    /// Copies the pixels inside `bounds` into an RGBA pixmap the size of `bounds`.
    fn to_pixmap(&self, bounds: IRect) -> Result<Pixmap, SurfaceError> {
        let (width, height) = bounds.size();
        let mut pixmap = Pixmap::new(width as u32, height as u32)
            .ok_or(SurfaceError::InvalidSize { width, height })?;

        let stride = width as usize * 4;
        let data = pixmap.data_mut();

        for (x, y, pixel) in Pixels::within(self, bounds) {
            data.set_pixel(
                stride,
                ChannelMap::RGBA,
                pixel,
                (x as i32 - bounds.x0) as u32,
                (y as i32 - bounds.y0) as u32,
            );
        }

        Ok(pixmap)
    }

    /// Performs the combination of two input surfaces using Porter-Duff
    /// compositing operators.
    ///
    /// `self` is the source and `other` the destination.  The result holds `other`
    /// composited with `self` inside `bounds`, and is transparent outside.
    pub fn compose(
        &self,
        other: &SharedImageSurface,
        bounds: IRect,
        operator: Operator,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(self.surface_type.combine(other.surface_type))?;

        let bounds = match bounds.intersection(&self.bounds()) {
            Some(bounds) => bounds,
            None => return Ok(output_surface.share()),
        };

        let source = self.to_pixmap(bounds)?;
        let mut destination = other.to_pixmap(bounds)?;

        let paint = PixmapPaint {
            blend_mode: operator.into(),
            ..Default::default()
        };

        destination.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &paint,
            tiny_skia::Transform::identity(),
            None,
        );

        let stride = bounds.width() as usize * 4;
        let data = destination.data();

        for y in bounds.y_range() {
            for x in bounds.x_range() {
                let offset = (y - bounds.y0) as usize * stride + (x - bounds.x0) as usize * 4;
                let pixel = ChannelMap::RGBA.read(&data[offset..offset + 4]);
                output_surface.set_pixel(pixel, x as u32, y as u32);
            }
        }

        Ok(output_surface.share())
    }

    /// Performs the combination of two input surfaces.
    ///
    /// Each pixel of the resulting image is computed using the following formula:
    /// `res = k1*i1*i2 + k2*i1 + k3*i2 + k4`
    #[inline]
    pub fn compose_arithmetic(
        &self,
        other: &SharedImageSurface,
        bounds: IRect,
        k1: f64,
        k2: f64,
        k3: f64,
        k4: f64,
    ) -> Result<SharedImageSurface, SurfaceError> {
        let mut output_surface = self.new_like(self.surface_type.combine(other.surface_type))?;

        composite_arithmetic(self, other, &mut output_surface, bounds, k1, k2, k3, k4);

        Ok(output_surface.share())
    }
}

/// Performs the arithmetic composite operation. Public for benchmarking.
#[inline]
#[allow(clippy::too_many_arguments)]
pub fn composite_arithmetic(
    surface1: &SharedImageSurface,
    surface2: &SharedImageSurface,
    output_surface: &mut ExclusiveImageSurface,
    bounds: IRect,
    k1: f64,
    k2: f64,
    k3: f64,
    k4: f64,
) {
    for (x, y, pixel, pixel_2) in
        Pixels::within(surface1, bounds).map(|(x, y, p)| (x, y, p, surface2.get_pixel(x, y)))
    {
        let i1a = f64::from(pixel.a) / 255f64;
        let i2a = f64::from(pixel_2.a) / 255f64;
        let oa = k1 * i1a * i2a + k2 * i1a + k3 * i2a + k4;
        let oa = clamp(oa, 0f64, 1f64);

        // Freshly allocated surfaces are transparent, so if the resulting pixel is
        // transparent there's no need to do anything.
        if oa > 0f64 {
            let compute = |i1, i2| {
                let i1 = f64::from(i1) / 255f64;
                let i2 = f64::from(i2) / 255f64;

                let o = k1 * i1 * i2 + k2 * i1 + k3 * i2 + k4;
                let o = clamp(o, 0f64, oa);

                ((o * 255f64) + 0.5) as u8
            };

            let output_pixel = Pixel {
                r: compute(pixel.r, pixel_2.r),
                g: compute(pixel.g, pixel_2.g),
                b: compute(pixel.b, pixel_2.b),
                a: ((oa * 255f64) + 0.5) as u8,
            };

            output_surface.set_pixel(output_pixel, x, y);
        }
    }
}

impl ImageSurface<Exclusive> {
    /// Creates a transparent surface in Cairo's native channel order.
    #[inline]
    pub fn new(
        width: i32,
        height: i32,
        surface_type: SurfaceType,
    ) -> Result<ExclusiveImageSurface, SurfaceError> {
        Self::new_with_channels(width, height, ChannelMap::cairo(), surface_type)
    }

    /// Creates a transparent surface with the given channel order.
    pub fn new_with_channels(
        width: i32,
        height: i32,
        channels: ChannelMap,
        surface_type: SurfaceType,
    ) -> Result<ExclusiveImageSurface, SurfaceError> {
        let (w, h) = check_size(width, height)?;

        let stride = w * 4;
        let len = stride * h;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| SurfaceError::OutOfMemory { width, height })?;
        data.resize(len, 0);

        Ok(ExclusiveImageSurface {
            data: Exclusive(data),
            width,
            height,
            stride: stride as isize,
            channels,
            surface_type,
        })
    }

    /// Publishes the surface; it can no longer be modified.
    #[inline]
    pub fn share(self) -> SharedImageSurface {
        SharedImageSurface {
            data: Shared(Rc::new(self.data.0)),
            width: self.width,
            height: self.height,
            stride: self.stride,
            channels: self.channels,
            surface_type: self.surface_type,
        }
    }

    /// Sets the pixel at the given coordinates.
    #[inline]
    pub fn set_pixel(&mut self, pixel: Pixel, x: u32, y: u32) {
        assert!(x < self.width as u32);
        assert!(y < self.height as u32);

        let stride = self.stride as usize;
        let channels = self.channels;
        self.data.0.set_pixel(stride, channels, pixel, x, y);
    }

    /// Modify the image data
    #[inline]
    pub fn modify(&mut self, draw_fn: &mut dyn FnMut(&mut [u8], usize, ChannelMap)) {
        let stride = self.stride as usize;
        let channels = self.channels;

        draw_fn(&mut self.data.0, stride, channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface_utils::iterators::Pixels;

    fn surface_from_fn(
        width: i32,
        height: i32,
        f: impl Fn(u32, u32) -> Pixel,
    ) -> SharedImageSurface {
        let mut surface = ExclusiveImageSurface::new(width, height, SurfaceType::SRgb).unwrap();

        for y in 0..height as u32 {
            for x in 0..width as u32 {
                surface.set_pixel(f(x, y), x, y);
            }
        }

        surface.share()
    }

    #[test]
    fn test_extract_alpha() {
        const WIDTH: i32 = 32;
        const HEIGHT: i32 = 64;

        let bounds = IRect::new(8, 24, 16, 48);
        let full_bounds = IRect::from_size(WIDTH, HEIGHT);

        let mut surface = ExclusiveImageSurface::new(WIDTH, HEIGHT, SurfaceType::SRgb).unwrap();

        // Fill the surface with some data.
        surface.modify(&mut |data, _, _| {
            let mut counter = 0u16;
            for x in data.iter_mut() {
                *x = counter as u8;
                counter = (counter + 1) % 256;
            }
        });

        let surface = surface.share();
        let alpha = surface.extract_alpha(bounds).unwrap();

        for (x, y, p, pa) in
            Pixels::within(&surface, full_bounds).map(|(x, y, p)| (x, y, p, alpha.get_pixel(x, y)))
        {
            assert_eq!(pa.r, 0);
            assert_eq!(pa.g, 0);
            assert_eq!(pa.b, 0);

            if !bounds.contains(x as i32, y as i32) {
                assert_eq!(pa.a, 0);
            } else {
                assert_eq!(pa.a, p.a);
            }
        }
    }

    #[test]
    fn rejects_bad_sizes() {
        assert_eq!(
            ExclusiveImageSurface::new(0, 10, SurfaceType::SRgb).unwrap_err(),
            SurfaceError::InvalidSize {
                width: 0,
                height: 10
            }
        );

        assert!(ExclusiveImageSurface::new(MAX_SURFACE_SIZE + 1, 1, SurfaceType::SRgb).is_err());
    }

    #[test]
    fn from_data_checks_layout() {
        assert_eq!(
            SharedImageSurface::from_data(
                2,
                2,
                4,
                vec![0; 8],
                ChannelMap::RGBA,
                SurfaceType::SRgb
            )
            .unwrap_err(),
            SurfaceError::InvalidStride {
                width: 2,
                stride: 4
            }
        );

        assert_eq!(
            SharedImageSurface::from_data(
                2,
                2,
                12,
                vec![0; 16],
                ChannelMap::RGBA,
                SurfaceType::SRgb
            )
            .unwrap_err(),
            SurfaceError::InvalidLength {
                len: 16,
                expected: 24
            }
        );

        // Padding at the end of each row is allowed.
        let mut data = vec![0; 24];
        data[12..16].copy_from_slice(&[10, 20, 30, 40]);
        let surface =
            SharedImageSurface::from_data(2, 2, 12, data, ChannelMap::RGBA, SurfaceType::SRgb)
                .unwrap();
        assert_eq!(surface.get_pixel(0, 1), Pixel::new(10, 20, 30, 40));
    }

    #[test]
    fn argb32_round_trip() {
        let words = [0x80402010, 0xff00ff00, 0, 0x01010101];
        let surface = SharedImageSurface::from_argb32(2, 2, &words).unwrap();

        assert_eq!(surface.get_pixel(0, 0), Pixel::new(0x40, 0x20, 0x10, 0x80));

        let bytes = surface.to_argb32_bytes();
        let back: Vec<u32> = bytes.chunks(4).map(NativeEndian::read_u32).collect();
        assert_eq!(back, words);
    }

    #[test]
    fn compose_over_opaque_source_replaces_destination() {
        let red = surface_from_fn(4, 4, |_, _| Pixel::new(255, 0, 0, 255));
        let blue = surface_from_fn(4, 4, |_, _| Pixel::new(0, 0, 255, 255));
        let bounds = IRect::new(1, 1, 3, 3);

        let out = red.compose(&blue, bounds, Operator::Over).unwrap();

        assert_eq!(out.get_pixel(1, 1), Pixel::new(255, 0, 0, 255));
        assert_eq!(out.get_pixel(0, 0), Pixel::default());
    }

    #[test]
    fn compose_operators_on_half_transparent_pixels() {
        let src = surface_from_fn(1, 1, |_, _| Pixel::new(128, 0, 0, 128));
        let dst = surface_from_fn(1, 1, |_, _| Pixel::new(0, 0, 255, 255));

        let compose = |operator| {
            src.compose(&dst, src.bounds(), operator)
                .unwrap()
                .get_pixel(0, 0)
        };

        let close = |a: Pixel, b: Pixel| {
            a.iter().zip(b.iter()).all(|(a, b)| (i16::from(a) - i16::from(b)).abs() <= 1)
        };

        assert!(close(compose(Operator::Over), Pixel::new(128, 0, 127, 255)));
        assert!(close(compose(Operator::In), Pixel::new(128, 0, 0, 128)));
        assert_eq!(compose(Operator::Out), Pixel::default());
        assert!(close(compose(Operator::Atop), Pixel::new(128, 0, 127, 255)));
        assert!(close(compose(Operator::Xor), Pixel::new(0, 0, 127, 127)));
    }

    #[test]
    fn compose_keeps_channel_layout() {
        let src = Pixel::new(40, 80, 120, 160);
        let dst = Pixel::new(200, 10, 0, 255);

        let compose_with = |channels| {
            let make = |pixel| {
                let mut surface =
                    ExclusiveImageSurface::new_with_channels(3, 2, channels, SurfaceType::SRgb)
                        .unwrap();
                surface.set_pixel(pixel, 1, 1);
                surface.share()
            };

            make(src)
                .compose(&make(dst), IRect::new(1, 0, 3, 2), Operator::Over)
                .unwrap()
        };

        let bgra = compose_with(ChannelMap::BGRA);
        let rgba = compose_with(ChannelMap::RGBA);

        assert_eq!(bgra.get_pixel(1, 1), rgba.get_pixel(1, 1));
        assert_eq!(bgra.get_pixel(0, 1), Pixel::default());
        assert!((110..=120).contains(&bgra.get_pixel(1, 1).r));
    }

    #[test]
    fn box_blur_keeps_flat_areas() {
        let surface = surface_from_fn(8, 3, |_, _| Pixel::new(10, 20, 30, 40));
        let bounds = surface.bounds();

        let out = surface.box_blur::<Horizontal>(bounds, 4, 1).unwrap();

        for (_, _, p) in Pixels::new(&out) {
            assert_eq!(p, Pixel::new(10, 20, 30, 40));
        }
    }

    #[test]
    fn box_blur_spreads_a_single_pixel() {
        let surface = surface_from_fn(5, 1, |x, _| {
            if x == 2 {
                Pixel::new(0, 0, 0, 255)
            } else {
                Pixel::default()
            }
        });

        let out = surface.box_blur::<Horizontal>(surface.bounds(), 3, 1).unwrap();

        let alphas: Vec<u8> = Pixels::new(&out).map(|(_, _, p)| p.a).collect();
        assert_eq!(alphas, vec![0, 85, 85, 85, 0]);
    }

    #[test]
    fn offset_clears_vacated_pixels() {
        let surface = surface_from_fn(4, 4, |x, y| Pixel::new(0, 0, 0, (x + y * 4) as u8));
        let out = surface.offset(surface.bounds(), 1, 0).unwrap();

        assert_eq!(out.get_pixel(0, 2), Pixel::default());
        assert_eq!(out.get_pixel(1, 2), surface.get_pixel(0, 2));
        assert_eq!(out.get_pixel(3, 3), surface.get_pixel(2, 3));
    }

    #[test]
    fn bilinear_interpolation_between_two_pixels() {
        let surface = surface_from_fn(2, 1, |x, _| {
            if x == 0 {
                Pixel::new(0, 0, 0, 0)
            } else {
                Pixel::new(200, 200, 200, 200)
            }
        });

        let p = surface.interpolate_bilinear(surface.bounds(), 0.5, 0.0);
        assert_eq!(p, Pixel::new(100, 100, 100, 100));

        // Outside corners don't pull the value towards zero.
        let p = surface.interpolate_bilinear(surface.bounds(), 1.5, 0.0);
        assert_eq!(p, Pixel::new(200, 200, 200, 200));
    }
}
