//! Various utilities for working with premultiplied ARGB32 pixel buffers.

pub mod iterators;
pub mod shared_surface;

/// Modes which specify how the values of out of bounds pixels are computed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EdgeMode {
    /// The nearest inbounds pixel value is returned.
    Duplicate,
    /// The image is extended by taking the color values from the opposite of the image.
    ///
    /// Imagine the image being tiled infinitely, with the original image at the origin.
    Wrap,
    /// Zero RGBA values are returned.
    None,
}

crate::enum_default!(EdgeMode, EdgeMode::Duplicate);

/// A pixel consisting of R, G, B and A values.
pub type Pixel = rgb::RGBA8;

/// Byte offsets of the logical R, G, B and A channels inside a 4-byte pixel.
///
/// Cairo stores ARGB32 pixels as native-endian `0xaarrggbb` words, which on a
/// little-endian machine puts blue in the first byte.  Other producers hand us
/// plain RGBA bytes.  Each surface carries its own map; filters read and write
/// logical [`Pixel`] values and never look at raw byte order.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ChannelMap([usize; 4]);

impl ChannelMap {
    /// Bytes in R, G, B, A order.
    pub const RGBA: ChannelMap = ChannelMap([0, 1, 2, 3]);

    /// Bytes in B, G, R, A order; Cairo's layout on little-endian machines.
    pub const BGRA: ChannelMap = ChannelMap([2, 1, 0, 3]);

    /// Bytes in A, R, G, B order; Cairo's layout on big-endian machines.
    pub const ARGB: ChannelMap = ChannelMap([1, 2, 3, 0]);

    /// Creates a map from the byte offsets of R, G, B and A.
    ///
    /// Returns `None` if the offsets are not a permutation of `0..4`.
    pub fn new(offsets: [usize; 4]) -> Option<ChannelMap> {
        let mut seen = [false; 4];

        for &o in &offsets {
            if o > 3 || seen[o] {
                return None;
            }
            seen[o] = true;
        }

        Some(ChannelMap(offsets))
    }

    /// The layout of Cairo's `CAIRO_FORMAT_ARGB32` on this machine.
    #[cfg(target_endian = "little")]
    #[inline]
    pub fn cairo() -> ChannelMap {
        ChannelMap::BGRA
    }

    /// The layout of Cairo's `CAIRO_FORMAT_ARGB32` on this machine.
    #[cfg(target_endian = "big")]
    #[inline]
    pub fn cairo() -> ChannelMap {
        ChannelMap::ARGB
    }

    #[inline]
    pub fn offsets(self) -> [usize; 4] {
        self.0
    }

    /// Reads a logical pixel from the first four bytes of `bytes`.
    #[inline]
    pub fn read(self, bytes: &[u8]) -> Pixel {
        let [r, g, b, a] = self.0;

        Pixel {
            r: bytes[r],
            g: bytes[g],
            b: bytes[b],
            a: bytes[a],
        }
    }

    /// Writes a logical pixel into the first four bytes of `bytes`.
    #[inline]
    pub fn write(self, bytes: &mut [u8], pixel: Pixel) {
        let [r, g, b, a] = self.0;

        bytes[r] = pixel.r;
        bytes[g] = pixel.g;
        bytes[b] = pixel.b;
        bytes[a] = pixel.a;
    }
}

impl Default for ChannelMap {
    fn default() -> ChannelMap {
        ChannelMap::cairo()
    }
}

/// Extension methods for raw pixel rows.
pub trait ImageSurfaceDataExt {
    /// Sets the pixel at the given coordinates, laid out according to `channels`.
    fn set_pixel(&mut self, stride: usize, channels: ChannelMap, pixel: Pixel, x: u32, y: u32);
}

impl ImageSurfaceDataExt for [u8] {
    #[inline]
    fn set_pixel(&mut self, stride: usize, channels: ChannelMap, pixel: Pixel, x: u32, y: u32) {
        let offset = y as usize * stride + x as usize * 4;
        channels.write(&mut self[offset..offset + 4], pixel);
    }
}

pub trait PixelOps {
    fn premultiply(self) -> Self;
    fn unpremultiply(self) -> Self;
    fn diff(&self, other: &Self) -> Self;
    fn is_premultiplied(&self) -> bool;
    fn to_u32(&self) -> u32;
    fn from_u32(x: u32) -> Self;
}

impl PixelOps for Pixel {
    /// Returns an unpremultiplied value of this pixel.
    ///
    /// For a fully transparent pixel, a transparent black pixel will be returned.
    #[inline]
    fn unpremultiply(self) -> Self {
        if self.a == 0 {
            Self {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            }
        } else {
            let alpha = f32::from(self.a) / 255.0;
            self.map_rgb(|x| ((f32::from(x) / alpha) + 0.5) as u8)
        }
    }

    /// Returns a premultiplied value of this pixel.
    #[inline]
    fn premultiply(self) -> Self {
        let a = self.a as u32;
        self.map_rgb(|x| (((x as u32) * a + 127) / 255) as u8)
    }

    #[inline]
    fn diff(&self, other: &Pixel) -> Pixel {
        self.iter()
            .zip(other.iter())
            .map(|(l, r)| (l as i32 - r as i32).unsigned_abs() as u8)
            .collect()
    }

    /// Whether no color component exceeds alpha.
    #[inline]
    fn is_premultiplied(&self) -> bool {
        self.r <= self.a && self.g <= self.a && self.b <= self.a
    }

    /// Returns the pixel value as a `u32`, in the same format as Cairo's `ARGB32`.
    #[inline]
    fn to_u32(&self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }

    /// Converts a `u32` in the same format as Cairo's `ARGB32` into a `Pixel`.
    #[inline]
    fn from_u32(x: u32) -> Self {
        Self {
            r: ((x >> 16) & 0xFF) as u8,
            g: ((x >> 8) & 0xFF) as u8,
            b: (x & 0xFF) as u8,
            a: ((x >> 24) & 0xFF) as u8,
        }
    }
}
