//! Pixel iterators for `SharedImageSurface`.
use crate::rect::IRect;
use crate::util::clamp;

use super::shared_surface::SharedImageSurface;
use super::{EdgeMode, Pixel};

/// Iterator over pixels of a `SharedImageSurface`.
pub struct Pixels<'a> {
    surface: &'a SharedImageSurface,
    bounds: IRect,
    x: u32,
    y: u32,
    offset: isize,
}

/// Iterator over a (potentially out of bounds) rectangle of pixels of a `SharedImageSurface`.
///
/// The rectangle may be sampled sparsely: with a step of `(dx, dy)` only every `dx`-th
/// column and `dy`-th row starting at the top-left corner is visited.
pub struct PixelRectangle<'a> {
    surface: &'a SharedImageSurface,
    bounds: IRect,
    rectangle: IRect,
    edge_mode: EdgeMode,
    step: (i32, i32),
    x: i32,
    y: i32,
}

fn check_bounds(surface: &SharedImageSurface, bounds: IRect) {
    // Sanity checks.
    assert!(bounds.x0 >= 0);
    assert!(bounds.x0 <= surface.width());
    assert!(bounds.x1 >= bounds.x0);
    assert!(bounds.x1 <= surface.width());
    assert!(bounds.y0 >= 0);
    assert!(bounds.y0 <= surface.height());
    assert!(bounds.y1 >= bounds.y0);
    assert!(bounds.y1 <= surface.height());
}

impl<'a> Pixels<'a> {
    /// Creates an iterator over the image surface pixels
    #[inline]
    pub fn new(surface: &'a SharedImageSurface) -> Self {
        let bounds = IRect::from_size(surface.width(), surface.height());

        Self::within(surface, bounds)
    }

    /// Creates an iterator over the image surface pixels, constrained within the given bounds.
    #[inline]
    pub fn within(surface: &'a SharedImageSurface, bounds: IRect) -> Self {
        check_bounds(surface, bounds);

        Self {
            surface,
            bounds,
            x: bounds.x0 as u32,
            y: bounds.y0 as u32,
            offset: bounds.y0 as isize * surface.stride() + bounds.x0 as isize * 4,
        }
    }
}

impl<'a> PixelRectangle<'a> {
    /// Creates an iterator over the image surface pixels
    #[inline]
    pub fn new(surface: &'a SharedImageSurface, rectangle: IRect, edge_mode: EdgeMode) -> Self {
        let bounds = IRect::from_size(surface.width(), surface.height());

        Self::within(surface, bounds, rectangle, edge_mode)
    }

    /// Creates an iterator over the image surface pixels, constrained within the given bounds.
    #[inline]
    pub fn within(
        surface: &'a SharedImageSurface,
        bounds: IRect,
        rectangle: IRect,
        edge_mode: EdgeMode,
    ) -> Self {
        check_bounds(surface, bounds);

        // Non-None EdgeMode values need at least one pixel available.
        if edge_mode != EdgeMode::None {
            assert!(bounds.x1 > bounds.x0);
            assert!(bounds.y1 > bounds.y0);
        }

        assert!(rectangle.x1 >= rectangle.x0);
        assert!(rectangle.y1 >= rectangle.y0);

        Self {
            surface,
            bounds,
            rectangle,
            edge_mode,
            step: (1, 1),
            x: rectangle.x0,
            y: rectangle.y0,
        }
    }

    /// Visits only every `dx`-th column and `dy`-th row of the rectangle.
    #[inline]
    pub fn with_step(mut self, dx: i32, dy: i32) -> Self {
        assert!(dx > 0 && dy > 0);

        self.step = (dx, dy);
        self
    }

    #[inline(always)]
    fn get_pixel(&self, x: i32, y: i32) -> Pixel {
        if self.bounds.contains(x, y) {
            return self.surface.get_pixel(x as u32, y as u32);
        }

        match self.edge_mode {
            EdgeMode::None => Pixel {
                r: 0,
                g: 0,
                b: 0,
                a: 0,
            },
            EdgeMode::Duplicate => {
                let x = clamp(x, self.bounds.x0, self.bounds.x1 - 1);
                let y = clamp(y, self.bounds.y0, self.bounds.y1 - 1);
                self.surface.get_pixel(x as u32, y as u32)
            }
            EdgeMode::Wrap => {
                let x = self.bounds.x0 + (x - self.bounds.x0).rem_euclid(self.bounds.width());
                let y = self.bounds.y0 + (y - self.bounds.y0).rem_euclid(self.bounds.height());
                self.surface.get_pixel(x as u32, y as u32)
            }
        }
    }
}

impl<'a> Iterator for Pixels<'a> {
    type Item = (u32, u32, Pixel);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        // This means we hit the end on the last iteration.
        if self.x == self.bounds.x1 as u32 || self.y == self.bounds.y1 as u32 {
            return None;
        }

        let rv = Some((
            self.x,
            self.y,
            self.surface.get_pixel_by_offset(self.offset),
        ));

        if self.x + 1 == self.bounds.x1 as u32 {
            self.x = self.bounds.x0 as u32;
            self.y += 1;
            self.offset += self.surface.stride() - (self.bounds.width() - 1) as isize * 4;
        } else {
            self.x += 1;
            self.offset += 4;
        }

        rv
    }
}

impl<'a> Iterator for PixelRectangle<'a> {
    type Item = (i32, i32, Pixel);

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        // This means we hit the end on the last iteration.
        if self.x >= self.rectangle.x1 || self.y >= self.rectangle.y1 {
            return None;
        }

        let rv = Some((self.x, self.y, self.get_pixel(self.x, self.y)));

        let (dx, dy) = self.step;

        if self.x + dx >= self.rectangle.x1 {
            self.x = self.rectangle.x0;
            self.y += dy;
        } else {
            self.x += dx;
        }

        rv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface_utils::shared_surface::{ExclusiveImageSurface, SurfaceType};
    use crate::surface_utils::ChannelMap;

    #[test]
    fn pixels_count() {
        const WIDTH: i32 = 32;
        const HEIGHT: i32 = 64;

        let surface =
            SharedImageSurface::empty(WIDTH, HEIGHT, ChannelMap::cairo(), SurfaceType::SRgb)
                .unwrap();

        // Full image.
        assert_eq!(Pixels::new(&surface).count(), (WIDTH * HEIGHT) as usize);

        // 1-wide column.
        let bounds = IRect::from_size(1, HEIGHT);
        assert_eq!(Pixels::within(&surface, bounds).count(), HEIGHT as usize);

        // 1-tall row.
        let bounds = IRect::from_size(WIDTH, 1);
        assert_eq!(Pixels::within(&surface, bounds).count(), WIDTH as usize);

        // 1×1.
        let bounds = IRect::from_size(1, 1);
        assert_eq!(Pixels::within(&surface, bounds).count(), 1);

        // Nothing (x0 == x1).
        let bounds = IRect::from_size(0, HEIGHT);
        assert_eq!(Pixels::within(&surface, bounds).count(), 0);

        // Nothing (y0 == y1).
        let bounds = IRect::from_size(WIDTH, 0);
        assert_eq!(Pixels::within(&surface, bounds).count(), 0);

        // Nothing (x0 == x1, y0 == y1).
        let bounds = IRect::new(0, 0, 0, 0);
        assert_eq!(Pixels::within(&surface, bounds).count(), 0);
    }

    #[test]
    fn pixel_rectangle() {
        const WIDTH: i32 = 32;
        const HEIGHT: i32 = 64;

        let surface =
            SharedImageSurface::empty(WIDTH, HEIGHT, ChannelMap::cairo(), SurfaceType::SRgb)
                .unwrap();

        let rect_bounds = IRect::new(-8, -8, 8, 8);
        assert_eq!(
            PixelRectangle::new(&surface, rect_bounds, EdgeMode::None).count(),
            (16 * 16) as usize
        );

        assert_eq!(
            PixelRectangle::new(&surface, rect_bounds, EdgeMode::None)
                .with_step(2, 4)
                .count(),
            (8 * 4) as usize
        );
    }

    #[test]
    fn pixel_rectangle_edge_modes() {
        let mut surface = ExclusiveImageSurface::new(3, 1, SurfaceType::SRgb).unwrap();
        for x in 0..3 {
            surface.set_pixel(Pixel::new(0, 0, 0, 10 * (x as u8 + 1)), x, 0);
        }
        let surface = surface.share();

        let alphas = |edge_mode| {
            PixelRectangle::new(&surface, IRect::new(-2, 0, 5, 1), edge_mode)
                .map(|(_, _, p)| p.a)
                .collect::<Vec<_>>()
        };

        assert_eq!(alphas(EdgeMode::None), vec![0, 0, 10, 20, 30, 0, 0]);
        assert_eq!(alphas(EdgeMode::Duplicate), vec![10, 10, 10, 20, 30, 30, 30]);
        assert_eq!(alphas(EdgeMode::Wrap), vec![20, 30, 10, 20, 30, 10, 20]);
    }
}
