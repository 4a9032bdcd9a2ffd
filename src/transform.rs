//! Affine transforms between user space, primitive space and device pixels.

use crate::rect::Rect;

/// A 2D affine transform, laid out like a Cairo matrix.
///
/// A point `(x, y)` is mapped to `(xx * x + xy * y + x0, yx * x + yy * y + y0)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Transform {
    /// Builds a transform from its six coefficients, without checking invertibility.
    #[inline]
    pub fn new_unchecked(xx: f64, yx: f64, xy: f64, yy: f64, x0: f64, y0: f64) -> Self {
        Transform {
            xx,
            yx,
            xy,
            yy,
            x0,
            y0,
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::new_scale(1.0, 1.0)
    }

    #[inline]
    pub fn new_scale(sx: f64, sy: f64) -> Self {
        Self::new_unchecked(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Maps the unit square onto `rect`.
    ///
    /// This is the coordinate system used for `objectBoundingBox` units.
    #[inline]
    pub fn from_unit_square_to(rect: &Rect) -> Self {
        Self::new_unchecked(rect.width(), 0.0, 0.0, rect.height(), rect.x0, rect.y0)
    }

    /// Returns the transform that applies `self` first, then `next`.
    #[must_use]
    pub fn then(&self, next: &Transform) -> Self {
        let (x0, y0) = next.transform_point(self.x0, self.y0);

        Transform {
            xx: self.xx * next.xx + self.yx * next.xy,
            yx: self.xx * next.yx + self.yx * next.yy,
            xy: self.xy * next.xx + self.yy * next.xy,
            yy: self.xy * next.yx + self.yy * next.yy,
            x0,
            y0,
        }
    }

    #[inline]
    pub fn is_invertible(&self) -> bool {
        self.invert().is_some()
    }

    /// Returns `None` for singular transforms, and for those with non-finite coefficients.
    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        let det = self.xx * self.yy - self.xy * self.yx;

        if det == 0.0 || !det.is_finite() {
            return None;
        }

        Some(Transform::new_unchecked(
            self.yy / det,
            -self.yx / det,
            -self.xy / det,
            self.xx / det,
            (self.xy * self.y0 - self.yy * self.x0) / det,
            (self.yx * self.x0 - self.xx * self.y0) / det,
        ))
    }

    /// Maps a vector; the translation part is not applied.
    #[inline]
    pub fn transform_distance(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx * self.xx + dy * self.xy, dx * self.yx + dy * self.yy)
    }

    #[inline]
    pub fn transform_point(&self, px: f64, py: f64) -> (f64, f64) {
        let (x, y) = self.transform_distance(px, py);
        (x + self.x0, y + self.y0)
    }

    /// Returns the axis-aligned bounding box of the transformed rectangle.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.x0, rect.y0),
            self.transform_point(rect.x1, rect.y0),
            self.transform_point(rect.x0, rect.y1),
            self.transform_point(rect.x1, rect.y1),
        ];

        let (x, y) = corners[0];

        corners[1..]
            .iter()
            .fold(Rect::new(x, y, x, y), |r, &(x, y)| Rect {
                x0: r.x0.min(x),
                y0: r.y0.min(y),
                x1: r.x1.max(x),
                y1: r.y1.max(y),
            })
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Transform {
        Transform::identity()
    }
}
