//! Rectangles in user space (`Rect`) and in whole pixels (`IRect`).

use std::ops::{Add, Range, Sub};

/// A rectangle given by its two corners; `x1` and `y1` are exclusive.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericRect<T> {
    pub x0: T,
    pub y0: T,
    pub x1: T,
    pub y1: T,
}

pub type Rect = GenericRect<f64>;

pub type IRect = GenericRect<i32>;

// f64 is only PartialOrd, so std's min/max don't apply.
fn smaller<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

fn larger<T: PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

impl<T> GenericRect<T> {
    #[inline]
    pub const fn new(x0: T, y0: T, x1: T, y1: T) -> Self {
        GenericRect { x0, y0, x1, y1 }
    }
}

impl<T> GenericRect<T>
where
    T: Copy + Default + PartialOrd + Add<Output = T> + Sub<Output = T>,
{
    /// A rectangle of the given size at the origin.
    #[inline]
    pub fn from_size(width: T, height: T) -> Self {
        GenericRect::new(T::default(), T::default(), width, height)
    }

    #[inline]
    pub fn width(&self) -> T {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> T {
        self.y1 - self.y0
    }

    #[inline]
    pub fn size(&self) -> (T, T) {
        (self.width(), self.height())
    }

    #[inline]
    pub fn x_range(&self) -> Range<T> {
        self.x0..self.x1
    }

    #[inline]
    pub fn y_range(&self) -> Range<T> {
        self.y0..self.y1
    }

    #[inline]
    pub fn contains(self, x: T, y: T) -> bool {
        self.x0 <= x && x < self.x1 && self.y0 <= y && y < self.y1
    }

    #[inline]
    pub fn translate(&self, (dx, dy): (T, T)) -> Self {
        GenericRect::new(self.x0 + dx, self.y0 + dy, self.x1 + dx, self.y1 + dy)
    }

    /// Returns `None` unless the overlap has a positive area.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let r = GenericRect::new(
            larger(self.x0, other.x0),
            larger(self.y0, other.y0),
            smaller(self.x1, other.x1),
            smaller(self.y1, other.y1),
        );

        if r.x0 < r.x1 && r.y0 < r.y1 {
            Some(r)
        } else {
            None
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        GenericRect::new(
            smaller(self.x0, other.x0),
            smaller(self.y0, other.y0),
            larger(self.x1, other.x1),
            larger(self.y1, other.y1),
        )
    }
}

impl IRect {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }

    /// Scales the corners, rounding outwards.
    pub fn scale(self, sx: f64, sy: f64) -> IRect {
        Rect::from(self).scale(sx, sy).into()
    }
}

impl Rect {
    fn scale(self, sx: f64, sy: f64) -> Rect {
        Rect::new(self.x0 * sx, self.y0 * sy, self.x1 * sx, self.y1 * sy)
    }

    /// Compares the corners with a small absolute tolerance.
    pub fn approx_eq(&self, other: &Rect) -> bool {
        use float_cmp::approx_eq;

        [
            (self.x0, other.x0),
            (self.y0, other.y0),
            (self.x1, other.x1),
            (self.y1, other.y1),
        ]
        .iter()
        .all(|&(a, b)| approx_eq!(f64, a, b, epsilon = 0.0001))
    }
}

/// Pixel rectangles round outwards, so that a partially covered pixel is included.
impl From<Rect> for IRect {
    #[inline]
    fn from(r: Rect) -> IRect {
        IRect::new(
            r.x0.floor() as i32,
            r.y0.floor() as i32,
            r.x1.ceil() as i32,
            r.y1.ceil() as i32,
        )
    }
}

impl From<IRect> for Rect {
    #[inline]
    fn from(r: IRect) -> Rect {
        Rect::new(
            f64::from(r.x0),
            f64::from(r.y0),
            f64::from(r.x1),
            f64::from(r.y1),
        )
    }
}
