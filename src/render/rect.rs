//! Pixel rectangles and placement offsets.
//!
//! A [`PixelRect`] describes a region in surface coordinates: the dirty region of a
//! paint update, the scroll region, or a widget's on-screen rectangle as supplied by
//! the engine. `(0, 0)` is the top-left corner.
//!
//! # Examples
//!
//! ```
//! use surface_bridge::render::PixelRect;
//!
//! let rect = PixelRect::new(10, 20, 100, 50);
//! assert_eq!(rect.right(), 110);
//! assert_eq!(rect.bottom(), 70);
//! assert!(rect.fits_within(110, 70));
//! assert!(!rect.fits_within(109, 70));
//! ```

/// A rectangle in pixels.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub struct PixelRect {
    /// Horizontal offset in pixels from the origin.
    pub x: i32,
    /// Vertical offset in pixels from the origin.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for PixelRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PixelRect {{ x: {}, y: {}, width: {}, height: {} }}", self.x, self.y, self.width, self.height)
    }
}

impl PixelRect {
    /// Creates a new [`PixelRect`] with the given position and size.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle at the origin with the given size.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns true when the rectangle lies entirely inside a `width` x `height` surface.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && self.right() <= width as i64 && self.bottom() <= height as i64
    }

    /// Intersection of two rectangles, `None` when they don't overlap.
    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let left = (self.x as i64).max(other.x as i64);
        let top = (self.y as i64).max(other.y as i64);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left as i32,
            y: top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }

    /// Moves the rectangle’s origin to `(x, y)` in pixels.
    pub fn translate(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    /// The rectangle shifted by `(dx, dy)`, or `None` when the new origin does not fit in `i32`.
    pub fn offset_by(&self, dx: i32, dy: i32) -> Option<PixelRect> {
        Some(PixelRect {
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            ..*self
        })
    }

    /// Resizes the rectangle to the given width and height.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Top-left corner as a placement offset.
    pub fn origin(&self) -> Offset {
        Offset { x: self.x, y: self.y }
    }
}

/// Where the host draws a surface, relative to the primary surface's origin.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Default)]
pub struct Offset {
    pub x: i32,
    pub y: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_do_not_overflow() {
        let r = PixelRect::new(i32::MAX, 0, u32::MAX, 1);
        assert_eq!(r.right(), i32::MAX as i64 + u32::MAX as i64);
        assert!(!r.fits_within(u32::MAX, 1));
    }

    #[test]
    fn negative_origin_does_not_fit() {
        assert!(!PixelRect::new(-1, 0, 10, 10).fits_within(100, 100));
        assert!(PixelRect::new(0, 0, 100, 100).fits_within(100, 100));
    }

    #[test]
    fn intersection() {
        let a = PixelRect::new(0, 0, 10, 10);
        let b = PixelRect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Some(PixelRect::new(5, 5, 5, 5)));
        assert_eq!(a.intersect(&PixelRect::new(10, 0, 5, 5)), None);
    }

    #[test]
    fn offset_by_reports_overflow() {
        let r = PixelRect::new(1, 2, 4, 4);
        assert_eq!(r.offset_by(-1, 3), Some(PixelRect::new(0, 5, 4, 4)));
        assert_eq!(r.offset_by(i32::MAX, 0), None);
        assert_eq!(r.offset_by(0, i32::MIN).map(|m| m.y), Some(2 + i32::MIN));
    }

    #[test]
    fn translate_and_resize() {
        let mut r = PixelRect::from_size(8, 8);
        r.translate(3, 4);
        r.resize(2, 1);
        assert_eq!(r, PixelRect::new(3, 4, 2, 1));
        assert_eq!(r.origin(), Offset::new(3, 4));
        assert!(PixelRect::new(0, 0, 0, 4).is_empty());
    }
}
