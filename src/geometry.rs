// ============================================================================
// Integer pixel geometry shared by regions, fills and the compositor
// ============================================================================

use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A pixel coordinate. Negative values are allowed in intermediate results
/// (shift deltas, pre-clamp positions).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Multiply both coordinates by `s`, truncating toward zero.
    pub fn scaled(self, s: f64) -> Self {
        Self {
            x: (self.x as f64 * s) as i32,
            y: (self.y as f64 * s) as i32,
        }
    }

    /// Divide both coordinates by `s` (screen → canonical mapping).
    pub fn unscaled(self, s: f64) -> Self {
        if s <= 0.0 {
            return self;
        }
        Self {
            x: (self.x as f64 / s) as i32,
            y: (self.y as f64 / s) as i32,
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point {
    fn sub_assign(&mut self, rhs: Point) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)` in raster coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBox {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Build from two corner points, clamped into a `width × height` raster.
    pub fn from_points(a: Point, b: Point, width: u32, height: u32) -> Self {
        let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
        Self {
            x0: clamp(a.x.min(b.x), width),
            y0: clamp(a.y.min(b.y), height),
            x1: clamp(a.x.max(b.x), width),
            y1: clamp(a.y.max(b.y), height),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// An on-screen rectangle at the current zoom, as handed to the host shell
/// for clickable overlays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScreenRect {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl ScreenRect {
    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        Self { top_left, bottom_right }
    }

    pub fn width(&self) -> i32 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> i32 {
        self.bottom_right.y - self.top_left.y
    }

    /// Inclusive overlap test used by rubber-band selection.
    pub fn overlaps(&self, a: Point, b: Point) -> bool {
        let x_overlap = !(self.bottom_right.x < a.x || self.top_left.x > b.x);
        let y_overlap = !(self.bottom_right.y < a.y || self.top_left.y > b.y);
        x_overlap && y_overlap
    }
}

/// Normalize two drag corners into (top-left, bottom-right).
pub fn normalized(a: Point, b: Point) -> (Point, Point) {
    (
        Point::new(a.x.min(b.x), a.y.min(b.y)),
        Point::new(a.x.max(b.x), a.y.max(b.y)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_round_trip_is_exact_for_integer_factors() {
        let p = Point::new(37, 81);
        assert_eq!(p.scaled(2.0).scaled(0.5), p);
    }

    #[test]
    fn pixel_box_from_points_clamps() {
        let b = PixelBox::from_points(Point::new(-5, 3), Point::new(120, 40), 100, 50);
        assert_eq!(b, PixelBox::new(0, 3, 100, 40));
        assert_eq!(b.width(), 100);
    }

    #[test]
    fn overlap_is_inclusive_on_edges() {
        let r = ScreenRect::new(Point::new(10, 10), Point::new(20, 20));
        assert!(r.overlaps(Point::new(20, 20), Point::new(30, 30)));
        assert!(!r.overlaps(Point::new(21, 0), Point::new(30, 30)));
    }

    #[test]
    fn normalized_orders_corners() {
        let (tl, br) = normalized(Point::new(30, 5), Point::new(10, 25));
        assert_eq!(tl, Point::new(10, 5));
        assert_eq!(br, Point::new(30, 25));
    }
}
