//! Integer canvas geometry: points, rectangles, regions and the
//! rasterization primitives the tool pipeline builds on.

pub mod algo;
pub mod floodfill;
pub mod grid;
pub mod tiled;

use serde::{Deserialize, Serialize};

pub use grid::Grid;
pub use tiled::TiledMode;

/// A pixel position in canvas space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An axis-aligned rectangle, `w`×`h` pixels starting at (`x`, `y`).
///
/// Rectangles with a non-positive width or height are empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Smallest rectangle containing both points (inclusive)
    pub fn from_corners(a: Point, b: Point) -> Self {
        let x1 = a.x.min(b.x);
        let y1 = a.y.min(b.y);
        let x2 = a.x.max(b.x);
        let y2 = a.y.max(b.y);
        Self::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// One past the right-most column
    pub fn x2(&self) -> i32 {
        self.x + self.w
    }

    /// One past the bottom row
    pub fn y2(&self) -> i32 {
        self.y + self.h
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.w as i64 * self.h as i64
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.x2() && y < self.y2()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (other.x >= self.x
                && other.y >= self.y
                && other.x2() <= self.x2()
                && other.y2() <= self.y2())
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Overlapping part of both rectangles, empty when they don't touch
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        if x2 <= x1 || y2 <= y1 {
            Rect::default()
        } else {
            Rect::new(x1, y1, x2 - x1, y2 - y1)
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.intersect(other).is_empty()
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    pub fn enlarge(&self, n: i32) -> Rect {
        Rect::new(self.x - n, self.y - n, self.w + 2 * n, self.h + 2 * n)
    }
}

/// A set of rectangles, kept as the list it was built from.
///
/// Rectangles may overlap; consumers that write pixels through a region
/// must be idempotent per pixel. Past `Region::MAX_RECTS` rectangles the
/// region collapses to its bounds, so adding stays constant time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub const MAX_RECTS: usize = 32;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add_rect(rect);
        region
    }

    pub fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() || self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|r| !rect.contains_rect(r));
        self.rects.push(rect);
        if self.rects.len() > Self::MAX_RECTS {
            let bounds = self.bounds();
            self.rects.clear();
            self.rects.push(bounds);
        }
    }

    pub fn add_region(&mut self, other: &Region) {
        for rect in &other.rects {
            self.add_rect(*rect);
        }
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn bounds(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, r| acc.union(r))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    /// Clip every rectangle to `bounds`, dropping the ones left empty
    pub fn clip(&mut self, bounds: &Rect) {
        let rects = std::mem::take(&mut self.rects);
        for rect in rects {
            self.add_rect(rect.intersect(bounds));
        }
    }

    pub fn offset(&mut self, dx: i32, dy: i32) {
        for rect in &mut self.rects {
            *rect = rect.offset(dx, dy);
        }
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Region::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_union_ignores_empty() {
        let a = Rect::new(2, 3, 4, 1);
        assert_eq!(a.union(&Rect::default()), a);
        assert_eq!(Rect::default().union(&a), a);
        assert_eq!(a.union(&Rect::new(0, 0, 1, 1)), Rect::new(0, 0, 6, 4));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersect(&Rect::new(5, 5, 10, 10)), Rect::new(5, 5, 5, 5));
        assert!(a.intersect(&Rect::new(10, 0, 3, 3)).is_empty());
    }

    #[test]
    fn test_from_corners_is_inclusive() {
        let r = Rect::from_corners(Point::new(6, 3), Point::new(2, 3));
        assert_eq!(r, Rect::new(2, 3, 5, 1));
    }

    #[test]
    fn test_region_drops_contained_rects() {
        let mut region = Region::new();
        region.add_rect(Rect::new(1, 1, 2, 2));
        region.add_rect(Rect::new(0, 0, 5, 5));
        region.add_rect(Rect::new(2, 2, 1, 1));
        assert_eq!(region.rects(), &[Rect::new(0, 0, 5, 5)]);
        assert_eq!(region.bounds(), Rect::new(0, 0, 5, 5));
    }

    #[test]
    fn test_region_collapses_when_too_fragmented() {
        let mut region = Region::new();
        for i in 0..1000 {
            region.add_rect(Rect::new(i * 2, 0, 1, 1));
            assert!(region.rects().len() <= Region::MAX_RECTS);
        }
        assert_eq!(region.bounds(), Rect::new(0, 0, 1999, 1));
        assert!(region.contains(1998, 0));
    }
}
