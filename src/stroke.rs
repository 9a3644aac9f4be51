use crate::geometry::{Point, Rect};

/// One sampled stroke point. `size`, `angle` and `gradient` carry the
/// brush dynamics resolved for this sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pt {
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub angle: i32,
    /// Interpolation between the primary (0.0) and secondary (1.0) color
    pub gradient: f32,
}

impl Pt {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            size: 1,
            angle: 0,
            gradient: 0.0,
        }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same pixel position, dynamics ignored
    pub fn same_position(&self, other: &Pt) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Default for Pt {
    fn default() -> Self {
        Pt::new(0, 0)
    }
}

impl From<Point> for Pt {
    fn from(p: Point) -> Self {
        Pt::new(p.x, p.y)
    }
}

/// Points sampled during one gesture, in temporal order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stroke {
    pts: Vec<Pt>,
}

impl Stroke {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(pts: Vec<Pt>) -> Self {
        Self { pts }
    }

    pub fn len(&self) -> usize {
        self.pts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }

    pub fn points(&self) -> &[Pt] {
        &self.pts
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pt> {
        self.pts.iter()
    }

    pub fn first_point(&self) -> Option<Pt> {
        self.pts.first().copied()
    }

    pub fn last_point(&self) -> Option<Pt> {
        self.pts.last().copied()
    }

    pub fn add_point(&mut self, pt: Pt) {
        self.pts.push(pt);
    }

    /// Replaces the content with `n` copies of `pt`
    pub fn reset_to(&mut self, n: usize, pt: Pt) {
        self.pts.clear();
        self.pts.resize(n, pt);
    }

    pub fn clear(&mut self) {
        self.pts.clear();
    }

    pub fn erase(&mut self, index: usize) {
        if index < self.pts.len() {
            self.pts.remove(index);
        }
    }

    /// Moves every point by (dx, dy)
    pub fn offset(&mut self, dx: i32, dy: i32) {
        for pt in &mut self.pts {
            pt.x += dx;
            pt.y += dy;
        }
    }

    /// Bounding box of the points
    pub fn bounds(&self) -> Rect {
        self.pts
            .iter()
            .fold(Rect::default(), |acc, p| acc.union(&Rect::new(p.x, p.y, 1, 1)))
    }

    /// Center of the points' bounding box
    pub fn center(&self) -> Option<Pt> {
        let first = self.first_point()?;
        let b = self.bounds();
        Some(Pt {
            x: b.x + b.w / 2,
            y: b.y + b.h / 2,
            ..first
        })
    }

    pub fn to_points(&self) -> Vec<Point> {
        self.pts.iter().map(Pt::point).collect()
    }
}

impl std::ops::Index<usize> for Stroke {
    type Output = Pt;

    fn index(&self, i: usize) -> &Pt {
        &self.pts[i]
    }
}

impl std::ops::IndexMut<usize> for Stroke {
    fn index_mut(&mut self, i: usize) -> &mut Pt {
        &mut self.pts[i]
    }
}

impl<'a> IntoIterator for &'a Stroke {
    type Item = &'a Pt;
    type IntoIter = std::slice::Iter<'a, Pt>;

    fn into_iter(self) -> Self::IntoIter {
        self.pts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_and_center() {
        let stroke = Stroke::from_points(vec![Pt::new(2, 3), Pt::new(6, 3), Pt::new(4, 7)]);
        assert_eq!(stroke.bounds(), Rect::new(2, 3, 5, 5));
        let c = stroke.center().unwrap();
        assert_eq!((c.x, c.y), (4, 5));
    }

    #[test]
    fn test_offset_and_erase() {
        let mut stroke = Stroke::from_points(vec![Pt::new(0, 0), Pt::new(1, 1)]);
        stroke.offset(2, -1);
        assert_eq!(stroke[1].point(), Point::new(3, 0));
        stroke.erase(0);
        assert_eq!(stroke.len(), 1);
        stroke.erase(5);
        assert_eq!(stroke.len(), 1);
    }
}
