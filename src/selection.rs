use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// How a new selection combines with the current one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Replace,
    Add,
    Subtract,
    Intersect,
}

/// Selection mask: a bitmap over `bounds`. An empty mask means nothing is
/// selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask {
    bounds: Rect,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        if rect.is_empty() {
            return Self::new();
        }
        Self {
            bounds: rect,
            bits: vec![true; rect.area() as usize],
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }
        let i = (y - self.bounds.y) as usize * self.bounds.w as usize + (x - self.bounds.x) as usize;
        self.bits[i]
    }

    /// Rebuilds the mask over `area` with `f`, then shrinks the bounds to
    /// the selected pixels.
    fn rebuild(area: Rect, f: impl Fn(i32, i32) -> bool) -> Self {
        if area.is_empty() {
            return Self::new();
        }
        let mut bits = Vec::with_capacity(area.area() as usize);
        let mut tight = Rect::default();
        for y in area.y..area.y2() {
            for x in area.x..area.x2() {
                let on = f(x, y);
                if on {
                    tight = tight.union(&Rect::new(x, y, 1, 1));
                }
                bits.push(on);
            }
        }
        if tight.is_empty() {
            return Self::new();
        }
        if tight == area {
            return Self { bounds: area, bits };
        }
        let full = Self { bounds: area, bits };
        Self::rebuild_exact(tight, |x, y| full.contains(x, y))
    }

    fn rebuild_exact(area: Rect, f: impl Fn(i32, i32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(area.area() as usize);
        for y in area.y..area.y2() {
            for x in area.x..area.x2() {
                bits.push(f(x, y));
            }
        }
        Self { bounds: area, bits }
    }

    pub fn add_rect(&mut self, rect: Rect) {
        let area = self.bounds.union(&rect);
        let old = std::mem::take(self);
        *self = Self::rebuild(area, |x, y| old.contains(x, y) || rect.contains(x, y));
    }

    pub fn subtract_rect(&mut self, rect: Rect) {
        let old = std::mem::take(self);
        *self = Self::rebuild(old.bounds, |x, y| old.contains(x, y) && !rect.contains(x, y));
    }

    pub fn add(&mut self, other: &Mask) {
        let area = self.bounds.union(&other.bounds);
        let old = std::mem::take(self);
        *self = Self::rebuild(area, |x, y| old.contains(x, y) || other.contains(x, y));
    }

    pub fn subtract(&mut self, other: &Mask) {
        let old = std::mem::take(self);
        *self = Self::rebuild(old.bounds, |x, y| old.contains(x, y) && !other.contains(x, y));
    }

    pub fn intersect(&mut self, other: &Mask) {
        let area = self.bounds.intersect(&other.bounds);
        let old = std::mem::take(self);
        *self = Self::rebuild(area, |x, y| old.contains(x, y) && other.contains(x, y));
    }

    /// Combines `other` into this mask with the given mode
    pub fn combine(&mut self, other: &Mask, mode: SelectionMode) {
        match mode {
            SelectionMode::Replace => *self = other.clone(),
            SelectionMode::Add => self.add(other),
            SelectionMode::Subtract => self.subtract(other),
            SelectionMode::Intersect => self.intersect(other),
        }
    }

    pub fn selected_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_subtract_rects() {
        let mut mask = Mask::from_rect(Rect::new(0, 0, 4, 4));
        mask.add_rect(Rect::new(4, 0, 2, 1));
        assert!(mask.contains(5, 0));
        assert_eq!(mask.bounds(), Rect::new(0, 0, 6, 4));

        mask.subtract_rect(Rect::new(0, 0, 6, 2));
        assert!(!mask.contains(0, 0));
        assert_eq!(mask.bounds(), Rect::new(0, 2, 4, 2));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let mut mask = Mask::from_rect(Rect::new(0, 0, 2, 2));
        mask.intersect(&Mask::from_rect(Rect::new(5, 5, 2, 2)));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_combine_modes() {
        let base = Mask::from_rect(Rect::new(0, 0, 4, 4));
        let other = Mask::from_rect(Rect::new(2, 2, 4, 4));

        let mut m = base.clone();
        m.combine(&other, SelectionMode::Intersect);
        assert_eq!(m.bounds(), Rect::new(2, 2, 2, 2));

        let mut m = base.clone();
        m.combine(&other, SelectionMode::Replace);
        assert_eq!(m, other);

        let mut m = base;
        m.combine(&other, SelectionMode::Add);
        assert_eq!(m.selected_count(), 16 + 16 - 4);
    }
}
