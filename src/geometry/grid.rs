use serde::{Deserialize, Serialize};

use super::{Point, Rect};

/// Rectangular grid used by tilemap layers, snap-to-grid and flood fill
/// stop-at-grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub origin: Point,
    pub tile_w: i32,
    pub tile_h: i32,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            origin: Point::new(0, 0),
            tile_w: 16,
            tile_h: 16,
        }
    }
}

impl Grid {
    pub fn new(origin: Point, tile_w: i32, tile_h: i32) -> Self {
        Self {
            origin,
            tile_w: tile_w.max(1),
            tile_h: tile_h.max(1),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.origin.x, self.origin.y, self.tile_w, self.tile_h)
    }

    /// Tile cell containing the canvas pixel
    pub fn canvas_to_tile(&self, pt: Point) -> Point {
        Point::new(
            (pt.x - self.origin.x).div_euclid(self.tile_w),
            (pt.y - self.origin.y).div_euclid(self.tile_h),
        )
    }

    /// Canvas rectangle covered by a tile cell
    pub fn tile_to_canvas(&self, tile: Point) -> Rect {
        Rect::new(
            self.origin.x + tile.x * self.tile_w,
            self.origin.y + tile.y * self.tile_h,
            self.tile_w,
            self.tile_h,
        )
    }

    /// Grid cell bounds around a canvas pixel
    pub fn cell_bounds(&self, pt: Point) -> Rect {
        self.tile_to_canvas(self.canvas_to_tile(pt))
    }

    /// Range of tile cells `(first, last)` touched by a canvas rectangle
    pub fn tiles_in(&self, rect: Rect) -> Option<(Point, Point)> {
        if rect.is_empty() {
            return None;
        }
        let a = self.canvas_to_tile(rect.origin());
        let b = self.canvas_to_tile(Point::new(rect.x2() - 1, rect.y2() - 1));
        Some((a, b))
    }

    /// Nearest grid vertex to `pt`
    pub fn snap(&self, pt: Point) -> Point {
        let snap_axis = |v: i32, o: i32, size: i32| {
            let rel = v - o;
            let cell = rel.div_euclid(size);
            let rem = rel.rem_euclid(size);
            let cell = if rem * 2 >= size { cell + 1 } else { cell };
            o + cell * size
        };
        Point::new(
            snap_axis(pt.x, self.origin.x, self.tile_w),
            snap_axis(pt.y, self.origin.y, self.tile_h),
        )
    }
}
