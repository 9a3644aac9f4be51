use serde::{Deserialize, Serialize};

use super::{Point, Rect, Region};

/// Canvas wrapping used to draw seamless patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TiledMode {
    #[default]
    None,
    X,
    Y,
    Both,
}

impl TiledMode {
    pub fn wraps_x(self) -> bool {
        matches!(self, TiledMode::X | TiledMode::Both)
    }

    pub fn wraps_y(self) -> bool {
        matches!(self, TiledMode::Y | TiledMode::Both)
    }

    /// Moves a point into the canvas along the wrapped axes
    pub fn wrap_point(self, pt: Point, canvas: Rect) -> Point {
        let mut out = pt;
        if self.wraps_x() && canvas.w > 0 {
            out.x = canvas.x + (pt.x - canvas.x).rem_euclid(canvas.w);
        }
        if self.wraps_y() && canvas.h > 0 {
            out.y = canvas.y + (pt.y - canvas.y).rem_euclid(canvas.h);
        }
        out
    }

    /// Folds every rectangle of `region` back inside the canvas, splitting
    /// the ones that cross a wrapped edge.
    pub fn collapse_region(self, region: &Region, canvas: Rect) -> Region {
        let mut out = Region::new();
        for rect in region.rects() {
            for piece in self.wrap_rect(*rect, canvas) {
                out.add_rect(piece);
            }
        }
        out
    }

    /// Splits `rect` into canvas-space pieces along the wrapped axes.
    /// Axes that don't wrap are clipped instead.
    pub fn wrap_rect(self, rect: Rect, canvas: Rect) -> Vec<Rect> {
        let mut out = Vec::with_capacity(4);
        self.wrap_rect_into(rect, canvas, &mut out);
        out
    }

    /// Same as `wrap_rect`, reusing `out`
    pub fn wrap_rect_into(self, rect: Rect, canvas: Rect, out: &mut Vec<Rect>) {
        out.clear();
        let xs = if self.wraps_x() {
            wrap_span(rect.x, rect.w, canvas.x, canvas.w)
        } else {
            clip_span(rect.x, rect.w, canvas.x, canvas.w)
        };
        let ys = if self.wraps_y() {
            wrap_span(rect.y, rect.h, canvas.y, canvas.h)
        } else {
            clip_span(rect.y, rect.h, canvas.y, canvas.h)
        };
        for &(y, h) in ys.iter().flatten() {
            for &(x, w) in xs.iter().flatten() {
                out.push(Rect::new(x, y, w, h));
            }
        }
    }
}

/// At most two `(start, len)` pieces of a span
type Spans = [Option<(i32, i32)>; 2];

fn clip_span(start: i32, len: i32, origin: i32, size: i32) -> Spans {
    let a = start.max(origin);
    let b = (start + len).min(origin + size);
    [(b > a).then_some((a, b - a)), None]
}

fn wrap_span(start: i32, len: i32, origin: i32, size: i32) -> Spans {
    if len <= 0 || size <= 0 {
        return [None, None];
    }
    if len >= size {
        return [Some((origin, size)), None];
    }
    let a = origin + (start - origin).rem_euclid(size);
    let end = origin + size;
    if a + len <= end {
        [Some((a, len)), None]
    } else {
        [Some((a, end - a)), Some((origin, a + len - end))]
    }
}
