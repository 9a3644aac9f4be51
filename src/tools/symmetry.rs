use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetryMode {
    #[default]
    None,
    /// Mirrors left/right around the vertical axis at `x_axis`
    Horizontal,
    /// Mirrors top/bottom around the horizontal axis at `y_axis`
    Vertical,
    Both,
}

/// Mirror axes; an axis at 4.0 maps pixel 3 to pixel 4.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Symmetry {
    pub mode: SymmetryMode,
    pub x_axis: f64,
    pub y_axis: f64,
}

impl Symmetry {
    pub fn new(mode: SymmetryMode, x_axis: f64, y_axis: f64) -> Self {
        Self { mode, x_axis, y_axis }
    }

    pub fn is_active(&self) -> bool {
        self.mode != SymmetryMode::None
    }

    fn mirrors_x(&self) -> bool {
        matches!(self.mode, SymmetryMode::Horizontal | SymmetryMode::Both)
    }

    fn mirrors_y(&self) -> bool {
        matches!(self.mode, SymmetryMode::Vertical | SymmetryMode::Both)
    }

    fn axis2_x(&self) -> i32 {
        (2.0 * self.x_axis).round() as i32
    }

    fn axis2_y(&self) -> i32 {
        (2.0 * self.y_axis).round() as i32
    }

    /// The scanline and its mirrors. Spans that overlap on the same row
    /// are merged so no pixel is inked twice.
    pub fn hline_spans(&self, x1: i32, y: i32, x2: i32) -> Vec<(i32, i32, i32)> {
        let mut out = Vec::with_capacity(4);
        self.hline_spans_into(x1, y, x2, &mut out);
        out
    }

    /// Same as `hline_spans`, reusing `out`
    pub fn hline_spans_into(&self, x1: i32, y: i32, x2: i32, out: &mut Vec<(i32, i32, i32)>) {
        let mut spans = [(x1, y, x2); 4];
        let mut len = 1;
        if self.mirrors_x() {
            let a = self.axis2_x();
            spans[1] = (a - x2 - 1, y, a - x1 - 1);
            len = 2;
        }
        if self.mirrors_y() {
            let a = self.axis2_y();
            for i in 0..len {
                let (sx1, _, sx2) = spans[i];
                spans[len + i] = (sx1, a - y - 1, sx2);
            }
            len *= 2;
        }

        out.clear();
        for &(sx1, sy, sx2) in &spans[..len] {
            match out
                .iter_mut()
                .find(|(mx1, my, mx2)| *my == sy && sx1 <= *mx2 + 1 && *mx1 <= sx2 + 1)
            {
                Some(m) => {
                    m.0 = m.0.min(sx1);
                    m.2 = m.2.max(sx2);
                }
                None => out.push((sx1, sy, sx2)),
            }
        }
    }

    /// `rect` and its mirrored copies
    pub fn mirror_rect(&self, rect: Rect) -> Vec<Rect> {
        let mut rects = vec![rect];
        if self.mirrors_x() {
            let a = self.axis2_x();
            rects.push(Rect::new(a - rect.x2(), rect.y, rect.w, rect.h));
        }
        if self.mirrors_y() {
            let a = self.axis2_y();
            let mirrored: Vec<_> = rects
                .iter()
                .map(|r| Rect::new(r.x, a - r.y2(), r.w, r.h))
                .collect();
            rects.extend(mirrored);
        }
        rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_mirror_span() {
        let s = Symmetry::new(SymmetryMode::Horizontal, 4.0, 0.0);
        assert_eq!(s.hline_spans(0, 2, 1), vec![(0, 2, 1), (6, 2, 7)]);
    }

    #[test]
    fn test_span_crossing_axis_is_merged() {
        let s = Symmetry::new(SymmetryMode::Horizontal, 4.0, 0.0);
        assert_eq!(s.hline_spans(2, 0, 4), vec![(2, 0, 5)]);
    }

    #[test]
    fn test_both_gives_four_rects() {
        let s = Symmetry::new(SymmetryMode::Both, 5.0, 5.0);
        let rects = s.mirror_rect(Rect::new(0, 0, 2, 2));
        assert_eq!(rects.len(), 4);
        assert!(rects.contains(&Rect::new(8, 8, 2, 2)));
    }

    #[test]
    fn test_spans_into_reuses_buffer() {
        let s = Symmetry::new(SymmetryMode::Both, 5.0, 5.0);
        let mut out = vec![(99, 99, 99); 8];
        let capacity = out.capacity();
        s.hline_spans_into(0, 1, 1, &mut out);
        assert_eq!(out, vec![(0, 1, 1), (8, 1, 9), (0, 8, 1), (8, 8, 9)]);
        assert_eq!(out.capacity(), capacity);
    }
}
