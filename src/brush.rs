use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::color::{graya_geta, rgba_geta, ColorValue, PixelFormat};
use crate::geometry::{algo, Point, Rect};
use crate::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BrushType {
    #[default]
    Circle,
    Square,
    Line,
    /// Custom brush made from an image
    Image,
}

/// Horizontal runs of set stencil pixels, one list per stencil row.
/// Columns are relative to the stencil's left edge.
pub type BrushScanlines = Arc<Vec<Vec<(i32, i32)>>>;

/// A brush stencil plus, for image brushes, the pixels it paints with.
#[derive(Debug, Clone)]
pub struct Brush {
    kind: BrushType,
    size: i32,
    angle: i32,
    width: i32,
    height: i32,
    stencil: Vec<bool>,
    image: Option<Image>,
    bounds: Rect,
    scanlines: BrushScanlines,
}

impl Default for Brush {
    fn default() -> Self {
        Brush::new(BrushType::Circle, 1, 0)
    }
}

impl Brush {
    pub const MIN_SIZE: i32 = 1;
    pub const MAX_SIZE: i32 = 64;

    /// Geometric brush. `angle` is in degrees and only used by square and
    /// line brushes.
    pub fn new(kind: BrushType, size: i32, angle: i32) -> Self {
        let size = size.clamp(Self::MIN_SIZE, Self::MAX_SIZE);
        let angle = angle.clamp(-180, 180);
        let mut stencil = vec![false; (size * size) as usize];
        {
            let mut set = |x: i32, y: i32| {
                if x >= 0 && y >= 0 && x < size && y < size {
                    stencil[(y * size + x) as usize] = true;
                }
            };
            match kind {
                BrushType::Circle | BrushType::Image => {
                    if size == 1 {
                        set(0, 0);
                    } else {
                        algo::ellipse_fill(0, 0, size - 1, size - 1, 0, 0, |x1, y, x2| {
                            for x in x1..=x2 {
                                set(x, y);
                            }
                        });
                    }
                }
                BrushType::Square => {
                    if angle == 0 || angle.abs() == 90 || angle.abs() == 180 {
                        for y in 0..size {
                            for x in 0..size {
                                set(x, y);
                            }
                        }
                    } else {
                        let corners = rotated_square(size, angle);
                        algo::polygon(&corners, |x1, y, x2| {
                            for x in x1..=x2 {
                                set(x, y);
                            }
                        });
                    }
                }
                BrushType::Line => {
                    let r = (size - 1) as f64 / 2.0;
                    let a = (angle as f64).to_radians();
                    let c = r;
                    let dx = r * a.cos();
                    let dy = r * a.sin();
                    algo::line_perfect(
                        (c - dx).round() as i32,
                        (c + dy).round() as i32,
                        (c + dx).round() as i32,
                        (c - dy).round() as i32,
                        &mut set,
                    );
                }
            }
        }
        Self::from_stencil(kind, size, angle, size, size, stencil, None)
    }

    /// Custom brush; pixels that are transparent in `image` are not part of
    /// the stencil.
    pub fn from_image(image: Image, mask_index: Option<ColorValue>) -> Self {
        let w = image.width();
        let h = image.height();
        let stencil = image
            .pixels()
            .iter()
            .map(|&c| match image.format() {
                PixelFormat::Rgb => rgba_geta(c) != 0,
                PixelFormat::Grayscale => graya_geta(c) != 0,
                PixelFormat::Indexed => Some(c) != mask_index,
            })
            .collect();
        let size = w.max(h);
        Self::from_stencil(BrushType::Image, size, 0, w, h, stencil, Some(image))
    }

    fn from_stencil(
        kind: BrushType,
        size: i32,
        angle: i32,
        width: i32,
        height: i32,
        stencil: Vec<bool>,
        image: Option<Image>,
    ) -> Self {
        let mut rows = Vec::with_capacity(height.max(0) as usize);
        for y in 0..height {
            let mut runs = Vec::new();
            let mut start: Option<i32> = None;
            for x in 0..width {
                let on = stencil[(y * width + x) as usize];
                match (on, start) {
                    (true, None) => start = Some(x),
                    (false, Some(s)) => {
                        runs.push((s, x - 1));
                        start = None;
                    }
                    _ => {}
                }
            }
            if let Some(s) = start {
                runs.push((s, width - 1));
            }
            rows.push(runs);
        }

        Self {
            kind,
            size,
            angle,
            width,
            height,
            stencil,
            image,
            bounds: Rect::new(-width / 2, -height / 2, width, height),
            scanlines: Arc::new(rows),
        }
    }

    /// Same brush with another size and angle. Image brushes don't scale.
    pub fn resized(&self, size: i32, angle: i32) -> Brush {
        if self.kind == BrushType::Image || (size == self.size && angle == self.angle) {
            return self.clone();
        }
        Brush::new(self.kind, size, angle)
    }

    pub fn kind(&self) -> BrushType {
        self.kind
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn angle(&self) -> i32 {
        self.angle
    }

    /// Stencil bounds relative to the stamped point
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Offset from the stencil's top-left corner to the stamped point
    pub fn center(&self) -> Point {
        Point::new(self.width / 2, self.height / 2)
    }

    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    pub fn scanlines(&self) -> BrushScanlines {
        Arc::clone(&self.scanlines)
    }

    /// Stencil test, (x, y) relative to the stencil's top-left corner
    pub fn is_set(&self, x: i32, y: i32) -> bool {
        x >= 0
            && y >= 0
            && x < self.width
            && y < self.height
            && self.stencil[(y * self.width + x) as usize]
    }

    /// Line brushes at 0/90/180 degrees keep straight strokes solid
    pub fn is_axis_aligned_line(&self) -> bool {
        self.kind == BrushType::Line && matches!(self.angle.abs(), 0 | 90 | 180)
    }
}

fn rotated_square(size: i32, angle: i32) -> Vec<Point> {
    let c = (size - 1) as f64 / 2.0;
    let (s, co) = (angle as f64).to_radians().sin_cos();
    // Half side that keeps the rotated square inside the stencil box
    let h = c / (s.abs() + co.abs());
    [(-1.0f64, -1.0f64), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
        .iter()
        .map(|&(dx, dy)| {
            let x = dx * h;
            let y = dy * h;
            Point::new(
                (c + x * co + y * s).round() as i32,
                (c - x * s + y * co).round() as i32,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_pixel_brush() {
        let brush = Brush::new(BrushType::Circle, 1, 0);
        assert_eq!(brush.bounds(), Rect::new(0, 0, 1, 1));
        assert_eq!(brush.scanlines().as_slice(), &[vec![(0, 0)]]);
    }

    #[test]
    fn test_bounds_are_centered() {
        let brush = Brush::new(BrushType::Square, 4, 0);
        assert_eq!(brush.bounds(), Rect::new(-2, -2, 4, 4));
        assert!(brush.scanlines().iter().all(|row| row == &vec![(0, 3)]));
    }

    #[test]
    fn test_size_is_clamped() {
        assert_eq!(Brush::new(BrushType::Circle, 0, 0).size(), 1);
        assert_eq!(Brush::new(BrushType::Circle, 500, 0).size(), 64);
    }

    #[test]
    fn test_horizontal_line_brush() {
        let brush = Brush::new(BrushType::Line, 5, 0);
        let rows = brush.scanlines();
        assert_eq!(rows[2], vec![(0, 4)]);
        assert!(rows[0].is_empty());
        assert!(brush.is_axis_aligned_line());
    }

    #[test]
    fn test_image_brush_stencil_skips_mask_index() {
        let img = Image::from_pixels(PixelFormat::Indexed, 2, 1, vec![0, 3]);
        let brush = Brush::from_image(img, Some(0));
        assert!(!brush.is_set(0, 0));
        assert!(brush.is_set(1, 0));
    }
}
