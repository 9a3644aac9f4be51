//! Gradient rendering for the gradient ink and dithered dynamics

use serde::{Deserialize, Serialize};

use crate::color::{rgba_lerp, ColorValue};
use crate::geometry::Point;
use crate::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientType {
    #[default]
    Linear,
    Radial,
}

/// Ordered dithering matrix. `None` interpolates colors smoothly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitheringMatrix {
    #[default]
    None,
    Bayer2,
    Bayer4,
    Bayer8,
}

impl DitheringMatrix {
    pub fn size(self) -> i32 {
        match self {
            DitheringMatrix::None => 1,
            DitheringMatrix::Bayer2 => 2,
            DitheringMatrix::Bayer4 => 4,
            DitheringMatrix::Bayer8 => 8,
        }
    }

    pub fn is_dithered(self) -> bool {
        self != DitheringMatrix::None
    }

    /// Largest threshold value in the matrix
    pub fn max_value(self) -> i32 {
        self.size() * self.size() - 1
    }

    /// Bayer threshold at (x, y), tiled over the plane
    pub fn value(self, x: i32, y: i32) -> i32 {
        let n = self.size();
        bayer(n, x.rem_euclid(n), y.rem_euclid(n))
    }
}

fn bayer(n: i32, x: i32, y: i32) -> i32 {
    if n == 1 {
        return 0;
    }
    let half = n / 2;
    let q = match (x >= half, y >= half) {
        (false, false) => 0,
        (true, true) => 1,
        (true, false) => 2,
        (false, true) => 3,
    };
    4 * bayer(half, x % half, y % half) + q
}

/// Interpolation parameter in 0.0..=1.0 of pixel `p` for a gradient from
/// `u` to `v`
pub fn gradient_param(kind: GradientType, u: Point, v: Point, p: Point) -> f64 {
    let (dx, dy) = ((v.x - u.x) as f64, (v.y - u.y) as f64);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return 0.0;
    }
    let (px, py) = ((p.x - u.x) as f64, (p.y - u.y) as f64);
    let t = match kind {
        GradientType::Linear => (px * dx + py * dy) / len2,
        GradientType::Radial => ((px * px + py * py) / len2).sqrt(),
    };
    t.clamp(0.0, 1.0)
}

/// Color at parameter `t` for pixel (x, y), dithered when a matrix is set
pub fn gradient_color(c0: ColorValue, c1: ColorValue, t: f64, matrix: DitheringMatrix, x: i32, y: i32) -> ColorValue {
    if matrix.is_dithered() {
        let level = (t * (matrix.max_value() + 2) as f64) as i32;
        if level > matrix.value(x, y) { c1 } else { c0 }
    } else {
        rgba_lerp(c0, c1, (t * 255.0).round() as i32)
    }
}

/// Renders an RGBA gradient over the whole image. `img_pos` is the canvas
/// position of the image's top-left pixel.
#[allow(clippy::too_many_arguments)]
pub fn render_rgba_gradient(
    img: &mut Image,
    img_pos: Point,
    u: Point,
    v: Point,
    c0: ColorValue,
    c1: ColorValue,
    matrix: DitheringMatrix,
    kind: GradientType,
) {
    for y in 0..img.height() {
        for x in 0..img.width() {
            let p = Point::new(img_pos.x + x, img_pos.y + y);
            let t = gradient_param(kind, u, v, p);
            img.put_pixel(x, y, gradient_color(c0, c1, t, matrix, p.x, p.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{rgba, PixelFormat};

    #[test]
    fn test_bayer2_layout() {
        let m = DitheringMatrix::Bayer2;
        assert_eq!([m.value(0, 0), m.value(1, 0), m.value(0, 1), m.value(1, 1)], [0, 2, 3, 1]);
        assert_eq!(m.value(2, 2), 0);
    }

    #[test]
    fn test_bayer8_is_a_permutation() {
        let m = DitheringMatrix::Bayer8;
        let mut seen = vec![false; 64];
        for y in 0..8 {
            for x in 0..8 {
                seen[m.value(x, y) as usize] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_linear_gradient_ends() {
        let mut img = Image::try_new(PixelFormat::Rgb, 5, 1).unwrap();
        let black = rgba(0, 0, 0, 255);
        let white = rgba(255, 255, 255, 255);
        render_rgba_gradient(
            &mut img,
            Point::new(0, 0),
            Point::new(0, 0),
            Point::new(4, 0),
            black,
            white,
            DitheringMatrix::None,
            GradientType::Linear,
        );
        assert_eq!(img.get_pixel(0, 0), black);
        assert_eq!(img.get_pixel(4, 0), white);
    }

    #[test]
    fn test_radial_param() {
        let t = gradient_param(GradientType::Radial, Point::new(0, 0), Point::new(4, 0), Point::new(0, 2));
        assert!((t - 0.5).abs() < 1e-9);
    }
}
