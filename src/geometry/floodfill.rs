//! Scanline flood fill with color tolerance, bounded by a rectangle and
//! an optional selection mask.

use crate::color::{graya_geta, graya_getv, rgba_geta, rgba_getb, rgba_getg, rgba_getr, ColorValue, PixelFormat};
use crate::image::Image;
use crate::selection::Mask;

use super::Rect;

/// Options of a fill, gathered from the tool preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodFillOptions {
    pub tolerance: i32,
    pub contiguous: bool,
    pub eight_connected: bool,
}

impl Default for FloodFillOptions {
    fn default() -> Self {
        Self {
            tolerance: 0,
            contiguous: true,
            eight_connected: false,
        }
    }
}

/// Whether `c` counts as `reference` for the fill. Two fully transparent
/// colors always match, whatever their color channels.
pub fn color_matches(format: PixelFormat, c: ColorValue, reference: ColorValue, tolerance: i32) -> bool {
    match format {
        PixelFormat::Rgb => {
            if c == reference || (rgba_geta(c) == 0 && rgba_geta(reference) == 0) {
                return true;
            }
            tolerance > 0
                && (rgba_getr(c) as i32 - rgba_getr(reference) as i32).abs() <= tolerance
                && (rgba_getg(c) as i32 - rgba_getg(reference) as i32).abs() <= tolerance
                && (rgba_getb(c) as i32 - rgba_getb(reference) as i32).abs() <= tolerance
                && (rgba_geta(c) as i32 - rgba_geta(reference) as i32).abs() <= tolerance
        }
        PixelFormat::Grayscale => {
            if c == reference || (graya_geta(c) == 0 && graya_geta(reference) == 0) {
                return true;
            }
            tolerance > 0
                && (graya_getv(c) as i32 - graya_getv(reference) as i32).abs() <= tolerance
                && (graya_geta(c) as i32 - graya_geta(reference) as i32).abs() <= tolerance
        }
        PixelFormat::Indexed => (c as i32 - reference as i32).abs() <= tolerance,
    }
}

/// Fills from (x, y) every pixel matching `src_color` inside `bounds`,
/// reporting the filled runs as `(x1, y, x2)`. Each pixel is reported at
/// most once.
pub fn floodfill(
    image: &Image,
    mask: Option<&Mask>,
    x: i32,
    y: i32,
    bounds: Rect,
    src_color: ColorValue,
    options: FloodFillOptions,
    mut hline: impl FnMut(i32, i32, i32),
) {
    if !image.bounds().contains(x, y) {
        return;
    }
    let bounds = bounds.intersect(&image.bounds());
    if bounds.is_empty() || !bounds.contains(x, y) {
        return;
    }

    let format = image.format();
    let masked = |px: i32, py: i32| mask.is_some_and(|m| !m.is_empty() && !m.contains(px, py));
    let matches = |px: i32, py: i32| {
        !masked(px, py) && color_matches(format, image.get_pixel(px, py), src_color, options.tolerance)
    };

    if !options.contiguous {
        for py in bounds.y..bounds.y2() {
            let mut px = bounds.x;
            while px < bounds.x2() {
                if matches(px, py) {
                    let start = px;
                    while px + 1 < bounds.x2() && matches(px + 1, py) {
                        px += 1;
                    }
                    hline(start, py, px);
                }
                px += 1;
            }
        }
        return;
    }

    let w = bounds.w as usize;
    let mut visited = vec![false; w * bounds.h as usize];
    let idx = |px: i32, py: i32| (py - bounds.y) as usize * w + (px - bounds.x) as usize;
    let diag = if options.eight_connected { 1 } else { 0 };

    let mut stack = vec![(x, y)];
    while let Some((sx, sy)) = stack.pop() {
        if visited[idx(sx, sy)] || !matches(sx, sy) {
            continue;
        }

        let mut left = sx;
        while left - 1 >= bounds.x && !visited[idx(left - 1, sy)] && matches(left - 1, sy) {
            left -= 1;
        }
        let mut right = sx;
        while right + 1 < bounds.x2() && !visited[idx(right + 1, sy)] && matches(right + 1, sy) {
            right += 1;
        }
        for px in left..=right {
            visited[idx(px, sy)] = true;
        }
        hline(left, sy, right);

        for ny in [sy - 1, sy + 1] {
            if ny < bounds.y || ny >= bounds.y2() {
                continue;
            }
            let from = (left - diag).max(bounds.x);
            let to = (right + diag).min(bounds.x2() - 1);
            let mut in_run = false;
            for px in from..=to {
                let open = !visited[idx(px, ny)] && matches(px, ny);
                if open && !in_run {
                    stack.push((px, ny));
                }
                in_run = open;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_pixels(image: &Image, x: i32, y: i32, options: FloodFillOptions) -> usize {
        let mut count = 0;
        let src = image.get_pixel(x, y);
        floodfill(image, None, x, y, image.bounds(), src, options, |x1, _, x2| {
            count += (x2 - x1 + 1) as usize
        });
        count
    }

    fn walled_image() -> Image {
        // Vertical wall at x = 2 on a 5x3 canvas
        let mut img = Image::try_new(PixelFormat::Indexed, 5, 3).unwrap();
        for y in 0..3 {
            img.put_pixel(2, y, 1);
        }
        img
    }

    #[test]
    fn test_fill_stops_at_wall() {
        let img = walled_image();
        assert_eq!(filled_pixels(&img, 0, 0, FloodFillOptions::default()), 6);
    }

    #[test]
    fn test_global_fill_ignores_wall() {
        let img = walled_image();
        let options = FloodFillOptions {
            contiguous: false,
            ..Default::default()
        };
        assert_eq!(filled_pixels(&img, 0, 0, options), 12);
    }

    #[test]
    fn test_eight_connectivity_crosses_diagonals() {
        let mut img = Image::try_new(PixelFormat::Indexed, 2, 2).unwrap();
        img.put_pixel(1, 0, 1);
        img.put_pixel(0, 1, 1);
        assert_eq!(filled_pixels(&img, 0, 0, FloodFillOptions::default()), 1);
        let options = FloodFillOptions {
            eight_connected: true,
            ..Default::default()
        };
        assert_eq!(filled_pixels(&img, 0, 0, options), 2);
    }

    #[test]
    fn test_fill_respects_mask() {
        let img = Image::try_new(PixelFormat::Indexed, 4, 4).unwrap();
        let mask = Mask::from_rect(Rect::new(0, 0, 2, 2));
        let mut count = 0;
        floodfill(&img, Some(&mask), 0, 0, img.bounds(), 0, FloodFillOptions::default(), |x1, _, x2| {
            count += x2 - x1 + 1
        });
        assert_eq!(count, 4);
    }

    #[test]
    fn test_rgb_tolerance() {
        use crate::color::rgba;
        assert!(color_matches(PixelFormat::Rgb, rgba(10, 10, 10, 255), rgba(12, 9, 10, 255), 2));
        assert!(!color_matches(PixelFormat::Rgb, rgba(10, 10, 10, 255), rgba(13, 9, 10, 255), 2));
        assert!(color_matches(PixelFormat::Rgb, rgba(1, 2, 3, 0), rgba(9, 9, 9, 0), 0));
    }
}
