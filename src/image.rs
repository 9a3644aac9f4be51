use crate::color::{ColorValue, PixelFormat};
use crate::error::ToolLoopError;
use crate::geometry::Rect;

/// A pixel buffer. Every pixel is stored as a packed [`ColorValue`]
/// whatever the format, so the inks can share one code path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    format: PixelFormat,
    width: i32,
    height: i32,
    pixels: Vec<ColorValue>,
}

impl Image {
    /// Allocates a cleared image, reporting allocation failure instead of
    /// aborting.
    pub fn try_new(format: PixelFormat, width: i32, height: i32) -> Result<Self, ToolLoopError> {
        let width = width.max(0);
        let height = height.max(0);
        let len = width as usize * height as usize;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| ToolLoopError::OutOfMemory {
                bytes: len.saturating_mul(std::mem::size_of::<ColorValue>()),
            })?;
        pixels.resize(len, 0);
        Ok(Self {
            format,
            width,
            height,
            pixels,
        })
    }

    /// Builds an image from row-major pixels. Missing pixels are cleared
    /// and extra ones dropped.
    pub fn from_pixels(format: PixelFormat, width: i32, height: i32, mut pixels: Vec<ColorValue>) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        pixels.resize(width as usize * height as usize, 0);
        Self {
            format,
            width,
            height,
            pixels,
        }
    }

    /// Bytes the image would take in its native format
    pub fn byte_size(format: PixelFormat, width: i32, height: i32) -> usize {
        width.max(0) as usize * height.max(0) as usize * format.bytes_per_pixel()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn pixels(&self) -> &[ColorValue] {
        &self.pixels
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            None
        } else {
            Some(y as usize * self.width as usize + x as usize)
        }
    }

    /// Pixel at (x, y), zero outside the image
    pub fn get_pixel(&self, x: i32, y: i32) -> ColorValue {
        self.index(x, y).map(|i| self.pixels[i]).unwrap_or(0)
    }

    /// Writes a pixel, ignoring positions outside the image
    pub fn put_pixel(&mut self, x: i32, y: i32, c: ColorValue) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = c;
        }
    }

    pub fn row(&self, y: i32) -> &[ColorValue] {
        match self.index(0, y) {
            Some(i) => &self.pixels[i..i + self.width as usize],
            None => &[],
        }
    }

    pub fn row_mut(&mut self, y: i32) -> &mut [ColorValue] {
        match self.index(0, y) {
            Some(i) => {
                let w = self.width as usize;
                &mut self.pixels[i..i + w]
            }
            None => &mut [],
        }
    }

    pub fn clear(&mut self, c: ColorValue) {
        self.pixels.fill(c);
    }

    pub fn fill_rect(&mut self, rect: Rect, c: ColorValue) {
        let rect = rect.intersect(&self.bounds());
        for y in rect.y..rect.y2() {
            let row = self.row_mut(y);
            row[rect.x as usize..rect.x2() as usize].fill(c);
        }
    }

    /// Copies `src_rect` of `src` so its origin lands on (dst_x, dst_y).
    /// Both sides are clipped.
    pub fn copy_from(&mut self, src: &Image, dst_x: i32, dst_y: i32, src_rect: Rect) {
        let src_rect = src_rect.intersect(&src.bounds());
        let target = Rect::new(dst_x, dst_y, src_rect.w, src_rect.h).intersect(&self.bounds());
        if target.is_empty() {
            return;
        }
        let sx = src_rect.x + (target.x - dst_x);
        let sy = src_rect.y + (target.y - dst_y);
        for row in 0..target.h {
            let from = &src.row(sy + row)[sx as usize..(sx + target.w) as usize];
            let y = target.y + row;
            self.row_mut(y)[target.x as usize..target.x2() as usize].copy_from_slice(from);
        }
    }

    /// Copies the same rectangle between two images of equal geometry
    pub fn copy_rect(&mut self, src: &Image, rect: Rect) {
        self.copy_from(src, rect.x, rect.y, rect);
    }

    /// New image with the pixels of `rect`; outside pixels come out as `bg`
    pub fn crop(&self, rect: Rect, bg: ColorValue) -> Result<Image, ToolLoopError> {
        let mut out = Image::try_new(self.format, rect.w, rect.h)?;
        out.clear(bg);
        out.copy_from(self, 0, 0, rect);
        Ok(out)
    }

    /// Bounds of the pixels that differ between two same-sized images
    pub fn diff_bounds(&self, other: &Image) -> Rect {
        if self.width != other.width || self.height != other.height {
            return self.bounds().union(&other.bounds());
        }
        let mut bounds = Rect::default();
        for y in 0..self.height {
            let a = self.row(y);
            let b = other.row(y);
            if a == b {
                continue;
            }
            let first = a.iter().zip(b).position(|(p, q)| p != q).unwrap_or(0) as i32;
            let last = a.iter().zip(b).rposition(|(p, q)| p != q).unwrap_or(0) as i32;
            bounds = bounds.union(&Rect::new(first, y, last - first + 1, 1));
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_access_is_harmless() {
        let mut img = Image::try_new(PixelFormat::Indexed, 4, 4).unwrap();
        img.put_pixel(-1, 0, 3);
        img.put_pixel(4, 0, 3);
        assert_eq!(img.get_pixel(10, 10), 0);
        assert!(img.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_crop_fills_outside_with_bg() {
        let mut img = Image::try_new(PixelFormat::Indexed, 2, 2).unwrap();
        img.clear(1);
        let crop = img.crop(Rect::new(1, 1, 2, 2), 7).unwrap();
        assert_eq!(crop.pixels(), &[1, 7, 7, 7]);
    }

    #[test]
    fn test_diff_bounds() {
        let a = Image::try_new(PixelFormat::Indexed, 8, 8).unwrap();
        let mut b = a.clone();
        b.put_pixel(2, 3, 1);
        b.put_pixel(6, 3, 1);
        assert_eq!(a.diff_bounds(&b), Rect::new(2, 3, 5, 1));
        assert!(a.diff_bounds(&a).is_empty());
    }

    #[test]
    fn test_copy_from_clips() {
        let mut src = Image::try_new(PixelFormat::Indexed, 3, 3).unwrap();
        src.clear(5);
        let mut dst = Image::try_new(PixelFormat::Indexed, 3, 3).unwrap();
        dst.copy_from(&src, 2, 2, Rect::new(0, 0, 3, 3));
        assert_eq!(dst.get_pixel(2, 2), 5);
        assert_eq!(dst.get_pixel(1, 1), 0);
    }
}
