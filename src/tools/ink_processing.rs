//! Pixel routines behind the inks. Every routine reads the source image
//! and writes the preview image, one pixel at a time, with one variant of
//! the math per pixel format.

use crate::color::{
    graya, graya_blender_merge, graya_blender_neg_bw, graya_blender_normal, graya_geta, graya_getv, mul_un8,
    rgba, rgba_blender_merge, rgba_blender_neg_bw, rgba_blender_normal, rgba_getb, rgba_geta, rgba_getg,
    rgba_getr, rgba_luma, ColorValue, PixelFormat, GRAYA_A_MASK, RGBA_A_MASK, RGBA_RGB_MASK,
};
use crate::geometry::Point;
use crate::palette::Palette;

use super::point_shape::PointShape;
use super::pointer::Button;
use super::tool_loop::{ShadingTable, ToolLoop};

/// Routine picked by `Ink::prepare_ink`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InkProcessing {
    #[default]
    Noop,
    Copy,
    LockAlpha,
    /// Alpha compositing of the primary color
    Transparent,
    Merge,
    Replace,
    Xor,
    Shading,
    Gradient,
    /// 3×3 average of the source, weighted by alpha
    Blur,
    /// Source pixels picked around the point, pushed against the pointer
    /// movement
    Jumble,
    BrushSimple,
    BrushLockAlpha,
    BrushCopy,
    BrushEraser,
    BrushShading,
}

impl InkProcessing {
    /// Routines that paint the pixels of an image brush
    pub fn uses_brush_image(self) -> bool {
        matches!(
            self,
            InkProcessing::BrushSimple
                | InkProcessing::BrushLockAlpha
                | InkProcessing::BrushCopy
                | InkProcessing::BrushEraser
                | InkProcessing::BrushShading
        )
    }
}

/// Raw brush pixel with the brush image's own format
#[derive(Debug, Clone, Copy)]
struct BrushPixel {
    color: ColorValue,
    format: PixelFormat,
}

impl ToolLoop {
    /// Records where the next stamp starts, image brushes align their
    /// pixels to it
    pub(crate) fn prepare_for_point_shape(&mut self, _first_point: bool, x: i32, y: i32) {
        let bounds = self.brush().bounds();
        self.ink_state.brush_origin = match self.point_shape() {
            PointShape::FloodFill => Point::new(x - bounds.w / 2, y - bounds.h / 2),
            _ => Point::new(x, y),
        };
    }

    /// Runs the ink routine over a scanline, honoring the selection
    pub(crate) fn process_scanline(&mut self, x1: i32, y: i32, x2: i32) {
        let canvas = self.canvas();
        if y < canvas.y || y >= canvas.y2() {
            return;
        }
        let mut x1 = x1.max(canvas.x);
        let mut x2 = x2.min(canvas.x2() - 1);

        let use_mask = self.use_mask();
        if use_mask {
            let bounds = self.mask().bounds();
            if y < bounds.y || y >= bounds.y2() {
                return;
            }
            x1 = x1.max(bounds.x);
            x2 = x2.min(bounds.x2() - 1);
        }

        let processing = self.ink_state.processing;
        let speed = self.speed();
        let speed = Point::new(speed.x / 4, speed.y / 4);
        for x in x1..=x2 {
            if use_mask && !self.mask().contains(x, y) {
                continue;
            }
            let c = match processing {
                InkProcessing::Jumble => {
                    let from = self.jumble_source(x, y, speed);
                    self.jumble_pixel(x, y, from)
                }
                _ => self.process_pixel(processing, x, y),
            };
            if let Some(c) = c {
                self.dst.put_pixel(x, y, c);
                self.record_alpha(c);
            }
        }
    }

    /// New value for the preview pixel at (x, y), `None` to leave it
    fn process_pixel(&self, processing: InkProcessing, x: i32, y: i32) -> Option<ColorValue> {
        let src = self.src.get_pixel(x, y);
        let dst = self.dst.get_pixel(x, y);
        let op = self.opacity();
        let format = self.format();
        let palette = self.palette();
        let mask_index = self.mask_index();

        match processing {
            InkProcessing::Noop => None,
            InkProcessing::Copy => {
                let mut c = self.primary;
                if self.is_background_layer() {
                    match format {
                        PixelFormat::Rgb => c |= RGBA_A_MASK,
                        PixelFormat::Grayscale => c |= GRAYA_A_MASK,
                        PixelFormat::Indexed => {}
                    }
                }
                Some(c)
            }
            InkProcessing::LockAlpha => Some(match format {
                PixelFormat::Rgb => {
                    let r = rgba_blender_normal(src, self.primary, op);
                    (r & RGBA_RGB_MASK) | (src & RGBA_A_MASK)
                }
                PixelFormat::Grayscale => {
                    let r = graya_blender_normal(src, self.primary, op);
                    graya(graya_getv(r), graya_geta(src))
                }
                PixelFormat::Indexed => {
                    let color = palette.entry(self.primary as usize);
                    let c = entry_with_mask(palette, src, mask_index);
                    let r = rgba_blender_normal(c, color, op);
                    palette.find_bestfit(rgba_getr(r), rgba_getg(r), rgba_getb(r), rgba_geta(c), mask_index)
                        as ColorValue
                }
            }),
            InkProcessing::Transparent => match format {
                PixelFormat::Rgb => Some(rgba_blender_normal(src, self.primary, op)),
                PixelFormat::Grayscale => Some(graya_blender_normal(src, self.primary, op)),
                PixelFormat::Indexed => {
                    if Some(self.fg_color() as usize) == mask_index {
                        return None;
                    }
                    let c = entry_with_mask(palette, src, mask_index);
                    let c = rgba_blender_normal(c, palette.entry(self.primary as usize), op);
                    Some(self.rgbmap.map_color(c))
                }
            },
            InkProcessing::Merge => match format {
                PixelFormat::Rgb => Some(rgba_blender_merge(src, self.primary, op)),
                PixelFormat::Grayscale => Some(graya_blender_merge(src, self.primary, op)),
                PixelFormat::Indexed => {
                    let color = entry_with_mask(palette, self.primary, mask_index);
                    let c = entry_with_mask(palette, src, mask_index);
                    Some(self.rgbmap.map_color(rgba_blender_merge(c, color, op)))
                }
            },
            InkProcessing::Replace => self.replace_pixel(src, op),
            InkProcessing::Xor => Some(match format {
                PixelFormat::Rgb => rgba_blender_neg_bw(src, 0, 255),
                PixelFormat::Grayscale => graya_blender_neg_bw(src, 0, 255),
                PixelFormat::Indexed => self
                    .rgbmap
                    .map_color(rgba_blender_neg_bw(palette.entry(src as usize), 0, 255)),
            }),
            InkProcessing::Shading => Some(self.shade(src)),
            InkProcessing::Gradient => {
                let t = self
                    .ink_state
                    .gradient
                    .as_ref()
                    .map(|img| img.get_pixel(x, y))
                    .unwrap_or(0);
                Some(match format {
                    PixelFormat::Rgb => rgba_blender_normal(src, t, op),
                    PixelFormat::Grayscale => graya_blender_normal(src, graya(rgba_getr(t), rgba_geta(t)), op),
                    PixelFormat::Indexed => {
                        let c0 = entry_with_mask(palette, src, mask_index);
                        self.rgbmap.map_color(rgba_blender_normal(c0, t, op))
                    }
                })
            }
            InkProcessing::Blur => Some(self.blur_pixel(x, y, src)),
            // Needs a random source, picked by `process_scanline`
            InkProcessing::Jumble => None,
            InkProcessing::BrushSimple => self.brush_simple(x, y, dst),
            InkProcessing::BrushLockAlpha => match format {
                PixelFormat::Rgb => self
                    .brush_simple(x, y, dst)
                    .map(|c| (c & RGBA_RGB_MASK) | (src & RGBA_A_MASK)),
                PixelFormat::Grayscale => self
                    .brush_simple(x, y, dst)
                    .map(|c| graya(graya_getv(c), graya_geta(src))),
                PixelFormat::Indexed => {
                    if Some(src as usize) == mask_index {
                        None
                    } else {
                        self.brush_simple(x, y, dst)
                    }
                }
            },
            InkProcessing::BrushCopy => self.brush_copy(x, y, src),
            InkProcessing::BrushEraser => self.brush_eraser(x, y, src, dst),
            InkProcessing::BrushShading => {
                let b = self.brush_pixel(x, y)?;
                let paints = match b.format {
                    PixelFormat::Rgb => rgba_geta(b.color) != 0 && self.shade_index(b.color).is_some(),
                    PixelFormat::Indexed => Some(b.color as usize) != self.brush_mask_index(),
                    PixelFormat::Grayscale => graya_geta(b.color) != 0,
                };
                paints.then(|| self.shade(src))
            }
        }
    }

    fn replace_pixel(&self, src: ColorValue, op: i32) -> Option<ColorValue> {
        let color1 = self.primary;
        let mut color2 = self.secondary;
        match self.format() {
            PixelFormat::Rgb => {
                if self.is_background_layer() {
                    color2 |= RGBA_A_MASK;
                }
                let (sa, ca) = (rgba_geta(src), rgba_geta(color1));
                let matches = (sa == 0 && ca == 0)
                    || (sa > 0 && ca > 0 && (src & RGBA_RGB_MASK) == (color1 & RGBA_RGB_MASK));
                matches.then(|| rgba_blender_merge(src, color2, op))
            }
            PixelFormat::Grayscale => {
                if self.is_background_layer() {
                    color2 |= GRAYA_A_MASK;
                }
                let (sa, ca) = (graya_geta(src), graya_geta(color1));
                let matches = (sa == 0 && ca == 0) || (sa > 0 && ca > 0 && graya_getv(src) == graya_getv(color1));
                matches.then(|| graya_blender_merge(src, color2, op))
            }
            PixelFormat::Indexed => {
                if src != color1 {
                    None
                } else if op == 255 {
                    Some(color2)
                } else {
                    let palette = self.palette();
                    let c = rgba_blender_normal(palette.entry(src as usize), palette.entry(color2 as usize), op);
                    Some(self.rgbmap.map_color(c))
                }
            }
        }
    }

    /// Merges the average of the 3×3 neighborhood of (x, y) into `src`.
    /// Transparent neighbors don't count for the color but still dilute
    /// the alpha.
    fn blur_pixel(&self, x: i32, y: i32, src: ColorValue) -> ColorValue {
        let canvas = self.canvas();
        let tiled = self.tiled_mode();
        let format = self.format();
        let palette = self.palette();
        let mask_index = self.mask_index();

        let (mut count, mut r, mut g, mut b, mut a) = (0u32, 0u32, 0u32, 0u32, 0u32);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let pt = tiled.wrap_point(Point::new(x + dx, y + dy), canvas);
                if !canvas.contains(pt.x, pt.y) {
                    continue;
                }
                let c = self.src.get_pixel(pt.x, pt.y);
                let c = match format {
                    PixelFormat::Rgb => c,
                    PixelFormat::Grayscale => {
                        let v = graya_getv(c);
                        rgba(v, v, v, graya_geta(c))
                    }
                    PixelFormat::Indexed if Some(c as usize) == mask_index => continue,
                    PixelFormat::Indexed => palette.entry(c as usize),
                };
                if rgba_geta(c) == 0 {
                    continue;
                }
                r += rgba_getr(c) as u32;
                g += rgba_getg(c) as u32;
                b += rgba_getb(c) as u32;
                a += rgba_geta(c) as u32;
                count += 1;
            }
        }
        if count == 0 {
            return src;
        }

        let (r, g, b, a) = ((r / count) as u8, (g / count) as u8, (b / count) as u8, (a / 9) as u8);
        let op = self.opacity();
        match format {
            PixelFormat::Rgb => rgba_blender_merge(src, rgba(r, g, b, a), op),
            PixelFormat::Grayscale => graya_blender_merge(src, graya(r, a), op),
            PixelFormat::Indexed => {
                let c = rgba_blender_merge(palette.entry(src as usize), rgba(r, g, b, a), op);
                self.rgbmap.map_color(c)
            }
        }
    }

    /// Random source position for a jumbled pixel, clamped to the canvas
    fn jumble_source(&mut self, x: i32, y: i32, speed: Point) -> Point {
        let dx = (self.next_random() % 3) as i32 - 1;
        let dy = (self.next_random() % 3) as i32 - 1;
        let canvas = self.canvas();
        let pt = self
            .tiled_mode()
            .wrap_point(Point::new(x + dx - speed.x, y + dy - speed.y), canvas);
        Point::new(
            pt.x.clamp(canvas.x, canvas.x2() - 1),
            pt.y.clamp(canvas.y, canvas.y2() - 1),
        )
    }

    fn jumble_pixel(&self, x: i32, y: i32, from: Point) -> Option<ColorValue> {
        let src = self.src.get_pixel(x, y);
        let picked = self.src.get_pixel(from.x, from.y);
        let op = self.opacity();
        Some(match self.format() {
            PixelFormat::Rgb => rgba_blender_merge(src, picked, op),
            PixelFormat::Grayscale => graya_blender_merge(src, picked, op),
            PixelFormat::Indexed => {
                let palette = self.palette();
                let entry = |c: ColorValue| if c != 0 { palette.entry(c as usize) } else { 0 };
                let c = rgba_blender_merge(entry(src), entry(picked), op);
                if rgba_geta(c) >= 128 {
                    self.rgbmap.map_color(c)
                } else {
                    0
                }
            }
        })
    }

    /// Index of `c` (RGBA) in the shading ramp
    fn shade_index(&self, c: ColorValue) -> Option<usize> {
        match self.shading()? {
            ShadingTable::Colors(colors) => colors.iter().position(|&s| s == c),
            ShadingTable::Remap(_) => self.palette().find_exact_match(c, None),
        }
    }

    /// Next shade of `src` in the button's direction; colors outside the
    /// ramp stay put
    fn shade(&self, src: ColorValue) -> ColorValue {
        let left = self.button() == Button::Left;
        let step = |i: usize, len: usize| {
            if left {
                i.saturating_sub(1)
            } else {
                (i + 1).min(len.saturating_sub(1))
            }
        };
        match (self.format(), self.shading()) {
            (PixelFormat::Rgb, Some(ShadingTable::Colors(colors))) => {
                match colors.iter().position(|&s| s == src) {
                    Some(i) => colors[step(i, colors.len())],
                    None => src,
                }
            }
            (PixelFormat::Grayscale, Some(ShadingTable::Colors(colors))) => {
                let v = graya_getv(src);
                let key = rgba(v, v, v, graya_geta(src));
                match colors.iter().position(|&s| s == key) {
                    Some(i) => {
                        let c = colors[step(i, colors.len())];
                        graya(rgba_getr(c), rgba_geta(c))
                    }
                    None => src,
                }
            }
            (PixelFormat::Indexed, Some(ShadingTable::Remap(remap))) => remap.map(src),
            (PixelFormat::Indexed, Some(ShadingTable::Colors(_))) => {
                step(src as usize, self.palette().size()) as ColorValue
            }
            _ => src,
        }
    }

    /// Index that marks transparent pixels in the brush image
    fn brush_mask_index(&self) -> Option<usize> {
        match self.format() {
            PixelFormat::Indexed => self.mask_index(),
            PixelFormat::Rgb | PixelFormat::Grayscale => Some(0),
        }
    }

    /// Brush image pixel for canvas position (x, y), `None` outside the
    /// stencil. The image repeats from the stamp origin.
    fn brush_pixel(&self, x: i32, y: i32) -> Option<BrushPixel> {
        let brush = self.brush();
        let image = brush.image()?;
        let (w, h) = (image.width(), image.height());
        if w <= 0 || h <= 0 {
            return None;
        }
        let origin = self.ink_state.brush_origin;
        let bx = (x - origin.x).rem_euclid(w);
        let by = (y - origin.y).rem_euclid(h);
        if !brush.is_set(bx, by) {
            return None;
        }
        Some(BrushPixel {
            color: image.get_pixel(bx, by),
            format: image.format(),
        })
    }

    /// Brush pixel as RGBA, transparent for the brush mask index
    fn brush_rgba(&self, b: BrushPixel) -> ColorValue {
        match b.format {
            PixelFormat::Rgb => b.color,
            PixelFormat::Indexed => {
                if Some(b.color as usize) == self.brush_mask_index() {
                    0
                } else {
                    self.palette().entry(b.color as usize)
                }
            }
            PixelFormat::Grayscale => {
                let v = graya_getv(b.color);
                rgba(v, v, v, graya_geta(b.color))
            }
        }
    }

    /// Brush pixel composited over the preview pixel
    fn brush_simple(&self, x: i32, y: i32, dst: ColorValue) -> Option<ColorValue> {
        let b = self.brush_pixel(x, y)?;
        let op = self.opacity();
        match self.format() {
            PixelFormat::Rgb => Some(rgba_blender_normal(dst, self.brush_rgba(b), op)),
            PixelFormat::Grayscale => {
                let c = match b.format {
                    PixelFormat::Grayscale => b.color,
                    _ => {
                        let c = self.brush_rgba(b);
                        graya(rgba_luma(c) as u8, rgba_geta(c))
                    }
                };
                Some(graya_blender_normal(dst, c, op))
            }
            PixelFormat::Indexed => {
                let palette = self.palette();
                let mask_index = self.mask_index();
                let c = match b.format {
                    PixelFormat::Rgb => {
                        let c = rgba_blender_normal(palette.entry(dst as usize), b.color, op);
                        bestfit(palette, c, mask_index)
                    }
                    PixelFormat::Indexed => {
                        if Some(b.color as usize) == mask_index {
                            return None;
                        }
                        let f = palette.entry(b.color as usize);
                        if rgba_geta(f) == 255 && op == 255 {
                            b.color
                        } else {
                            let c = rgba_blender_normal(palette.entry(dst as usize), f, op);
                            bestfit(palette, c, mask_index)
                        }
                    }
                    PixelFormat::Grayscale => {
                        let d = palette.entry(dst as usize);
                        let d = graya(rgba_luma(d) as u8, rgba_geta(d));
                        let c = graya_blender_normal(d, b.color, op);
                        let v = graya_getv(c);
                        palette.find_bestfit(v, v, v, graya_geta(c), mask_index) as ColorValue
                    }
                };
                (Some(c as usize) != mask_index).then_some(c)
            }
        }
    }

    /// Brush pixel written as is; transparent brush pixels keep the source
    fn brush_copy(&self, x: i32, y: i32, src: ColorValue) -> Option<ColorValue> {
        let b = self.brush_pixel(x, y)?;
        let brush_mask = self.brush_mask_index();
        match self.format() {
            PixelFormat::Rgb => match b.format {
                PixelFormat::Indexed if Some(b.color as usize) == brush_mask => Some(src),
                _ => {
                    let c = self.brush_rgba(b);
                    (rgba_geta(c) != 0).then_some(c)
                }
            },
            PixelFormat::Grayscale => match b.format {
                PixelFormat::Indexed if Some(b.color as usize) == brush_mask => Some(src),
                PixelFormat::Grayscale => (graya_geta(b.color) != 0).then_some(b.color),
                _ => {
                    let c = self.brush_rgba(b);
                    (rgba_geta(c) != 0).then(|| graya(rgba_luma(c) as u8, rgba_geta(c)))
                }
            },
            PixelFormat::Indexed => {
                let palette = self.palette();
                let mask_index = self.mask_index();
                match b.format {
                    PixelFormat::Indexed => {
                        if Some(b.color as usize) == mask_index {
                            Some(src)
                        } else {
                            Some(b.color)
                        }
                    }
                    PixelFormat::Rgb => {
                        if rgba_geta(b.color) == 0 {
                            return None;
                        }
                        let c = bestfit(palette, b.color, mask_index);
                        Some(if c == 0 { src } else { c })
                    }
                    PixelFormat::Grayscale => {
                        if graya_geta(b.color) == 0 {
                            return None;
                        }
                        let v = graya_getv(b.color);
                        Some(palette.find_bestfit(v, v, v, graya_geta(b.color), mask_index) as ColorValue)
                    }
                }
            }
        }
    }

    /// Removes alpha where the brush is opaque
    fn brush_eraser(&self, x: i32, y: i32, src: ColorValue, dst: ColorValue) -> Option<ColorValue> {
        let b = self.brush_pixel(x, y)?;
        let brush_alpha = rgba_geta(self.brush_rgba(b)) as i32;
        match self.format() {
            PixelFormat::Rgb => {
                let a = mul_un8(rgba_geta(dst) as i32, 255 - brush_alpha);
                Some((src & RGBA_RGB_MASK) | ((a as u32) << 24))
            }
            PixelFormat::Grayscale => {
                let a = mul_un8(graya_geta(dst) as i32, 255 - brush_alpha);
                Some(graya(graya_getv(src), a as u8))
            }
            PixelFormat::Indexed => {
                if brush_alpha == 0 {
                    return None;
                }
                Some(match self.mask_index() {
                    Some(mask) => mask as ColorValue,
                    None => self.bg_color(),
                })
            }
        }
    }
}

/// Palette color of index `c`, with zero alpha for the mask index
fn entry_with_mask(palette: &Palette, c: ColorValue, mask_index: Option<usize>) -> ColorValue {
    if Some(c as usize) == mask_index {
        palette.entry(c as usize) & RGBA_RGB_MASK
    } else {
        palette.entry(c as usize)
    }
}

fn bestfit(palette: &Palette, c: ColorValue, mask_index: Option<usize>) -> ColorValue {
    palette.find_bestfit(
        rgba_getr(c),
        rgba_getg(c),
        rgba_getb(c),
        rgba_geta(c),
        mask_index,
    ) as ColorValue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tools::catalog::{FillMode, ToolButtonConfig};
    use crate::tools::controller::Controller;
    use crate::tools::ink::{Ink, PaintInkType};
    use crate::tools::intertwine::Intertwine;
    use crate::tools::tool_loop::ToolLoopParams;
    use crate::tools::TracePolicy;

    fn loop_with(ink: Ink, format: PixelFormat, fg: ColorValue, opacity: i32) -> ToolLoop {
        let mut doc = Document::new(format, 4, 4);
        doc.add_layer("Layer").unwrap();
        let config = ToolButtonConfig {
            ink,
            controller: Controller::Freehand,
            point_shape: PointShape::Pixel,
            intertwine: Intertwine::AsLines,
            trace_policy: TracePolicy::Accumulate,
            fill: FillMode::None,
        };
        let mut params = ToolLoopParams::new("test", config, Button::Left);
        params.fg = fg;
        params.opacity = opacity;
        let mut lp = ToolLoop::new(&doc, params).unwrap();
        ink.prepare_ink(&mut lp).unwrap();
        lp
    }

    #[test]
    fn test_copy_is_idempotent() {
        let red = rgba(255, 0, 0, 255);
        let mut lp = loop_with(Ink::Paint(PaintInkType::Copy), PixelFormat::Rgb, red, 255);
        lp.process_scanline(0, 0, 3);
        let once = lp.dst().clone();
        lp.process_scanline(0, 0, 3);
        assert_eq!(lp.dst(), &once);
        assert_eq!(lp.dst().get_pixel(2, 0), red);
    }

    #[test]
    fn test_alpha_compositing_boundaries() {
        let clear = rgba(10, 20, 30, 0);
        let mut lp = loop_with(Ink::Paint(PaintInkType::AlphaCompositing), PixelFormat::Rgb, clear, 255);
        assert_eq!(lp.ink_state.processing, InkProcessing::Transparent);
        lp.src.put_pixel(1, 1, rgba(1, 2, 3, 255));
        lp.dst.put_pixel(1, 1, rgba(1, 2, 3, 255));
        lp.process_scanline(1, 1, 1);
        assert_eq!(lp.dst().get_pixel(1, 1), rgba(1, 2, 3, 255));

        let solid = rgba(200, 100, 50, 255);
        let mut lp = loop_with(Ink::Paint(PaintInkType::AlphaCompositing), PixelFormat::Rgb, solid, 255);
        lp.src.put_pixel(1, 1, rgba(1, 2, 3, 255));
        lp.process_scanline(1, 1, 1);
        assert_eq!(lp.dst().get_pixel(1, 1), solid);
    }

    #[test]
    fn test_lock_alpha_keeps_transparency() {
        let mut lp = loop_with(Ink::Paint(PaintInkType::LockAlpha), PixelFormat::Rgb, rgba(0, 255, 0, 255), 255);
        lp.src.put_pixel(0, 0, rgba(255, 0, 0, 100));
        lp.process_scanline(0, 0, 0);
        assert_eq!(rgba_geta(lp.dst().get_pixel(0, 0)), 100);
    }

    #[test]
    fn test_xor_marks_transparent_black() {
        let mut lp = loop_with(Ink::Selection, PixelFormat::Rgb, 0, 255);
        lp.process_scanline(0, 2, 1);
        assert_eq!(lp.dst().get_pixel(0, 2), rgba(0, 0, 0, 255));
        assert_eq!(lp.dst().get_pixel(2, 2), 0);
    }

    #[test]
    fn test_scanline_is_clipped_to_canvas() {
        let red = rgba(255, 0, 0, 255);
        let mut lp = loop_with(Ink::Paint(PaintInkType::Copy), PixelFormat::Rgb, red, 255);
        lp.process_scanline(-10, 1, 100);
        lp.process_scanline(0, 9, 2);
        assert_eq!(lp.dst().get_pixel(0, 1), red);
        assert_eq!(lp.dst().get_pixel(3, 1), red);
        assert_eq!(lp.alpha_histogram()[255], 4);
    }

    #[test]
    fn test_blur_softens_only_the_edges() {
        let grey = rgba(40, 80, 120, 255);
        let mut lp = loop_with(Ink::Blur, PixelFormat::Rgb, 0, 255);
        assert_eq!(lp.ink_state.processing, InkProcessing::Blur);
        lp.src.clear(grey);
        lp.process_scanline(0, 0, 1);
        lp.process_scanline(0, 1, 1);

        // Neighbors past the canvas edge count as transparent
        assert_eq!(lp.dst().get_pixel(1, 1), grey);
        assert_eq!(lp.dst().get_pixel(0, 0), rgba(40, 80, 120, 113));
        assert_eq!(lp.dst().get_pixel(1, 0), rgba(40, 80, 120, 170));
    }

    #[test]
    fn test_blur_of_transparent_area_keeps_source() {
        let mut lp = loop_with(Ink::Blur, PixelFormat::Rgb, 0, 255);
        lp.src.put_pixel(2, 2, rgba(9, 9, 9, 0));
        lp.process_scanline(1, 2, 3);
        assert_eq!(lp.dst().get_pixel(2, 2), rgba(9, 9, 9, 0));
    }

    #[test]
    fn test_jumble_pulls_pixels_against_the_movement() {
        let red = rgba(255, 0, 0, 255);
        let blue = rgba(0, 0, 255, 255);
        let mut lp = loop_with(Ink::Jumble, PixelFormat::Rgb, 0, 255);
        lp.src.clear(blue);
        lp.src.fill_rect(crate::geometry::Rect::new(0, 0, 2, 4), red);
        lp.set_speed(Point::new(12, 0));
        for y in 0..4 {
            lp.process_scanline(3, y, 3);
            assert_eq!(lp.dst().get_pixel(3, y), red);
        }
    }

    #[test]
    fn test_jumble_is_reproducible() {
        let run = || {
            let mut lp = loop_with(Ink::Jumble, PixelFormat::Rgb, 0, 255);
            for i in 0..16 {
                lp.src.put_pixel(i % 4, i / 4, rgba(i as u8 * 16, 0, 0, 255));
            }
            for y in 0..4 {
                lp.process_scanline(0, y, 3);
            }
            lp.dst().clone()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_fg_and_bg_inks_always_composite() {
        let red = rgba(255, 0, 0, 255);
        for kind in [PaintInkType::WithFg, PaintInkType::WithBg] {
            let mut lp = loop_with(Ink::Paint(kind), PixelFormat::Rgb, red, 255);
            assert_eq!(lp.ink_state.processing, InkProcessing::Transparent);
            lp.process_scanline(0, 0, 0);
            let expected = if kind == PaintInkType::WithFg { red } else { lp.bg_color() };
            assert_eq!(lp.dst().get_pixel(0, 0), expected);
        }
    }
}
