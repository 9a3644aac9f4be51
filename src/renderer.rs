use std::time::Duration;

use egui::{Color32, ColorImage};
use log::{debug, warn};

use crate::color::{
    graya_geta, graya_getv, rgba, rgba_blender_merge, rgba_blender_neg_bw, rgba_blender_normal,
    rgba_to_color32, ColorValue, PixelFormat,
};
use crate::document::{read_document, Document, SharedDocument};
use crate::geometry::{Point, Region};
use crate::image::Image;
use crate::layer::{BlendMode, LayerId};

/// Where a gesture shows its work in progress. The preview replaces the
/// pixels of its layer until it's removed.
pub trait PreviewSink {
    fn install_preview_image(&mut self, layer: LayerId, image: &Image, origin: Point, blend_mode: BlendMode);

    /// `image` changed inside `region`
    fn update_preview_image(&mut self, image: &Image, region: &Region);

    fn remove_preview_image(&mut self);

    /// Asks for a redraw of part of the canvas
    fn invalidate_region(&mut self, region: &Region);
}

#[derive(Debug)]
struct Preview {
    layer: LayerId,
    image: Image,
    origin: Point,
    blend_mode: BlendMode,
}

/// Composites the document layers plus the live preview into an egui
/// image ready to be uploaded as a texture.
#[derive(Debug)]
pub struct Renderer {
    preview: Option<Preview>,
    invalid: Region,
    /// Side of the checkerboard squares drawn under transparent pixels
    checker_size: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            preview: None,
            invalid: Region::new(),
            checker_size: 8,
        }
    }

    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn preview_layer(&self) -> Option<LayerId> {
        self.preview.as_ref().map(|p| p.layer)
    }

    pub fn preview_image(&self) -> Option<&Image> {
        self.preview.as_ref().map(|p| &p.image)
    }

    /// Canvas area invalidated since the last call
    pub fn take_invalid_region(&mut self) -> Region {
        std::mem::take(&mut self.invalid)
    }

    /// Renders the shared document. If the document stays locked for
    /// `wait`, a placeholder of the given size is returned instead.
    pub fn render(&self, doc: &SharedDocument, wait: Duration, placeholder_size: [usize; 2]) -> ColorImage {
        match read_document(doc, wait) {
            Ok(doc) => self.render_document(&doc),
            Err(err) => {
                warn!("Drawing a placeholder: {}", err);
                self.checkerboard(placeholder_size)
            }
        }
    }

    pub fn render_document(&self, doc: &Document) -> ColorImage {
        let (w, h) = (doc.width(), doc.height());
        let mut canvas = vec![0 as ColorValue; (w * h) as usize];

        for (index, layer) in doc.layers().iter().enumerate() {
            if !layer.visible {
                continue;
            }
            let id = LayerId::new(index);
            let preview = self.preview.as_ref().filter(|p| p.layer == id);
            let owned;
            let (pixels, origin, blend_mode) = match preview {
                Some(p) => (&p.image, p.origin, p.blend_mode),
                None => {
                    owned = match layer.pixels(doc.format(), w, h, doc.clear_color()) {
                        Ok(img) => img,
                        Err(err) => {
                            warn!("Skipping layer '{}': {}", layer.name, err);
                            continue;
                        }
                    };
                    (&owned, Point::default(), layer.blend_mode)
                }
            };

            let transparent = layer.is_transparent();
            for y in 0..h {
                for x in 0..w {
                    let (sx, sy) = (x - origin.x, y - origin.y);
                    if sx < 0 || sy < 0 || sx >= pixels.width() || sy >= pixels.height() {
                        continue;
                    }
                    let src = to_rgba(doc, pixels.get_pixel(sx, sy), transparent);
                    let i = (y * w + x) as usize;
                    canvas[i] = match blend_mode {
                        BlendMode::Normal => rgba_blender_normal(canvas[i], src, layer.opacity as i32),
                        BlendMode::Merge => rgba_blender_merge(canvas[i], src, layer.opacity as i32),
                        BlendMode::NegBw => rgba_blender_neg_bw(canvas[i], src, layer.opacity as i32),
                    };
                }
            }
        }

        let checker = self.checkerboard([w as usize, h as usize]);
        let pixels = canvas
            .iter()
            .zip(checker.pixels.iter())
            .map(|(&c, &bg)| {
                let bg = rgba(bg.r(), bg.g(), bg.b(), 255);
                rgba_to_color32(rgba_blender_normal(bg, c, 255))
            })
            .collect();
        ColorImage {
            size: [w as usize, h as usize],
            pixels,
        }
    }

    fn checkerboard(&self, size: [usize; 2]) -> ColorImage {
        let [w, h] = size;
        let n = self.checker_size.max(1);
        let pixels = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                if ((x / n) + (y / n)) % 2 == 0 {
                    Color32::from_gray(204)
                } else {
                    Color32::from_gray(153)
                }
            })
            .collect();
        ColorImage { size, pixels }
    }
}

fn to_rgba(doc: &Document, c: ColorValue, transparent_layer: bool) -> ColorValue {
    match doc.format() {
        PixelFormat::Rgb => c,
        PixelFormat::Grayscale => {
            let v = graya_getv(c);
            rgba(v, v, v, graya_geta(c))
        }
        PixelFormat::Indexed => {
            if transparent_layer && c == doc.transparent_index() {
                0
            } else {
                doc.palette().entry(c as usize)
            }
        }
    }
}

impl PreviewSink for Renderer {
    fn install_preview_image(&mut self, layer: LayerId, image: &Image, origin: Point, blend_mode: BlendMode) {
        debug!("Preview installed on layer {}", layer);
        self.preview = Some(Preview {
            layer,
            image: image.clone(),
            origin,
            blend_mode,
        });
        self.invalid.add_rect(image.bounds().offset(origin.x, origin.y));
    }

    fn update_preview_image(&mut self, image: &Image, region: &Region) {
        let Some(preview) = &mut self.preview else {
            return;
        };
        for rect in region.rects() {
            let r = rect.intersect(&image.bounds());
            if !r.is_empty() {
                preview.image.copy_from(image, r.x, r.y, r);
            }
        }
    }

    fn remove_preview_image(&mut self) {
        if let Some(preview) = self.preview.take() {
            debug!("Preview removed from layer {}", preview.layer);
        }
    }

    fn invalidate_region(&mut self, region: &Region) {
        self.invalid.add_region(region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use parking_lot::RwLock;
    use std::sync::Arc;

    #[test]
    fn test_preview_replaces_layer_pixels() {
        let mut doc = Document::new(PixelFormat::Rgb, 4, 4);
        let layer = doc.add_layer("Layer 1").unwrap();
        let mut renderer = Renderer::new();

        let mut preview = Image::try_new(PixelFormat::Rgb, 4, 4).unwrap();
        renderer.install_preview_image(layer, &preview, Point::default(), BlendMode::Normal);
        preview.put_pixel(1, 1, rgba(255, 0, 0, 255));
        renderer.update_preview_image(&preview, &Region::from_rect(Rect::new(1, 1, 1, 1)));

        let out = renderer.render_document(&doc);
        assert_eq!(out.pixels[4 + 1], Color32::from_rgb(255, 0, 0));
        assert_ne!(out.pixels[0], Color32::from_rgb(255, 0, 0));

        renderer.remove_preview_image();
        let out = renderer.render_document(&doc);
        assert_ne!(out.pixels[4 + 1], Color32::from_rgb(255, 0, 0));
        assert!(!renderer.take_invalid_region().is_empty());
    }

    #[test]
    fn test_locked_document_gives_placeholder() {
        let doc: SharedDocument = Arc::new(RwLock::new(Document::new(PixelFormat::Rgb, 4, 4)));
        let _writer = doc.write();
        let renderer = Renderer::new();
        let out = renderer.render(&doc, Duration::from_millis(1), [16, 16]);
        assert_eq!(out.size, [16, 16]);
        assert_eq!(out.pixels[0], Color32::from_gray(204));
    }
}
