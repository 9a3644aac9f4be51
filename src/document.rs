use std::sync::Arc;
use std::time::Duration;

use log::warn;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::color::{rgba_geta, ColorValue, PixelFormat};
use crate::error::{ToolLoopError, ToolLoopResult};
use crate::geometry::{Grid, Rect};
use crate::image::Image;
use crate::layer::{Layer, LayerId, Tilemap};
use crate::palette::Palette;
use crate::selection::Mask;

/// A sprite being edited: canvas-sized layers sharing one pixel format
/// and palette, plus the current selection.
#[derive(Debug, Clone)]
pub struct Document {
    id: Uuid,
    format: PixelFormat,
    width: i32,
    height: i32,
    palette: Palette,
    transparent_index: ColorValue,
    layers: Vec<Layer>,
    active_layer: Option<LayerId>,
    mask: Mask,
    slices: Vec<Rect>,
}

/// Document shared between the UI thread and background readers (the
/// renderer, backups). Gestures only take it with a bounded wait.
pub type SharedDocument = Arc<RwLock<Document>>;

impl Document {
    pub fn new(format: PixelFormat, width: i32, height: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            format,
            width: width.max(1),
            height: height.max(1),
            palette: Palette::default(),
            transparent_index: 0,
            layers: Vec::new(),
            active_layer: None,
            mask: Mask::new(),
            slices: Vec::new(),
        }
    }

    /// Wraps the document in its shared lock handle
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> Uuid {
        self.id
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

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Palette index treated as transparent on transparent layers
    pub fn transparent_index(&self) -> ColorValue {
        self.transparent_index
    }

    pub fn set_transparent_index(&mut self, index: ColorValue) {
        self.transparent_index = index;
    }

    /// Pixel value that clears a layer: the transparent index for indexed
    /// documents, fully transparent black otherwise.
    pub fn clear_color(&self) -> ColorValue {
        match self.format {
            PixelFormat::Indexed => self.transparent_index,
            PixelFormat::Rgb | PixelFormat::Grayscale => 0,
        }
    }

    /// Adds an empty image layer on top and makes it active
    pub fn add_layer(&mut self, name: &str) -> ToolLoopResult<LayerId> {
        let mut image = Image::try_new(self.format, self.width, self.height)?;
        image.clear(self.clear_color());
        Ok(self.push_layer(Layer::new_image(name, image)))
    }

    /// Adds an opaque background layer filled with `color`
    pub fn add_background(&mut self, color: ColorValue) -> ToolLoopResult<LayerId> {
        let mut image = Image::try_new(self.format, self.width, self.height)?;
        image.clear(color);
        let mut layer = Layer::new_image("Background", image);
        layer.background = true;
        Ok(self.push_layer(layer))
    }

    /// Adds a tilemap layer covering the canvas with the given grid
    pub fn add_tilemap_layer(&mut self, name: &str, grid: Grid) -> ToolLoopResult<LayerId> {
        let cols = (self.width + grid.tile_w - 1) / grid.tile_w;
        let rows = (self.height + grid.tile_h - 1) / grid.tile_h;
        let tilemap = Tilemap::new(grid, cols, rows, self.format)?;
        Ok(self.push_layer(Layer::new_tilemap(name, tilemap)))
    }

    fn push_layer(&mut self, layer: Layer) -> LayerId {
        self.layers.push(layer);
        let id = LayerId::new(self.layers.len() - 1);
        self.active_layer = Some(id);
        id
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.index())
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.index())
    }

    pub fn active_layer(&self) -> Option<LayerId> {
        self.active_layer
    }

    pub fn set_active_layer(&mut self, id: LayerId) {
        if id.index() < self.layers.len() {
            self.active_layer = Some(id);
        }
    }

    /// Current selection; empty when nothing is selected
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn set_mask(&mut self, mask: Mask) {
        self.mask = mask;
    }

    pub fn slices(&self) -> &[Rect] {
        &self.slices
    }

    pub fn add_slice(&mut self, rect: Rect) {
        self.slices.push(rect);
    }

    /// Removes the last slice equal to `rect`
    pub fn remove_slice(&mut self, rect: Rect) -> bool {
        match self.slices.iter().rposition(|s| *s == rect) {
            Some(i) => {
                self.slices.remove(i);
                true
            }
            None => false,
        }
    }

    /// Whether the alpha channel of `pixel` is fully opaque in this
    /// document's format
    pub fn is_opaque(&self, pixel: ColorValue) -> bool {
        match self.format {
            PixelFormat::Rgb => rgba_geta(pixel) == 255,
            PixelFormat::Grayscale => crate::color::graya_geta(pixel) == 255,
            PixelFormat::Indexed => {
                pixel != self.transparent_index && rgba_geta(self.palette.entry(pixel as usize)) == 255
            }
        }
    }
}

/// Takes the reader lock, giving up after `wait`
pub fn read_document(doc: &SharedDocument, wait: Duration) -> ToolLoopResult<RwLockReadGuard<'_, Document>> {
    doc.try_read_for(wait).ok_or_else(|| {
        warn!("Document is locked for writing, giving up after {:?}", wait);
        ToolLoopError::DocumentLocked
    })
}

/// Takes the writer lock, giving up after `wait`
pub fn write_document(doc: &SharedDocument, wait: Duration) -> ToolLoopResult<RwLockWriteGuard<'_, Document>> {
    doc.try_write_for(wait).ok_or_else(|| {
        warn!("Document is in use, giving up after {:?}", wait);
        ToolLoopError::DocumentLocked
    })
}
