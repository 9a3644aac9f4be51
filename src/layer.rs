use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::color::{ColorValue, PixelFormat};
use crate::error::ToolLoopError;
use crate::geometry::{Grid, Point};
use crate::image::Image;

/// How a layer (or a preview image) is composited over what's below
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Merge,
    /// Black or white depending on the backdrop, used for marquees
    NegBw,
}

/// Tile index meaning "no tile here"
pub const NOTILE: u32 = 0;

/// Pixels defined through a tileset: each grid cell holds a tile index.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    grid: Grid,
    cols: i32,
    rows: i32,
    map: Vec<u32>,
    /// Entry 0 is the empty tile
    tileset: Vec<Image>,
}

impl Tilemap {
    pub fn new(grid: Grid, cols: i32, rows: i32, format: PixelFormat) -> Result<Self, ToolLoopError> {
        let empty = Image::try_new(format, grid.tile_w, grid.tile_h)?;
        Ok(Self {
            grid,
            cols: cols.max(0),
            rows: rows.max(0),
            map: vec![NOTILE; (cols.max(0) * rows.max(0)) as usize],
            tileset: vec![empty],
        })
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn cols(&self) -> i32 {
        self.cols
    }

    pub fn rows(&self) -> i32 {
        self.rows
    }

    /// Adds a tile to the tileset and returns its index
    pub fn add_tile(&mut self, image: Image) -> u32 {
        self.tileset.push(image);
        (self.tileset.len() - 1) as u32
    }

    pub fn tile_count(&self) -> usize {
        self.tileset.len()
    }

    pub fn tile_image(&self, index: u32) -> Option<&Image> {
        self.tileset.get(index as usize)
    }

    pub fn set_tile_image(&mut self, index: u32, image: Image) {
        if let Some(slot) = self.tileset.get_mut(index as usize) {
            *slot = image;
        }
    }

    pub fn tile_at(&self, cell: Point) -> u32 {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.cols || cell.y >= self.rows {
            return NOTILE;
        }
        self.map[(cell.y * self.cols + cell.x) as usize]
    }

    pub fn set_tile(&mut self, cell: Point, index: u32) {
        if cell.x >= 0 && cell.y >= 0 && cell.x < self.cols && cell.y < self.rows {
            self.map[(cell.y * self.cols + cell.x) as usize] = index;
        }
    }

    /// Cells that show the given tile
    pub fn cells_with_tile(&self, index: u32) -> impl Iterator<Item = Point> + '_ {
        self.map
            .iter()
            .enumerate()
            .filter(move |(_, t)| **t == index)
            .map(move |(i, _)| Point::new(i as i32 % self.cols, i as i32 / self.cols))
    }

    /// Draws the tile `index` into `dst` at the cell's canvas position
    pub fn render_cell(&self, dst: &mut Image, cell: Point, bg: ColorValue) {
        let rect = self.grid.tile_to_canvas(cell);
        let index = self.tile_at(cell);
        match self.tile_image(index) {
            Some(tile) if index != NOTILE => dst.copy_from(tile, rect.x, rect.y, tile.bounds()),
            _ => dst.fill_rect(rect, bg),
        }
    }

    /// Flattens the tilemap into canvas pixels
    pub fn render(&self, format: PixelFormat, width: i32, height: i32, bg: ColorValue) -> Result<Image, ToolLoopError> {
        let mut out = Image::try_new(format, width, height)?;
        out.clear(bg);
        for row in 0..self.rows {
            for col in 0..self.cols {
                self.render_cell(&mut out, Point::new(col, row), bg);
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayerContent {
    Image(Image),
    Tilemap(Tilemap),
}

/// A unique identifier for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub usize);

impl LayerId {
    /// Creates a new LayerId from an index
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Gets the underlying index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Unique identifier for the layer
    pub id: Uuid,
    /// Display name of the layer
    pub name: String,
    /// Whether the layer is currently visible
    pub visible: bool,
    /// Locked layers refuse new gestures
    pub editable: bool,
    /// Opaque bottom layer; erasing paints the background color
    pub background: bool,
    pub opacity: u8,
    pub blend_mode: BlendMode,
    /// Content of the layer, always canvas-sized at the canvas origin
    pub content: LayerContent,
}

impl Layer {
    pub fn new_image(name: &str, image: Image) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            visible: true,
            editable: true,
            background: false,
            opacity: 255,
            blend_mode: BlendMode::Normal,
            content: LayerContent::Image(image),
        }
    }

    pub fn new_tilemap(name: &str, tilemap: Tilemap) -> Self {
        Self {
            content: LayerContent::Tilemap(tilemap),
            ..Self::new_image(name, Image::from_pixels(PixelFormat::Indexed, 0, 0, Vec::new()))
        }
    }

    pub fn is_transparent(&self) -> bool {
        !self.background
    }

    pub fn is_tilemap(&self) -> bool {
        matches!(self.content, LayerContent::Tilemap(_))
    }

    pub fn tilemap(&self) -> Option<&Tilemap> {
        match &self.content {
            LayerContent::Tilemap(t) => Some(t),
            LayerContent::Image(_) => None,
        }
    }

    pub fn tilemap_mut(&mut self) -> Option<&mut Tilemap> {
        match &mut self.content {
            LayerContent::Tilemap(t) => Some(t),
            LayerContent::Image(_) => None,
        }
    }

    pub fn image(&self) -> Option<&Image> {
        match &self.content {
            LayerContent::Image(img) => Some(img),
            LayerContent::Tilemap(_) => None,
        }
    }

    pub fn image_mut(&mut self) -> Option<&mut Image> {
        match &mut self.content {
            LayerContent::Image(img) => Some(img),
            LayerContent::Tilemap(_) => None,
        }
    }

    /// Canvas pixels of the layer; tilemaps are flattened
    pub fn pixels(&self, format: PixelFormat, width: i32, height: i32, bg: ColorValue) -> Result<Image, ToolLoopError> {
        match &self.content {
            LayerContent::Image(img) => Ok(img.clone()),
            LayerContent::Tilemap(t) => t.render(format, width, height, bg),
        }
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
