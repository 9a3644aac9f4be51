//! The per-gesture aggregate.
//!
//! A `ToolLoop` is created when a button goes down and dropped when the
//! gesture ends. It owns a snapshot of the active layer (`original`), the
//! image the inks read from (`src`) and the preview image they write to
//! (`dst`). Every strategy keeps its per-gesture state inside the loop, so
//! the strategy values themselves stay plain `Copy` enums.

use std::collections::BTreeSet;
use std::time::Duration;

use log::{debug, warn};
use uuid::Uuid;

use crate::brush::{Brush, BrushType};
use crate::color::{graya_geta, rgba_geta, ColorValue, PixelFormat};
use crate::command::transaction::{CelPatch, MaskPatch, TilePatch, Transaction};
use crate::config::{EditorPreferences, InkType, ToolPreferences};
use crate::document::Document;
use crate::error::{ToolLoopError, ToolLoopResult};
use crate::geometry::{Grid, Point, Rect, Region, TiledMode};
use crate::image::Image;
use crate::layer::{LayerId, Tilemap, NOTILE};
use crate::palette::{Palette, Remap, RgbMap};
use crate::selection::{Mask, SelectionMode};
use crate::stroke::Stroke;

use super::catalog::{FillMode, Tool, ToolButtonConfig};
use super::controller::{Controller, ControllerState};
use super::dynamics::DynamicsOptions;
use super::gradient::{DitheringMatrix, GradientType};
use super::ink::{Ink, InkState, PaintInkType};
use super::intertwine::{Intertwine, IntertwineState};
use super::point_shape::{PointShape, ShapeState};
use super::pointer::Button;
use super::symmetry::Symmetry;
use super::{FreehandAlgorithm, ToolLoopModifiers, TracePolicy};

/// Shading ramp used by the shading ink
#[derive(Debug, Clone, PartialEq)]
pub enum ShadingTable {
    /// Indexed documents: palette index to palette index
    Remap(Remap),
    /// RGB and grayscale documents: an ordered list of shades
    Colors(Vec<ColorValue>),
}

/// Everything a gesture needs to know, captured when it starts. Nothing
/// else is read while the gesture runs.
#[derive(Debug, Clone)]
pub struct ToolLoopParams {
    pub tool_id: String,
    pub config: ToolButtonConfig,
    pub button: Button,
    /// Foreground and background colors in the document's pixel format
    pub fg: ColorValue,
    pub bg: ColorValue,
    pub brush: Brush,
    pub opacity: i32,
    pub tolerance: i32,
    pub contiguous: bool,
    pub eight_connected: bool,
    pub freehand_algorithm: FreehandAlgorithm,
    pub filled: bool,
    pub preview_filled: bool,
    pub spray_width: i32,
    pub spray_speed: i32,
    pub gradient_type: GradientType,
    pub dithering: DitheringMatrix,
    pub shading: Option<ShadingTable>,
    pub modifiers: ToolLoopModifiers,
    pub tiled_mode: TiledMode,
    pub grid: Grid,
    pub snap_to_grid: bool,
    pub stop_at_grid: bool,
    pub symmetry: Option<Symmetry>,
    pub dynamics: DynamicsOptions,
    /// How long to wait for the document lock
    pub lock_wait: Duration,
    /// Bytes the gesture may allocate for its working images
    pub scratch_budget: usize,
    /// Seed for the spray pattern, so replays are deterministic
    pub seed: u64,
}

impl ToolLoopParams {
    pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(100);
    pub const DEFAULT_SCRATCH_BUDGET: usize = 512 * 1024 * 1024;

    pub fn new(tool_id: impl Into<String>, config: ToolButtonConfig, button: Button) -> Self {
        Self {
            tool_id: tool_id.into(),
            filled: config.fill == FillMode::Always,
            config,
            button,
            fg: crate::color::rgba(0, 0, 0, 255),
            bg: crate::color::rgba(255, 255, 255, 255),
            brush: Brush::default(),
            opacity: 255,
            tolerance: 0,
            contiguous: true,
            eight_connected: false,
            freehand_algorithm: FreehandAlgorithm::Default,
            preview_filled: false,
            spray_width: 16,
            spray_speed: 32,
            gradient_type: GradientType::Linear,
            dithering: DitheringMatrix::None,
            shading: None,
            modifiers: ToolLoopModifiers::empty(),
            tiled_mode: TiledMode::None,
            grid: Grid::default(),
            snap_to_grid: false,
            stop_at_grid: false,
            symmetry: None,
            dynamics: DynamicsOptions::default(),
            lock_wait: Self::DEFAULT_LOCK_WAIT,
            scratch_budget: Self::DEFAULT_SCRATCH_BUDGET,
            seed: 0,
        }
    }

    /// Parameters for `tool` with its default options
    pub fn for_tool(tool: &Tool, button: Button) -> Self {
        Self::new(tool.id.clone(), tool.config(button), button)
    }

    /// Snapshots the preferences for a gesture of `tool`
    pub fn from_preferences(
        tool: &Tool,
        button: Button,
        editor: &EditorPreferences,
        prefs: &ToolPreferences,
        fg: ColorValue,
        bg: ColorValue,
        brush: Brush,
    ) -> Self {
        let mut config = tool.config(button);
        if let Ink::Paint(_) | Ink::Shading = config.ink {
            config.ink = match prefs.ink_type {
                InkType::Simple => Ink::Paint(PaintInkType::Simple),
                InkType::AlphaCompositing => Ink::Paint(PaintInkType::AlphaCompositing),
                InkType::Copy => Ink::Paint(PaintInkType::Copy),
                InkType::LockAlpha => Ink::Paint(PaintInkType::LockAlpha),
                InkType::Shading => Ink::Shading,
            };
        }

        let filled = match config.fill {
            FillMode::Always => true,
            FillMode::Optional => prefs.filled,
            FillMode::None => false,
        };

        let mut params = Self::new(tool.id.clone(), config, button);
        params.fg = fg;
        params.bg = bg;
        params.brush = brush;
        params.opacity = prefs.opacity as i32;
        params.tolerance = prefs.tolerance as i32;
        params.contiguous = prefs.contiguous;
        params.eight_connected = prefs.eight_connected;
        params.freehand_algorithm = prefs.freehand_algorithm;
        params.filled = filled;
        params.preview_filled = prefs.preview_filled;
        params.spray_width = prefs.spray_width;
        params.spray_speed = prefs.spray_speed;
        params.gradient_type = prefs.gradient_type;
        params.dithering = prefs.dithering;
        params.tiled_mode = editor.tiled_mode;
        params.grid = editor.grid;
        params.snap_to_grid = editor.snap_to_grid;
        params.stop_at_grid = editor.stop_at_grid;
        params.symmetry = Some(editor.symmetry).filter(|s| s.is_active());
        params.dynamics = editor.dynamics;
        params.lock_wait = Duration::from_millis(editor.lock_wait_ms);
        params.scratch_budget = editor.scratch_budget;
        params
    }
}

/// What a committed gesture changed
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    /// `None` when the gesture changed nothing and no undo step was recorded
    pub transaction_id: Option<Uuid>,
    pub dirty: Rect,
    /// Whether any written pixel was not fully opaque
    pub uses_alpha: bool,
    pub new_selection: bool,
    pub slice: Option<Rect>,
}

/// Canvas pixels of `dst` that already hold valid content for this step
#[derive(Debug)]
struct ValidArea {
    width: i32,
    height: i32,
    bits: Vec<bool>,
}

impl ValidArea {
    fn new(canvas: Rect) -> ToolLoopResult<Self> {
        let len = canvas.area().max(0) as usize;
        let mut bits = Vec::new();
        bits.try_reserve_exact(len)
            .map_err(|_| ToolLoopError::OutOfMemory { bytes: len })?;
        bits.resize(len, false);
        Ok(Self {
            width: canvas.w,
            height: canvas.h,
            bits,
        })
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    fn is_valid(&self, x: i32, y: i32) -> bool {
        self.index(x, y).map(|i| self.bits[i]).unwrap_or(true)
    }

    fn set(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.bits[i] = true;
        }
    }

    fn clear(&mut self) {
        self.bits.fill(false);
    }
}

/// Per-gesture copy of a tilemap layer's tiles. Edits land in `scratch`,
/// addressed by tile index, and are re-rendered into every cell showing
/// the same tile.
#[derive(Debug)]
pub(crate) struct TileContext {
    grid: Grid,
    cols: i32,
    rows: i32,
    map: Vec<u32>,
    original: Vec<Image>,
    scratch: Vec<Image>,
    modified: BTreeSet<u32>,
    /// Tiles reset to their original pixels whose cells still show the
    /// previous trace
    stale: BTreeSet<u32>,
}

impl TileContext {
    fn new(tilemap: &Tilemap) -> ToolLoopResult<Self> {
        let mut map = Vec::with_capacity((tilemap.cols() * tilemap.rows()).max(0) as usize);
        for row in 0..tilemap.rows() {
            for col in 0..tilemap.cols() {
                map.push(tilemap.tile_at(Point::new(col, row)));
            }
        }
        let mut original = Vec::with_capacity(tilemap.tile_count());
        let mut scratch = Vec::with_capacity(tilemap.tile_count());
        for index in 0..tilemap.tile_count() as u32 {
            if let Some(tile) = tilemap.tile_image(index) {
                original.push(copy_image(tile)?);
                scratch.push(copy_image(tile)?);
            }
        }
        Ok(Self {
            grid: tilemap.grid(),
            cols: tilemap.cols(),
            rows: tilemap.rows(),
            map,
            original,
            scratch,
            modified: BTreeSet::new(),
            stale: BTreeSet::new(),
        })
    }

    fn tile_at(&self, cell: Point) -> u32 {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.cols || cell.y >= self.rows {
            return NOTILE;
        }
        self.map[(cell.y * self.cols + cell.x) as usize]
    }

    fn cells_in(&self, rect: Rect) -> Vec<Point> {
        let Some((a, b)) = self.grid.tiles_in(rect) else {
            return Vec::new();
        };
        let mut cells = Vec::new();
        for y in a.y.max(0)..=b.y.min(self.rows - 1) {
            for x in a.x.max(0)..=b.x.min(self.cols - 1) {
                cells.push(Point::new(x, y));
            }
        }
        cells
    }

    fn cells_with_tile(&self, index: u32) -> impl Iterator<Item = Point> + '_ {
        let cols = self.cols.max(1);
        self.map
            .iter()
            .enumerate()
            .filter(move |(_, t)| **t == index)
            .map(move |(i, _)| Point::new(i as i32 % cols, i as i32 / cols))
    }

    fn reset_scratch(&mut self) {
        for &index in &self.modified {
            let i = index as usize;
            if let (Some(orig), Some(tile)) = (self.original.get(i), self.scratch.get_mut(i)) {
                tile.copy_rect(orig, orig.bounds());
            }
        }
        self.stale.extend(self.modified.iter().copied());
    }
}

/// Image of the same format and size with the same pixels, allocated
/// without aborting on failure
fn copy_image(src: &Image) -> ToolLoopResult<Image> {
    let mut out = Image::try_new(src.format(), src.width(), src.height())?;
    out.copy_rect(src, src.bounds());
    Ok(out)
}

#[derive(Debug)]
pub struct ToolLoop {
    params: ToolLoopParams,
    layer: LayerId,
    format: PixelFormat,
    canvas: Rect,
    pub(crate) palette: Palette,
    pub(crate) rgbmap: RgbMap,
    transparent_index: ColorValue,
    layer_transparent: bool,
    layer_background: bool,
    clear_color: ColorValue,
    doc_mask: Mask,
    use_mask: bool,

    original: Image,
    pub(crate) src: Image,
    pub(crate) dst: Image,
    valid: ValidArea,
    tiles: Option<TileContext>,

    brush0: Brush,
    pub(crate) brush: Brush,
    pub(crate) primary: ColorValue,
    pub(crate) secondary: ColorValue,
    opacity: i32,

    ink: Ink,
    controller: Controller,
    intertwine: Intertwine,
    point_shape: PointShape,
    trace_policy: TracePolicy,
    modifiers: ToolLoopModifiers,
    filled: bool,
    preview_filled: bool,

    pub(crate) intertwine_state: IntertwineState,
    pub(crate) shape_state: ShapeState,
    pub(crate) ink_state: InkState,
    pub(crate) controller_state: ControllerState,

    pub(crate) main_stroke: Stroke,
    pub(crate) new_selection: Option<Mask>,
    pub(crate) slice_bounds: Option<Rect>,
    alpha_histogram: [u64; 256],
    /// Scanline buffers reused by every stamp
    span_buf: Vec<(i32, i32, i32)>,
    piece_buf: Vec<Rect>,
    status_text: String,
    speed: Point,
    rng: u64,
}

impl ToolLoop {
    /// Sets up a gesture over the document's active layer. Fails before
    /// allocating anything when the layer can't be drawn on.
    pub fn new(doc: &Document, params: ToolLoopParams) -> ToolLoopResult<Self> {
        let layer_id = doc.active_layer().ok_or(ToolLoopError::NoActiveLayer)?;
        let layer = doc.layer(layer_id).ok_or(ToolLoopError::NoActiveLayer)?;
        if !layer.editable || !layer.visible {
            return Err(ToolLoopError::LayerNotEditable);
        }

        let format = doc.format();
        let canvas = doc.bounds();
        let image_bytes = Image::byte_size(format, canvas.w, canvas.h);
        let tile_bytes = layer
            .tilemap()
            .map(|tm| {
                2 * tm.tile_count() * Image::byte_size(format, tm.grid().tile_w, tm.grid().tile_h)
            })
            .unwrap_or(0);
        let needed = image_bytes.saturating_mul(3).saturating_add(tile_bytes);
        if needed > params.scratch_budget {
            warn!(
                "Gesture needs {} bytes of scratch images, budget is {}",
                needed, params.scratch_budget
            );
            return Err(ToolLoopError::OutOfMemory { bytes: needed });
        }

        let clear_color = doc.clear_color();
        let original = layer.pixels(format, canvas.w, canvas.h, clear_color)?;
        let mut src = Image::try_new(format, canvas.w, canvas.h)?;
        src.copy_rect(&original, canvas);
        let mut dst = Image::try_new(format, canvas.w, canvas.h)?;
        dst.copy_rect(&original, canvas);
        let valid = ValidArea::new(canvas)?;
        let tiles = match layer.tilemap() {
            Some(tm) => Some(TileContext::new(tm)?),
            None => None,
        };

        let (primary, secondary) = match params.button {
            Button::Right => (params.bg, params.fg),
            _ => (params.fg, params.bg),
        };

        let config = params.config;
        let ink = config.ink;
        let controller = config.controller;
        let mut intertwine = config.intertwine;
        let mut trace_policy = config.trace_policy;

        if trace_policy == TracePolicy::Accumulate {
            intertwine = match params.freehand_algorithm {
                FreehandAlgorithm::Default => Intertwine::AsLines,
                FreehandAlgorithm::PixelPerfect => Intertwine::AsPixelPerfect,
                FreehandAlgorithm::Dots => Intertwine::None,
            };
            if params.dynamics.has_dynamic_gradient() && controller.is_freehand() && !ink.is_eraser() {
                trace_policy = TracePolicy::Overlap;
            }
        }

        let mut opacity = params.opacity.clamp(0, 255);
        let image_brush = params.brush.kind() == BrushType::Image;
        if matches!(ink, Ink::Paint(PaintInkType::Simple | PaintInkType::Copy))
            && !image_brush
            && !ink.is_effect()
        {
            opacity = 255;
        }

        let mut modifiers = params.modifiers;
        if ink.is_selection() && !modifiers.intersects(ToolLoopModifiers::SELECTION_MODES) {
            modifiers |= ToolLoopModifiers::REPLACE_SELECTION;
        }

        let doc_mask = doc.mask().clone();
        let use_mask = !doc_mask.is_empty() && !ink.is_selection() && !ink.is_slice();
        let transparent_index = doc.transparent_index();
        let layer_transparent = layer.is_transparent();
        let mask_index = if format == PixelFormat::Indexed && layer_transparent {
            Some(transparent_index as usize)
        } else {
            None
        };
        let palette = doc.palette().clone();
        let rgbmap = RgbMap::new(palette.clone(), mask_index);
        let seed = params.seed ^ 0x9e37_79b9_7f4a_7c15;

        debug!(
            "Tool loop for '{}' on layer {}: {:?} / {:?} / {:?} / {:?}, policy {:?}",
            params.tool_id, layer_id, controller, intertwine, config.point_shape, ink, trace_policy
        );

        Ok(Self {
            layer: layer_id,
            format,
            canvas,
            palette,
            rgbmap,
            transparent_index,
            layer_transparent,
            layer_background: layer.background,
            clear_color,
            doc_mask,
            use_mask,
            original,
            src,
            dst,
            valid,
            tiles,
            brush0: params.brush.clone(),
            brush: params.brush.clone(),
            primary,
            secondary,
            opacity,
            ink,
            controller,
            intertwine,
            point_shape: config.point_shape,
            trace_policy,
            modifiers,
            filled: params.filled,
            preview_filled: params.preview_filled,
            intertwine_state: IntertwineState::default(),
            shape_state: ShapeState::default(),
            ink_state: InkState::default(),
            controller_state: ControllerState::default(),
            main_stroke: Stroke::new(),
            new_selection: None,
            slice_bounds: None,
            alpha_histogram: [0; 256],
            span_buf: Vec::with_capacity(4),
            piece_buf: Vec::with_capacity(4),
            status_text: String::new(),
            speed: Point::default(),
            rng: if seed == 0 { 0x2545_f491_4f6c_dd1d } else { seed },
            params,
        })
    }

    pub fn params(&self) -> &ToolLoopParams {
        &self.params
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn canvas(&self) -> Rect {
        self.canvas
    }

    /// Layer pixels when the gesture started
    pub fn original(&self) -> &Image {
        &self.original
    }

    pub fn src(&self) -> &Image {
        &self.src
    }

    /// The preview image
    pub fn dst(&self) -> &Image {
        &self.dst
    }

    pub fn ink(&self) -> Ink {
        self.ink
    }

    pub fn controller(&self) -> Controller {
        self.controller
    }

    pub fn intertwine(&self) -> Intertwine {
        self.intertwine
    }

    pub fn point_shape(&self) -> PointShape {
        self.point_shape
    }

    /// Trace policy in effect right now. A controller may take over the
    /// policy for part of the gesture.
    pub fn trace_policy(&self) -> TracePolicy {
        self.controller
            .trace_policy_override(&self.controller_state)
            .unwrap_or(self.trace_policy)
    }

    pub fn button(&self) -> Button {
        self.params.button
    }

    pub fn modifiers(&self) -> ToolLoopModifiers {
        self.modifiers
    }

    pub fn set_modifiers(&mut self, modifiers: ToolLoopModifiers) {
        let mut modifiers = modifiers;
        if self.ink.is_selection() && !modifiers.intersects(ToolLoopModifiers::SELECTION_MODES) {
            modifiers |= ToolLoopModifiers::REPLACE_SELECTION;
        }
        self.modifiers = modifiers;
    }

    /// Selection mode picked by the modifiers
    pub fn selection_mode(&self) -> SelectionMode {
        let m = self.modifiers;
        if m.contains(ToolLoopModifiers::INTERSECT_SELECTION) {
            SelectionMode::Intersect
        } else if m.contains(ToolLoopModifiers::SUBTRACT_SELECTION) {
            SelectionMode::Subtract
        } else if m.contains(ToolLoopModifiers::ADD_SELECTION) {
            SelectionMode::Add
        } else {
            SelectionMode::Replace
        }
    }

    pub fn is_filled(&self) -> bool {
        self.filled
    }

    pub fn is_preview_filled(&self) -> bool {
        self.preview_filled
    }

    pub fn primary_color(&self) -> ColorValue {
        self.primary
    }

    pub fn secondary_color(&self) -> ColorValue {
        self.secondary
    }

    pub fn fg_color(&self) -> ColorValue {
        self.params.fg
    }

    pub fn bg_color(&self) -> ColorValue {
        self.params.bg
    }

    pub fn opacity(&self) -> i32 {
        self.opacity
    }

    /// Brush as configured, before dynamics resize it
    pub fn base_brush(&self) -> &Brush {
        &self.brush0
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Palette index excluded from color matching, if the layer has one
    pub fn mask_index(&self) -> Option<usize> {
        if self.format == PixelFormat::Indexed && self.layer_transparent {
            Some(self.transparent_index as usize)
        } else {
            None
        }
    }

    pub fn transparent_index(&self) -> ColorValue {
        self.transparent_index
    }

    pub fn clear_color(&self) -> ColorValue {
        self.clear_color
    }

    pub fn is_transparent_layer(&self) -> bool {
        self.layer_transparent
    }

    pub fn is_background_layer(&self) -> bool {
        self.layer_background
    }

    pub fn is_tilemap(&self) -> bool {
        self.tiles.is_some()
    }

    /// Selection of the document when the gesture started
    pub fn mask(&self) -> &Mask {
        &self.doc_mask
    }

    /// Whether inks are clipped to the selection
    pub fn use_mask(&self) -> bool {
        self.use_mask
    }

    pub fn tiled_mode(&self) -> TiledMode {
        self.params.tiled_mode
    }

    pub fn grid(&self) -> Grid {
        self.params.grid
    }

    pub fn dynamics(&self) -> &DynamicsOptions {
        &self.params.dynamics
    }

    pub fn shading(&self) -> Option<&ShadingTable> {
        self.params.shading.as_ref()
    }

    pub fn speed(&self) -> Point {
        self.speed
    }

    pub fn set_speed(&mut self, speed: Point) {
        self.speed = speed;
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn set_status_text(&mut self, text: String) {
        self.status_text = text;
    }

    /// Selection built by a selection ink at its final step
    pub fn new_selection(&self) -> Option<&Mask> {
        self.new_selection.as_ref()
    }

    pub fn slice_bounds(&self) -> Option<Rect> {
        self.slice_bounds
    }

    pub fn alpha_histogram(&self) -> &[u64; 256] {
        &self.alpha_histogram
    }

    /// Whether any pixel written by the current trace is not fully opaque
    pub fn uses_alpha(&self) -> bool {
        self.alpha_histogram[..255].iter().any(|n| *n > 0)
    }

    /// xorshift64*, seeded from the parameters
    pub(crate) fn next_random(&mut self) -> u64 {
        let mut x = self.rng;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng = x;
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    /// Random number in 0.0..1.0
    pub(crate) fn next_unit(&mut self) -> f64 {
        (self.next_random() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Counts the alpha of a pixel written into `dst`
    pub(crate) fn record_alpha(&mut self, c: ColorValue) {
        let a = match self.format {
            PixelFormat::Rgb => rgba_geta(c),
            PixelFormat::Grayscale => graya_geta(c),
            PixelFormat::Indexed => {
                if self.layer_transparent && c == self.transparent_index {
                    0
                } else {
                    255
                }
            }
        };
        self.alpha_histogram[a as usize] += 1;
    }

    /// Entry point of every point shape: one scanline, mirrored by the
    /// symmetry and split at the canvas edges in tiled mode.
    pub(crate) fn do_ink_hline(&mut self, x1: i32, y: i32, x2: i32) {
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let mut spans = std::mem::take(&mut self.span_buf);
        let mut pieces = std::mem::take(&mut self.piece_buf);
        match self.params.symmetry {
            Some(sym) if sym.is_active() => sym.hline_spans_into(x1, y, x2, &mut spans),
            _ => {
                spans.clear();
                spans.push((x1, y, x2));
            }
        }
        let tiled = self.params.tiled_mode;
        let canvas = self.canvas;
        let ink = self.ink;
        for &(sx1, sy, sx2) in &spans {
            tiled.wrap_rect_into(Rect::new(sx1, sy, sx2 - sx1 + 1, 1), canvas, &mut pieces);
            for piece in &pieces {
                if !piece.is_empty() {
                    ink.ink_hline(self, piece.x, piece.y, piece.x2() - 1);
                }
            }
        }
        self.span_buf = spans;
        self.piece_buf = pieces;
    }

    /// Copies `src` into `dst` where `dst` isn't valid yet
    pub(crate) fn validate_dst(&mut self, region: &Region) {
        for rect in region.rects() {
            let r = rect.intersect(&self.canvas);
            for y in r.y..r.y2() {
                for x in r.x..r.x2() {
                    if self.valid.is_valid(x, y) {
                        continue;
                    }
                    let c = self.baseline_pixel(x, y);
                    self.dst.put_pixel(x, y, c);
                    self.valid.set(x, y);
                }
            }
        }
    }

    /// Pixel a fresh step starts from. Tile cells show the gesture's
    /// working copy of their tile.
    fn baseline_pixel(&self, x: i32, y: i32) -> ColorValue {
        if let Some(tiles) = &self.tiles {
            let cell = tiles.grid.canvas_to_tile(Point::new(x, y));
            let t = tiles.tile_at(cell);
            if t != NOTILE {
                if let Some(tile) = tiles.scratch.get(t as usize) {
                    let origin = tiles.grid.tile_to_canvas(cell).origin();
                    return tile.get_pixel(x - origin.x, y - origin.y);
                }
            }
        }
        self.src.get_pixel(x, y)
    }

    /// Forgets every valid pixel; the next validation restarts from `src`.
    /// Alpha counts of the discarded trace go with it.
    pub(crate) fn invalidate_dst(&mut self) {
        self.valid.clear();
        self.alpha_histogram = [0; 256];
        if let Some(tiles) = &mut self.tiles {
            tiles.reset_scratch();
        }
    }

    /// Makes the current trace the source of the next one
    pub(crate) fn copy_valid_dst_to_src(&mut self, region: &Region) {
        for rect in region.rects() {
            let r = rect.intersect(&self.canvas);
            for y in r.y..r.y2() {
                for x in r.x..r.x2() {
                    if self.valid.is_valid(x, y) {
                        self.src.put_pixel(x, y, self.dst.get_pixel(x, y));
                    }
                }
            }
        }
    }

    /// Propagates edits made in `dst` over `region` into the working tiles
    /// and re-renders every cell sharing a changed tile. Returns the
    /// extra canvas area that changed.
    pub(crate) fn validate_dst_tileset(&mut self, region: &Region) -> Region {
        if self.ink.is_selection() || self.ink.is_slice() {
            return Region::new();
        }
        self.sync_tiles(region)
    }

    pub(crate) fn sync_tiles(&mut self, region: &Region) -> Region {
        let mut extra = Region::new();
        let Some(tiles) = &mut self.tiles else {
            return extra;
        };

        let mut changed = BTreeSet::new();
        for rect in region.rects() {
            let r = rect.intersect(&self.canvas);
            for cell in tiles.cells_in(r) {
                let cell_rect = tiles.grid.tile_to_canvas(cell);
                let t = tiles.tile_at(cell);
                if t == NOTILE {
                    // Empty cells can't hold pixels
                    let area = cell_rect.intersect(&r);
                    self.dst.copy_rect(&self.src, area);
                    continue;
                }
                let Some(tile) = tiles.scratch.get_mut(t as usize) else {
                    continue;
                };
                let area = cell_rect.intersect(&r);
                for y in area.y..area.y2() {
                    for x in area.x..area.x2() {
                        let (tx, ty) = (x - cell_rect.x, y - cell_rect.y);
                        let c = self.dst.get_pixel(x, y);
                        if tile.get_pixel(tx, ty) != c {
                            tile.put_pixel(tx, ty, c);
                            changed.insert(t);
                        }
                    }
                }
            }
        }

        tiles.modified.extend(changed.iter().copied());
        let stale = std::mem::take(&mut tiles.stale);
        for &t in changed.union(&stale) {
            let Some(tile) = tiles.scratch.get(t as usize) else {
                continue;
            };
            for cell in tiles.cells_with_tile(t) {
                let cell_rect = tiles.grid.tile_to_canvas(cell);
                self.dst.copy_from(tile, cell_rect.x, cell_rect.y, tile.bounds());
                let visible = cell_rect.intersect(&self.canvas);
                for y in visible.y..visible.y2() {
                    for x in visible.x..visible.x2() {
                        self.valid.set(x, y);
                    }
                }
                extra.add_rect(visible);
            }
        }
        extra
    }

    /// Undo transaction describing everything the gesture changed
    pub fn build_transaction(&self, id: Uuid, label: &str) -> ToolLoopResult<Transaction> {
        let mut tx = Transaction::new(id, label, self.layer);

        if self.ink.is_selection() {
            if let Some(mask) = &self.new_selection {
                if *mask != self.doc_mask {
                    tx.mask = Some(MaskPatch {
                        before: self.doc_mask.clone(),
                        after: mask.clone(),
                    });
                    tx.dirty.add_rect(self.doc_mask.bounds().union(&mask.bounds()));
                }
            }
            return Ok(tx);
        }

        if self.ink.is_slice() {
            if let Some(rect) = self.slice_bounds.filter(|r| !r.is_empty()) {
                tx.slice = Some(rect);
                tx.dirty.add_rect(rect);
            }
            return Ok(tx);
        }

        match &self.tiles {
            Some(tiles) => {
                for &t in &tiles.modified {
                    let i = t as usize;
                    let (Some(before), Some(after)) = (tiles.original.get(i), tiles.scratch.get(i)) else {
                        continue;
                    };
                    if before == after {
                        continue;
                    }
                    for cell in tiles.cells_with_tile(t) {
                        tx.dirty.add_rect(tiles.grid.tile_to_canvas(cell).intersect(&self.canvas));
                    }
                    tx.tiles.push(TilePatch {
                        index: t,
                        before: copy_image(before)?,
                        after: copy_image(after)?,
                    });
                }
            }
            None => {
                let bounds = self.original.diff_bounds(&self.dst);
                if !bounds.is_empty() {
                    tx.cel = Some(CelPatch {
                        bounds,
                        before: self.original.crop(bounds, self.clear_color)?,
                        after: self.dst.crop(bounds, self.clear_color)?,
                    });
                    tx.dirty.add_rect(bounds);
                }
            }
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::rgba;
    use crate::tools::catalog::ToolButtonConfig;

    fn pencil() -> ToolButtonConfig {
        ToolButtonConfig {
            ink: Ink::Paint(PaintInkType::Simple),
            controller: Controller::Freehand,
            point_shape: PointShape::Brush,
            intertwine: Intertwine::AsLines,
            trace_policy: TracePolicy::Accumulate,
            fill: FillMode::None,
        }
    }

    fn rgb_doc() -> Document {
        let mut doc = Document::new(PixelFormat::Rgb, 8, 8);
        doc.add_layer("Layer 1").unwrap();
        doc
    }

    #[test]
    fn test_refuses_hidden_layer() {
        let mut doc = rgb_doc();
        let id = doc.active_layer().unwrap();
        doc.layer_mut(id).unwrap().visible = false;
        let err = ToolLoop::new(&doc, ToolLoopParams::new("pencil", pencil(), Button::Left)).unwrap_err();
        assert_eq!(err, ToolLoopError::LayerNotEditable);
    }

    #[test]
    fn test_budget_exceeded_is_out_of_memory() {
        let doc = rgb_doc();
        let mut params = ToolLoopParams::new("pencil", pencil(), Button::Left);
        params.scratch_budget = 16;
        assert!(matches!(
            ToolLoop::new(&doc, params),
            Err(ToolLoopError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_right_button_swaps_colors() {
        let doc = rgb_doc();
        let mut params = ToolLoopParams::new("pencil", pencil(), Button::Right);
        params.fg = rgba(255, 0, 0, 255);
        params.bg = rgba(0, 0, 255, 255);
        let lp = ToolLoop::new(&doc, params).unwrap();
        assert_eq!(lp.primary_color(), rgba(0, 0, 255, 255));
        assert_eq!(lp.secondary_color(), rgba(255, 0, 0, 255));
    }

    #[test]
    fn test_freehand_algorithm_picks_intertwine() {
        let doc = rgb_doc();
        let mut params = ToolLoopParams::new("pencil", pencil(), Button::Left);
        params.freehand_algorithm = FreehandAlgorithm::PixelPerfect;
        let lp = ToolLoop::new(&doc, params).unwrap();
        assert_eq!(lp.intertwine(), Intertwine::AsPixelPerfect);
    }

    #[test]
    fn test_histogram_flags_alpha() {
        let doc = rgb_doc();
        let mut lp = ToolLoop::new(&doc, ToolLoopParams::new("pencil", pencil(), Button::Left)).unwrap();
        lp.record_alpha(rgba(1, 2, 3, 255));
        assert!(!lp.uses_alpha());
        lp.record_alpha(rgba(1, 2, 3, 128));
        assert!(lp.uses_alpha());

        // A redrawn trace starts counting again
        lp.invalidate_dst();
        assert!(!lp.uses_alpha());
    }

    #[test]
    fn test_random_is_deterministic() {
        let doc = rgb_doc();
        let mut a = ToolLoop::new(&doc, ToolLoopParams::new("spray", pencil(), Button::Left)).unwrap();
        let mut b = ToolLoop::new(&doc, ToolLoopParams::new("spray", pencil(), Button::Left)).unwrap();
        let xs: Vec<u64> = (0..4).map(|_| a.next_random()).collect();
        let ys: Vec<u64> = (0..4).map(|_| b.next_random()).collect();
        assert_eq!(xs, ys);
        assert!((0.0..1.0).contains(&a.next_unit()));
    }
}
