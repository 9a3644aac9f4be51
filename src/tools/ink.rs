//! Inks decide how the pixels of a point shape combine with the layer.
//!
//! `prepare_ink` runs once per gesture and picks the pixel routine (see
//! [`InkProcessing`]); `ink_hline` then receives every scanline the point
//! shapes produce.

use serde::{Deserialize, Serialize};

use crate::brush::BrushType;
use crate::color::{graya_geta, graya_getv, rgba, rgba_geta, PixelFormat};
use crate::error::ToolLoopResult;
use crate::geometry::{Point, Rect};
use crate::image::Image;
use crate::selection::{Mask, SelectionMode};
use crate::stroke::Stroke;

use super::gradient::render_rgba_gradient;
use super::ink_processing::InkProcessing;
use super::tool_loop::ToolLoop;

/// Paint ink variants picked in the tool options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintInkType {
    /// Opaque colors are copied, translucent ones composited
    #[default]
    Simple,
    AlphaCompositing,
    Copy,
    LockAlpha,
    /// Always paints the foreground color, whatever the button
    WithFg,
    /// Always paints the background color, whatever the button
    WithBg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EraserInkType {
    #[default]
    Eraser,
    ReplaceFgWithBg,
    ReplaceBgWithFg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ink {
    Paint(PaintInkType),
    Shading,
    Gradient,
    Blur,
    Jumble,
    Eraser(EraserInkType),
    Selection,
    Slice,
}

impl Default for Ink {
    fn default() -> Self {
        Ink::Paint(PaintInkType::Simple)
    }
}

/// Per-gesture ink state
#[derive(Debug, Default)]
pub(crate) struct InkState {
    pub(crate) processing: InkProcessing,
    /// Set between the two `set_final_step` calls
    final_step: bool,
    max_bounds: Rect,
    mask: Mask,
    intersect_mask: Mask,
    /// Rendered gradient, canvas sized
    pub(crate) gradient: Option<Image>,
    /// Canvas position image brush pixels are aligned to
    pub(crate) brush_origin: Point,
}

impl Ink {
    pub const IDS: [(&'static str, Ink); 15] = [
        ("paint", Ink::Paint(PaintInkType::Simple)),
        ("paint_alpha_compositing", Ink::Paint(PaintInkType::AlphaCompositing)),
        ("paint_copy", Ink::Paint(PaintInkType::Copy)),
        ("paint_lock_alpha", Ink::Paint(PaintInkType::LockAlpha)),
        ("paint_fg", Ink::Paint(PaintInkType::WithFg)),
        ("paint_bg", Ink::Paint(PaintInkType::WithBg)),
        ("shading", Ink::Shading),
        ("gradient", Ink::Gradient),
        ("blur", Ink::Blur),
        ("jumble", Ink::Jumble),
        ("eraser", Ink::Eraser(EraserInkType::Eraser)),
        ("replace_fg_with_bg", Ink::Eraser(EraserInkType::ReplaceFgWithBg)),
        ("replace_bg_with_fg", Ink::Eraser(EraserInkType::ReplaceBgWithFg)),
        ("selection", Ink::Selection),
        ("slice", Ink::Slice),
    ];

    pub fn from_id(id: &str) -> Option<Ink> {
        Self::IDS.iter().find(|(name, _)| *name == id).map(|(_, ink)| *ink)
    }

    pub fn id(self) -> &'static str {
        Self::IDS
            .iter()
            .find(|(_, ink)| *ink == self)
            .map(|(name, _)| *name)
            .unwrap_or("paint")
    }

    /// Modifies pixels of the layer
    pub fn is_paint(self) -> bool {
        !matches!(self, Ink::Selection | Ink::Slice)
    }

    /// Computes its own colors instead of painting the primary one
    pub fn is_effect(self) -> bool {
        matches!(
            self,
            Ink::Shading | Ink::Gradient | Ink::Blur | Ink::Jumble | Ink::Eraser(_)
        )
    }

    pub fn is_eraser(self) -> bool {
        matches!(self, Ink::Eraser(_))
    }

    pub fn is_selection(self) -> bool {
        self == Ink::Selection
    }

    pub fn is_slice(self) -> bool {
        self == Ink::Slice
    }

    pub fn is_shading(self) -> bool {
        self == Ink::Shading
    }

    pub fn is_gradient(self) -> bool {
        self == Ink::Gradient
    }

    /// Picks the pixel routine and fixes the working colors
    pub(crate) fn prepare_ink(self, lp: &mut ToolLoop) -> ToolLoopResult<()> {
        let image_brush = lp.brush().kind() == BrushType::Image;
        let processing = match self {
            Ink::Paint(kind) => {
                if let PaintInkType::WithFg | PaintInkType::WithBg = kind {
                    let c = if kind == PaintInkType::WithFg {
                        lp.fg_color()
                    } else {
                        lp.bg_color()
                    };
                    lp.primary = c;
                    lp.secondary = c;
                }
                paint_processing(lp, kind, image_brush)
            }
            Ink::Shading => {
                if lp.shading().is_some() {
                    if image_brush {
                        InkProcessing::BrushShading
                    } else {
                        InkProcessing::Shading
                    }
                } else {
                    paint_processing(lp, PaintInkType::Simple, image_brush)
                }
            }
            Ink::Gradient => {
                let canvas = lp.canvas();
                let mut tmp = Image::try_new(PixelFormat::Rgb, canvas.w, canvas.h)?;
                tmp.clear(0);
                lp.ink_state.gradient = Some(tmp);
                InkProcessing::Gradient
            }
            Ink::Blur => InkProcessing::Blur,
            Ink::Jumble => InkProcessing::Jumble,
            Ink::Eraser(EraserInkType::Eraser) => {
                if image_brush {
                    InkProcessing::BrushEraser
                } else {
                    let clear = if lp.is_background_layer() {
                        lp.bg_color()
                    } else {
                        lp.clear_color()
                    };
                    lp.primary = clear;
                    lp.secondary = clear;
                    if lp.opacity() == 255 {
                        InkProcessing::Copy
                    } else if lp.is_background_layer() {
                        InkProcessing::Transparent
                    } else {
                        InkProcessing::Merge
                    }
                }
            }
            Ink::Eraser(EraserInkType::ReplaceFgWithBg) => {
                lp.primary = lp.fg_color();
                lp.secondary = lp.bg_color();
                InkProcessing::Replace
            }
            Ink::Eraser(EraserInkType::ReplaceBgWithFg) => {
                lp.primary = lp.bg_color();
                lp.secondary = lp.fg_color();
                InkProcessing::Replace
            }
            Ink::Selection | Ink::Slice => InkProcessing::Xor,
        };
        lp.ink_state.processing = processing;
        Ok(())
    }

    /// Runs once per loop step before any scanline
    pub(crate) fn prepare_for_strokes(self, lp: &mut ToolLoop, main_stroke: &Stroke) {
        if self != Ink::Gradient {
            return;
        }
        let (c0, c1) = match lp.format() {
            PixelFormat::Rgb => (lp.primary, lp.secondary),
            PixelFormat::Grayscale => {
                let to_rgba = |c| {
                    let v = graya_getv(c);
                    rgba(v, v, v, graya_geta(c))
                };
                (to_rgba(lp.primary), to_rgba(lp.secondary))
            }
            PixelFormat::Indexed => (
                lp.palette().entry(lp.primary as usize),
                lp.palette().entry(lp.secondary as usize),
            ),
        };

        let tiled = lp.tiled_mode();
        let canvas = lp.canvas();
        let matrix = lp.params().dithering;
        let kind = lp.params().gradient_type;
        let Some(tmp) = lp.ink_state.gradient.as_mut() else {
            return;
        };
        let (Some(u), Some(v)) = (main_stroke.first_point(), main_stroke.last_point()) else {
            tmp.clear(0);
            return;
        };
        if main_stroke.len() < 2 {
            tmp.clear(0);
            return;
        }

        // The gradient is anchored to the canvas copy where it starts
        let mut img_pos = Point::default();
        if tiled.wraps_x() && canvas.w > 0 {
            img_pos.x = u.x.div_euclid(canvas.w) * canvas.w;
        }
        if tiled.wraps_y() && canvas.h > 0 {
            img_pos.y = u.y.div_euclid(canvas.h) * canvas.h;
        }
        render_rgba_gradient(tmp, img_pos, u.point(), v.point(), c0, c1, matrix, kind);
    }

    /// Composites one scanline, already clipped to the canvas
    pub(crate) fn ink_hline(self, lp: &mut ToolLoop, x1: i32, y: i32, x2: i32) {
        match self {
            Ink::Selection => selection_hline(lp, x1, y, x2),
            Ink::Slice => slice_hline(lp, x1, y, x2),
            _ => lp.process_scanline(x1, y, x2),
        }
    }

    /// Called with `true` before the last pass of the gesture and with
    /// `false` after it
    pub(crate) fn set_final_step(self, lp: &mut ToolLoop, state: bool) {
        match self {
            Ink::Selection => {
                let mode = lp.selection_mode();
                if state {
                    let doc_mask = lp.mask().clone();
                    let st = &mut lp.ink_state;
                    st.final_step = true;
                    st.max_bounds = doc_mask.bounds();
                    st.mask = if mode == SelectionMode::Replace {
                        Mask::new()
                    } else {
                        doc_mask
                    };
                    st.intersect_mask = Mask::new();
                } else {
                    let st = &mut lp.ink_state;
                    st.final_step = false;
                    let mut mask = std::mem::take(&mut st.mask);
                    if mode == SelectionMode::Intersect {
                        mask.intersect(&st.intersect_mask);
                    }
                    mask.intersect(&Mask::from_rect(st.max_bounds));
                    lp.new_selection = Some(mask);
                }
            }
            Ink::Slice => {
                let canvas = lp.dst().bounds();
                let st = &mut lp.ink_state;
                st.final_step = state;
                if state {
                    st.max_bounds = Rect::default();
                } else {
                    let bounds = st.max_bounds.intersect(&canvas);
                    lp.slice_bounds = (!bounds.is_empty()).then_some(bounds);
                }
            }
            _ => {}
        }
    }
}

fn paint_processing(lp: &ToolLoop, kind: PaintInkType, image_brush: bool) -> InkProcessing {
    if image_brush {
        return match kind {
            PaintInkType::LockAlpha => InkProcessing::BrushLockAlpha,
            PaintInkType::Copy => InkProcessing::BrushCopy,
            _ => InkProcessing::BrushSimple,
        };
    }
    match kind {
        PaintInkType::Copy => InkProcessing::Copy,
        PaintInkType::LockAlpha => InkProcessing::LockAlpha,
        PaintInkType::WithFg | PaintInkType::WithBg => InkProcessing::Transparent,
        PaintInkType::Simple | PaintInkType::AlphaCompositing => {
            let static_color = !lp.dynamics().has_dynamic_gradient();
            let opaque = lp.opacity() == 255
                && static_color
                && match lp.format() {
                    PixelFormat::Rgb => rgba_geta(lp.primary) == 255,
                    PixelFormat::Grayscale => graya_geta(lp.primary) == 255,
                    PixelFormat::Indexed => {
                        kind != PaintInkType::AlphaCompositing
                            || (lp.mask_index() != Some(lp.primary as usize)
                                && rgba_geta(lp.palette().entry(lp.primary as usize)) == 255)
                    }
                };
            if opaque {
                InkProcessing::Copy
            } else {
                InkProcessing::Transparent
            }
        }
    }
}

fn selection_hline(lp: &mut ToolLoop, x1: i32, y: i32, x2: i32) {
    let rc = Rect::new(x1, y, x2 - x1 + 1, 1);
    if lp.ink_state.final_step {
        let mode = lp.selection_mode();
        let st = &mut lp.ink_state;
        match mode {
            SelectionMode::Replace | SelectionMode::Add => st.mask.add_rect(rc),
            SelectionMode::Subtract => st.mask.subtract_rect(rc),
            SelectionMode::Intersect => st.intersect_mask.add_rect(rc),
        }
        st.max_bounds = st.max_bounds.union(&rc);
    } else {
        let rc = rc.intersect(&lp.dst().bounds());
        if !rc.is_empty() {
            lp.process_scanline(rc.x, rc.y, rc.x2() - 1);
        }
    }
}

fn slice_hline(lp: &mut ToolLoop, x1: i32, y: i32, x2: i32) {
    let rc = Rect::new(x1, y, x2 - x1 + 1, 1);
    if lp.ink_state.final_step {
        lp.ink_state.max_bounds = lp.ink_state.max_bounds.union(&rc);
    } else {
        let rc = rc.intersect(&lp.dst().bounds());
        if !rc.is_empty() {
            lp.process_scanline(rc.x, rc.y, rc.x2() - 1);
        }
    }
}
