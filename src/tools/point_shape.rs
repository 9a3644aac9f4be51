//! Point shapes turn one stroke point into scanlines for the ink.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::brush::{Brush, BrushType};
use crate::color::{graya, graya_geta, graya_getv, rgba, rgba_geta, rgba_getb, rgba_getg, rgba_getr, ColorValue, PixelFormat};
use crate::geometry::floodfill::{floodfill, FloodFillOptions};
use crate::geometry::{Point, Rect};
use crate::stroke::Pt;

use super::dynamics::ColorFromTo;
use super::tool_loop::ToolLoop;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointShape {
    /// A single pixel, whatever the brush
    Pixel,
    #[default]
    Brush,
    FloodFill,
    /// Random brush stamps around the point
    Spray,
}

/// Per-gesture point shape state
#[derive(Debug, Default)]
pub(crate) struct ShapeState {
    first_point: bool,
    use_dynamics: bool,
    dynamic_gradient: bool,
    orig_brush_type: BrushType,
    /// Gradient ends for dynamic colors
    from_color: ColorValue,
    to_color: ColorValue,
    last_gradient: Option<f32>,
    /// Fraction of a spray point carried to the next stamp
    spray_remainder: f32,
}

impl PointShape {
    pub const IDS: [(&'static str, PointShape); 4] = [
        ("pixel", PointShape::Pixel),
        ("brush", PointShape::Brush),
        ("floodfill", PointShape::FloodFill),
        ("spray", PointShape::Spray),
    ];

    pub fn from_id(id: &str) -> Option<PointShape> {
        Self::IDS.iter().find(|(name, _)| *name == id).map(|(_, s)| *s)
    }

    pub fn id(self) -> &'static str {
        Self::IDS
            .iter()
            .find(|(_, s)| *s == self)
            .map(|(name, _)| *name)
            .unwrap_or("brush")
    }

    pub fn is_pixel(self) -> bool {
        self == PointShape::Pixel
    }

    pub fn is_flood_fill(self) -> bool {
        self == PointShape::FloodFill
    }

    pub fn is_spray(self) -> bool {
        self == PointShape::Spray
    }

    /// Runs once per gesture from `prepare_loop`, before any point is
    /// stamped
    pub(crate) fn prepare_point_shape(self, lp: &mut ToolLoop) {
        if !matches!(self, PointShape::Brush | PointShape::Spray) {
            return;
        }
        let dynamics = *lp.dynamics();
        let orig_brush_type = lp.base_brush().kind();
        let (from_color, to_color) = if dynamics.color_from_to == ColorFromTo::FgToBg {
            (lp.primary, lp.secondary)
        } else {
            (lp.secondary, lp.primary)
        };
        let spray_remainder = lp.shape_state.spray_remainder;
        lp.shape_state = ShapeState {
            first_point: true,
            use_dynamics: dynamics.is_dynamic() && orig_brush_type != BrushType::Image,
            dynamic_gradient: dynamics.has_dynamic_gradient(),
            orig_brush_type,
            from_color,
            to_color,
            last_gradient: None,
            spray_remainder,
        };
    }

    /// Stamps the shape at `pt`
    pub(crate) fn transform_point(self, lp: &mut ToolLoop, pt: &Pt) {
        match self {
            PointShape::Pixel => {
                lp.prepare_for_point_shape(true, pt.x, pt.y);
                lp.do_ink_hline(pt.x, pt.y, pt.x);
            }
            PointShape::Brush => stamp_brush(lp, pt),
            PointShape::FloodFill => fill_at(lp, pt.point()),
            PointShape::Spray => spray(lp, pt),
        }
    }

    /// Canvas area a stamp at (x, y) can touch
    pub fn modified_area(self, lp: &ToolLoop, x: i32, y: i32) -> Rect {
        match self {
            PointShape::Pixel => Rect::new(x, y, 1, 1),
            PointShape::Brush => lp.brush().bounds().offset(x, y),
            PointShape::FloodFill => floodfill_bounds(lp, x, y),
            PointShape::Spray => {
                let w = lp.params().spray_width;
                let b = lp.brush().bounds();
                b.offset(x - w, y - w).union(&b.offset(x + w, y + w))
            }
        }
    }
}

fn stamp_brush(lp: &mut ToolLoop, pt: &Pt) {
    if lp.shape_state.use_dynamics {
        apply_dynamics(lp, pt);
    }

    let bounds = lp.brush().bounds();
    let x = pt.x + bounds.x;
    let y = pt.y + bounds.y;
    let first = lp.shape_state.first_point;
    lp.prepare_for_point_shape(first, x, y);

    let scanlines = lp.brush().scanlines();
    for (row, runs) in scanlines.iter().enumerate() {
        for &(a, b) in runs {
            lp.do_ink_hline(x + a, y + row as i32, x + b);
        }
    }
    lp.shape_state.first_point = false;
}

/// Resizes the brush and picks the point's color from the sensors
fn apply_dynamics(lp: &mut ToolLoop, pt: &Pt) {
    let st = &lp.shape_state;
    let orig_type = st.orig_brush_type;
    let gradient_changed = st.dynamic_gradient && st.last_gradient != Some(pt.gradient);

    if st.dynamic_gradient {
        let c = dynamic_color(lp, pt.gradient);
        lp.primary = c;
    }

    let size = pt.size.clamp(Brush::MIN_SIZE, Brush::MAX_SIZE);
    let angle = pt.angle.clamp(-180, 180);
    let brush = lp.brush();
    if brush.size() != size
        || (brush.angle() != angle && orig_type != BrushType::Circle)
        || gradient_changed
    {
        lp.brush = Brush::new(orig_type, size, angle);
        lp.shape_state.last_gradient = Some(pt.gradient);
    }
}

/// Color at `t` between the gradient ends. A fully transparent end only
/// fades the alpha of the other one.
fn dynamic_color(lp: &ToolLoop, t: f32) -> ColorValue {
    let ti = 1.0 - t;
    let (a, b) = (lp.shape_state.from_color, lp.shape_state.to_color);
    let mix = |ca: u8, cb: u8| (ti * ca as f32 + t * cb as f32) as u8;
    let rgba_mix = |a: ColorValue, b: ColorValue| {
        if rgba_geta(a) == 0 {
            rgba(rgba_getr(b), rgba_getg(b), rgba_getb(b), (t * rgba_geta(b) as f32) as u8)
        } else if rgba_geta(b) == 0 {
            rgba(rgba_getr(a), rgba_getg(a), rgba_getb(a), (ti * rgba_geta(a) as f32) as u8)
        } else {
            rgba(
                mix(rgba_getr(a), rgba_getr(b)),
                mix(rgba_getg(a), rgba_getg(b)),
                mix(rgba_getb(a), rgba_getb(b)),
                mix(rgba_geta(a), rgba_geta(b)),
            )
        }
    };

    match lp.format() {
        PixelFormat::Rgb => rgba_mix(a, b),
        PixelFormat::Grayscale => {
            if graya_geta(a) == 0 {
                graya(graya_getv(b), (t * graya_geta(b) as f32) as u8)
            } else if graya_geta(b) == 0 {
                graya(graya_getv(a), (ti * graya_geta(a) as f32) as u8)
            } else {
                graya(mix(graya_getv(a), graya_getv(b)), mix(graya_geta(a), graya_geta(b)))
            }
        }
        PixelFormat::Indexed => {
            let mask = lp.mask_index();
            let to_rgba = |c: ColorValue| {
                if Some(c as usize) == mask {
                    0
                } else {
                    lp.palette().entry(c as usize)
                }
            };
            lp.rgbmap.map_color(rgba_mix(to_rgba(a), to_rgba(b)))
        }
    }
}

fn fill_at(lp: &mut ToolLoop, pt: Point) {
    let canvas = lp.canvas();
    let pt = lp.tiled_mode().wrap_point(pt, canvas);
    lp.prepare_for_point_shape(true, pt.x, pt.y);

    let params = lp.params();
    let options = FloodFillOptions {
        tolerance: params.tolerance,
        contiguous: params.contiguous,
        eight_connected: params.eight_connected,
    };
    let bounds = floodfill_bounds(lp, pt.x, pt.y);
    let mask = lp.use_mask().then(|| lp.mask());
    let src = lp.src();
    let mut spans = Vec::new();
    floodfill(src, mask, pt.x, pt.y, bounds, src.get_pixel(pt.x, pt.y), options, |x1, y, x2| {
        spans.push((x1, y, x2))
    });
    for (x1, y, x2) in spans {
        lp.do_ink_hline(x1, y, x2);
    }
}

/// The canvas, or the grid cell under (x, y) when fills stop at the grid
fn floodfill_bounds(lp: &ToolLoop, x: i32, y: i32) -> Rect {
    let canvas = lp.canvas();
    if lp.params().stop_at_grid {
        let cell = lp.grid().cell_bounds(Point::new(x, y));
        return canvas.intersect(&cell);
    }
    canvas
}

fn spray(lp: &mut ToolLoop, pt: &Pt) {
    lp.prepare_for_point_shape(true, pt.x, pt.y);

    let width = lp.params().spray_width;
    let speed = lp.params().spray_speed;
    let points = (width * width) as f32 / 4.0 * speed as f32 / 100.0 + lp.shape_state.spray_remainder;
    let count = points as i32;
    lp.shape_state.spray_remainder = points - count as f32;

    for _ in 0..count {
        let angle = TAU * lp.next_unit();
        let radius = width as f64 * lp.next_unit();
        let mut pt2 = *pt;
        pt2.x += (radius * angle.cos()) as i32;
        pt2.y += (radius * angle.sin()) as i32;
        stamp_brush(lp, &pt2);
    }
}
