//! Intertwines walk the stroke and decide where the point shape is
//! stamped: every point, lines between points, shape outlines, curves.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::brush::BrushType;
use crate::geometry::{algo, Point, Rect, Region};
use crate::image::Image;
use crate::stroke::{Pt, Stroke};

use super::dynamics::DynamicSensor;
use super::tool_loop::ToolLoop;
use super::{ToolLoopModifiers, TracePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intertwine {
    /// Stamps every stroke point, unconnected
    None,
    /// Stamps only the first point (or the center with from-center)
    FirstPoint,
    #[default]
    AsLines,
    AsRectangles,
    AsEllipses,
    AsBezier,
    /// Lines without the doubled pixels of L-shaped corners
    AsPixelPerfect,
}

/// Destination pixels under the last stamped point, kept so the stamp
/// can be taken back
#[derive(Debug)]
struct SavedArea {
    image: Image,
    pos: Pt,
    rect: Rect,
}

/// Per-gesture intertwine state
#[derive(Debug, Default)]
pub(crate) struct IntertwineState {
    /// A previous step ran with the `Last` policy (Shift+click line)
    retained_last: bool,
    first_stroke: bool,
    /// Pixel-perfect point buffer
    pts: Stroke,
    save_area: bool,
    saved_areas: Vec<SavedArea>,
    last_pti: usize,
    restored: Region,
}

/// Line rasterizer picked for a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineAlgo {
    Perfect,
    PerfectWithFix,
    Continuous,
    ContinuousWithFix,
}

impl LineAlgo {
    fn run(self, a: Point, b: Point, proc: impl FnMut(i32, i32)) {
        match self {
            LineAlgo::Perfect => algo::line_perfect(a.x, a.y, b.x, b.y, proc),
            LineAlgo::PerfectWithFix => algo::line_perfect_with_fix_for_line_brush(a.x, a.y, b.x, b.y, proc),
            LineAlgo::Continuous => algo::line_continuous(a.x, a.y, b.x, b.y, proc),
            LineAlgo::ContinuousWithFix => {
                algo::line_continuous_with_fix_for_line_brush(a.x, a.y, b.x, b.y, proc)
            }
        }
    }
}

/// Interpolates size, angle and gradient along a segment
struct LineData {
    a: Pt,
    b: Pt,
    step: i32,
    steps: i32,
}

impl LineData {
    fn new(a: Pt, b: Pt) -> Self {
        Self {
            a,
            b,
            step: 0,
            steps: (b.x - a.x).abs().max((b.y - a.y).abs()),
        }
    }

    fn next(&mut self, x: i32, y: i32) -> Pt {
        let t = if self.steps > 0 {
            self.step as f32 / self.steps as f32
        } else {
            0.0
        };
        self.step += 1;
        let (a, b) = (self.a, self.b);
        Pt {
            x,
            y,
            size: a.size + (t * (b.size - a.size) as f32) as i32,
            angle: a.angle + (t * (b.angle - a.angle) as f32) as i32,
            gradient: a.gradient + t * (b.gradient - a.gradient),
        }
    }
}

impl Intertwine {
    pub const IDS: [(&'static str, Intertwine); 7] = [
        ("none", Intertwine::None),
        ("first_point", Intertwine::FirstPoint),
        ("as_lines", Intertwine::AsLines),
        ("as_rectangles", Intertwine::AsRectangles),
        ("as_ellipses", Intertwine::AsEllipses),
        ("as_bezier", Intertwine::AsBezier),
        ("as_pixel_perfect", Intertwine::AsPixelPerfect),
    ];

    pub fn from_id(id: &str) -> Option<Intertwine> {
        Self::IDS.iter().find(|(name, _)| *name == id).map(|(_, i)| *i)
    }

    pub fn id(self) -> &'static str {
        Self::IDS
            .iter()
            .find(|(_, i)| *i == self)
            .map(|(name, _)| *name)
            .unwrap_or("as_lines")
    }

    /// Square-aspect snaps the angle of the line instead of the shape
    pub fn snaps_by_angle(self) -> bool {
        matches!(
            self,
            Intertwine::FirstPoint | Intertwine::AsLines | Intertwine::AsPixelPerfect
        )
    }

    pub(crate) fn prepare_intertwine(self, lp: &mut ToolLoop) {
        lp.intertwine_state = IntertwineState {
            first_stroke: true,
            ..IntertwineState::default()
        };
    }

    /// Stamps the outline of `stroke`
    pub(crate) fn join_stroke(self, lp: &mut ToolLoop, stroke: &Stroke) {
        match self {
            Intertwine::None => {
                for pt in stroke {
                    do_transform_point(lp, pt);
                }
            }
            Intertwine::FirstPoint => join_first_point(lp, stroke),
            Intertwine::AsLines => join_lines(lp, stroke),
            Intertwine::AsRectangles => join_rectangles(lp, stroke),
            Intertwine::AsEllipses => join_ellipses(lp, stroke),
            Intertwine::AsBezier => join_bezier(lp, stroke),
            Intertwine::AsPixelPerfect => join_pixel_perfect(lp, stroke),
        }
    }

    /// Stamps the interior of `stroke`
    pub(crate) fn fill_stroke(self, lp: &mut ToolLoop, stroke: &Stroke) {
        match self {
            Intertwine::None | Intertwine::FirstPoint | Intertwine::AsBezier => {
                self.join_stroke(lp, stroke)
            }
            Intertwine::AsLines => {
                algo::polygon(&stroke.to_points(), |x1, y, x2| do_hline(lp, x1, y, x2));
            }
            Intertwine::AsRectangles => fill_rectangles(lp, stroke),
            Intertwine::AsEllipses => fill_ellipses(lp, stroke),
            Intertwine::AsPixelPerfect => {
                if stroke.is_empty() {
                    return;
                }
                let pts = lp.intertwine_state.pts.to_points();
                algo::polygon(&pts, |x1, y, x2| do_hline(lp, x1, y, x2));
            }
        }
    }

    /// Canvas pixels the shapes of `stroke` are centered on
    pub fn stroke_bounds(self, lp: &ToolLoop, stroke: &Stroke) -> Rect {
        let angle = lp.controller().shape_angle(&lp.controller_state);
        match self {
            Intertwine::AsRectangles => rectangles_bounds(stroke, angle),
            Intertwine::AsEllipses => ellipses_bounds(stroke, angle),
            _ => stroke.bounds(),
        }
    }

    /// Area restored by the last retracted pixel-perfect stamp
    pub(crate) fn take_restored_region(self, lp: &mut ToolLoop) -> Region {
        std::mem::take(&mut lp.intertwine_state.restored)
    }
}

fn do_transform_point(lp: &mut ToolLoop, pt: &Pt) {
    if lp.intertwine_state.save_area {
        save_stroke_pt_area(lp, pt);
    }
    let shape = lp.point_shape();
    shape.transform_point(lp, pt);

    // Later stamps must see tiles edited by earlier ones
    if lp.intertwine() == Intertwine::AsPixelPerfect && lp.is_tilemap() {
        let area = shape.modified_area(lp, pt.x, pt.y);
        lp.sync_tiles(&Region::from_rect(area));
    }
}

/// Stamps (x, y) with the brush as configured
fn do_point(lp: &mut ToolLoop, x: i32, y: i32) {
    let brush = lp.brush();
    let pt = Pt {
        size: brush.size(),
        angle: brush.angle(),
        ..Pt::new(x, y)
    };
    do_transform_point(lp, &pt);
}

fn do_hline(lp: &mut ToolLoop, x1: i32, y: i32, x2: i32) {
    algo::line_perfect(x1, y, x2, y, |x, y| do_point(lp, x, y));
}

fn do_line(lp: &mut ToolLoop, a: Pt, b: Pt) {
    let line_algo = line_algo(lp, &a, &b);
    let mut data = LineData::new(a, b);
    line_algo.run(a.point(), b.point(), |x, y| {
        let pt = data.next(x, y);
        do_transform_point(lp, &pt);
    });
}

fn do_line_without_dynamics(lp: &mut ToolLoop, x1: i32, y1: i32, x2: i32, y2: i32) {
    let brush = lp.brush();
    let (size, angle) = (brush.size(), brush.angle());
    let a = Pt { size, angle, ..Pt::new(x1, y1) };
    let b = Pt { size, angle, ..Pt::new(x2, y2) };
    do_line(lp, a, b);
}

/// Continuous lines follow the pointer; snapped lines use the perfect
/// algorithm so they match the grid
fn line_algo(lp: &ToolLoop, a: &Pt, b: &Pt) -> LineAlgo {
    let mut needs_fix = false;
    if lp.brush().kind() == BrushType::Line && (a.size > 1 || b.size > 1) {
        if (a.angle != 0 || b.angle != 0) && a.angle != b.angle {
            needs_fix = true;
        } else {
            let angle = a.angle;
            let p = (b.x - a.x).signum() * (b.y - a.y).signum();
            needs_fix = ((angle > 0 && angle < 90) || (angle > -180 && angle < -90)) && p > 0
                || ((angle > 90 && angle < 180) || (angle > -90 && angle < 0)) && p < 0;
        }
    }

    let snapped = lp.modifiers().contains(ToolLoopModifiers::SQUARE_ASPECT)
        || (lp.controller().can_snap_to_grid() && lp.params().snap_to_grid);
    match (snapped, needs_fix) {
        (true, false) => LineAlgo::Perfect,
        (true, true) => LineAlgo::PerfectWithFix,
        (false, false) => LineAlgo::Continuous,
        (false, true) => LineAlgo::ContinuousWithFix,
    }
}

/// Pixels of the segments of `stroke`, each shared end emitted once
fn line_points(lp: &ToolLoop, stroke: &Stroke, out: &mut Stroke) {
    for seg in stroke.points().windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let mut data = LineData::new(a, b);
        line_algo(lp, &a, &b).run(a.point(), b.point(), |x, y| {
            let pt = data.next(x, y);
            if out.last_point() != Some(pt) {
                out.add_point(pt);
            }
        });
    }
}

fn join_first_point(lp: &mut ToolLoop, stroke: &Stroke) {
    let Some(first) = stroke.first_point() else {
        return;
    };
    let mid = if lp.controller().is_two_points() && lp.modifiers().contains(ToolLoopModifiers::FROM_CENTER) {
        let n = stroke.len() as i32;
        let (sx, sy) = stroke.iter().fold((0, 0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    } else {
        first.point()
    };
    do_point(lp, mid.x, mid.y);
}

fn join_lines(lp: &mut ToolLoop, stroke: &Stroke) {
    if lp.trace_policy() == TracePolicy::Last {
        lp.intertwine_state.retained_last = true;
    }

    match stroke.len() {
        0 => return,
        1 => do_transform_point(lp, &stroke[0]),
        n => {
            let mut pts = Stroke::new();
            line_points(lp, stroke, &mut pts);

            // Freehand strokes continue from an already painted pixel
            let st = &lp.intertwine_state;
            let start = usize::from(lp.controller().is_freehand() && (st.retained_last || !st.first_stroke));
            for pt in pts.points().iter().skip(start) {
                do_transform_point(lp, pt);
            }

            if lp.is_filled() && !lp.controller().is_freehand() {
                do_line(lp, stroke[n - 1], stroke[0]);
            }
        }
    }
    lp.intertwine_state.first_stroke = false;
}

/// Normalized corners of each pair of consecutive points
fn corner_pairs(stroke: &Stroke) -> impl Iterator<Item = (i32, i32, i32, i32)> + '_ {
    stroke.points().windows(2).map(|w| {
        let (x1, x2) = (w[0].x.min(w[1].x), w[0].x.max(w[1].x));
        let (y1, y2) = (w[0].y.min(w[1].y), w[0].y.max(w[1].y));
        (x1, y1, x2, y2)
    })
}

fn join_rectangles(lp: &mut ToolLoop, stroke: &Stroke) {
    if stroke.len() == 1 {
        do_point(lp, stroke[0].x, stroke[0].y);
        return;
    }
    let angle = lp.controller().shape_angle(&lp.controller_state);
    for (x1, y1, x2, y2) in corner_pairs(stroke) {
        if angle.abs() < 0.001 {
            do_line_without_dynamics(lp, x1, y1, x2, y1);
            do_line_without_dynamics(lp, x1, y2, x2, y2);
            for y in y1..=y2 {
                do_point(lp, x1, y);
                do_point(lp, x2, y);
            }
        } else {
            let p = rotate_rectangle(x1, y1, x2, y2, angle);
            for i in 0..p.len() {
                let (a, b) = (p[i], p[(i + 1) % p.len()]);
                do_line(lp, Pt::from(a), Pt::from(b));
            }
        }
    }
}

fn fill_rectangles(lp: &mut ToolLoop, stroke: &Stroke) {
    if stroke.len() < 2 {
        join_rectangles(lp, stroke);
        return;
    }
    let angle = lp.controller().shape_angle(&lp.controller_state);
    for (x1, y1, x2, y2) in corner_pairs(stroke) {
        if angle.abs() < 0.001 {
            for y in y1..=y2 {
                do_line_without_dynamics(lp, x1, y, x2, y);
            }
        } else {
            let p = rotate_rectangle(x1, y1, x2, y2, angle);
            algo::polygon(&p, |x1, y, x2| do_hline(lp, x1, y, x2));
        }
    }
}

/// Corners of the rectangle (x1,y1)-(x2,y2) rotated around its center
fn rotate_rectangle(x1: i32, y1: i32, x2: i32, y2: i32, angle: f64) -> [Point; 4] {
    let cx = (x1 + x2) as f64 / 2.0;
    let cy = (y1 + y2) as f64 / 2.0;
    let a = (x2 - x1) as f64 / 2.0;
    let b = (y2 - y1) as f64 / 2.0;
    let s = -angle.sin();
    let c = angle.cos();
    let pt = |x: f64, y: f64| Point::new(x.round() as i32, y.round() as i32);
    [
        pt(cx - a * c - b * s, cy + a * s - b * c),
        pt(cx + a * c - b * s, cy - a * s - b * c),
        pt(cx + a * c + b * s, cy - a * s + b * c),
        pt(cx - a * c + b * s, cy + a * s + b * c),
    ]
}

fn rectangles_bounds(stroke: &Stroke, angle: f64) -> Rect {
    if angle.abs() <= 0.001 {
        return stroke.bounds();
    }
    let mut bounds = Rect::default();
    for w in stroke.points().windows(2) {
        for p in rotate_rectangle(w[0].x, w[0].y, w[1].x, w[1].y, angle) {
            bounds = bounds.union(&Rect::new(p.x, p.y, 1, 1));
        }
    }
    bounds
}

fn join_ellipses(lp: &mut ToolLoop, stroke: &Stroke) {
    if stroke.len() == 1 {
        do_point(lp, stroke[0].x, stroke[0].y);
        return;
    }
    let angle = lp.controller().shape_angle(&lp.controller_state);
    for (x1, y1, x2, y2) in corner_pairs(stroke) {
        if angle.abs() < 0.001 {
            algo::ellipse(x1, y1, x2, y2, 0, 0, |x, y| do_point(lp, x, y));
        } else {
            algo::rotated_ellipse(
                (x1 + x2) / 2,
                (y1 + y2) / 2,
                (x2 - x1).abs() / 2,
                (y2 - y1).abs() / 2,
                angle,
                |x, y| do_point(lp, x, y),
            );
        }
    }
}

fn fill_ellipses(lp: &mut ToolLoop, stroke: &Stroke) {
    if stroke.len() < 2 {
        join_ellipses(lp, stroke);
        return;
    }
    let angle = lp.controller().shape_angle(&lp.controller_state);
    for (x1, y1, x2, y2) in corner_pairs(stroke) {
        if angle.abs() < 0.001 {
            algo::ellipse_fill(x1, y1, x2, y2, 0, 0, |x1, y, x2| do_hline(lp, x1, y, x2));
        } else {
            algo::fill_rotated_ellipse(
                (x1 + x2) / 2,
                (y1 + y2) / 2,
                (x2 - x1).abs() / 2,
                (y2 - y1).abs() / 2,
                angle,
                |x1, y, x2| do_hline(lp, x1, y, x2),
            );
        }
    }
}

/// The box of a rotated ellipse grows to hold the rotated axes
fn ellipses_bounds(stroke: &Stroke, angle: f64) -> Rect {
    let mut bounds = stroke.bounds();
    if angle.abs() > 0.001 {
        let cx = bounds.x + bounds.w / 2;
        let cy = bounds.y + bounds.h / 2;
        let a = (bounds.w as f64 / 2.0 + 0.5) as i32;
        let b = (bounds.h as f64 / 2.0 + 0.5) as i32;
        let xd = (a * a) as f64;
        let yd = (b * b) as f64;
        let s = angle.sin();
        let zd = (xd - yd) * s;
        let a = ((xd - zd * s).sqrt() + 0.5) as i32;
        let b = ((yd + zd * s).sqrt() + 0.5) as i32;
        bounds = Rect::new(cx - a - 1, cy - b - 1, 2 * a + 3, 2 * b + 3);
    } else {
        bounds.w += 1;
        bounds.h += 1;
    }
    bounds
}

/// Four control points per curve; shorter tails become a point, a line
/// or a curve with a shared control point
fn join_bezier(lp: &mut ToolLoop, stroke: &Stroke) {
    for chunk in stroke.points().chunks(4) {
        let f = |p: &Pt| (p.x as f64, p.y as f64);
        match chunk {
            [a] => do_transform_point(lp, a),
            [a, b] => do_line(lp, *a, *b),
            [a, b, c] => {
                let ((x0, y0), (x1, y1), (x2, y2)) = (f(a), f(b), f(c));
                algo::spline(x0, y0, x1, y1, x1, y1, x2, y2, |ax, ay, bx, by| {
                    do_line_without_dynamics(lp, ax, ay, bx, by)
                });
            }
            [a, b, c, d] => {
                let ((x0, y0), (x1, y1), (x2, y2), (x3, y3)) = (f(a), f(b), f(c), f(d));
                algo::spline(x0, y0, x1, y1, x2, y2, x3, y3, |ax, ay, bx, by| {
                    do_line_without_dynamics(lp, ax, ay, bx, by)
                });
            }
            _ => {}
        }
    }
}

/// Keeps one pixel per corner of an L-shaped turn, so diagonal strokes
/// stay one pixel wide. Runs incrementally: every step only looks at the
/// tail of the point buffer.
fn join_pixel_perfect(lp: &mut ToolLoop, stroke: &Stroke) {
    if lp.trace_policy() == TracePolicy::Last {
        lp.intertwine_state.retained_last = true;
        lp.intertwine_state.pts.clear();
    }

    match stroke.len() {
        0 => return,
        1 => {
            let st = &mut lp.intertwine_state;
            if st.pts.is_empty() {
                st.pts = stroke.clone();
            }
            st.save_area = false;
            do_transform_point(lp, &stroke[0]);
            return;
        }
        _ => {
            if stroke.first_point() == stroke.last_point() {
                return;
            }
        }
    }

    let mut pts = std::mem::take(&mut lp.intertwine_state.pts);
    let mut next_pt = pts.len();
    let third_from_last = pts.len().saturating_sub(if pts.len() > 2 { 3 } else { 1 });
    line_points(lp, stroke, &mut pts);

    // Rotated line brushes would leave gaps
    let brush = lp.brush();
    let elide = brush.kind() != BrushType::Line
        || (lp.dynamics().angle == DynamicSensor::Static && brush.is_axis_aligned_line());
    if elide {
        let mut c = third_from_last;
        while c < pts.len() {
            if c > 0 && c + 1 < pts.len() && is_l_corner(&pts[c - 1], &pts[c], &pts[c + 1]) {
                let pt = pts[c];
                restore_last_pts(lp, c, &pt);
                if c + 1 == next_pt {
                    next_pt -= 1;
                }
                pts.erase(c);
            }
            c += 1;
        }
    }

    for c in next_pt..pts.len() {
        // The first pixel was painted by the Shift+click line
        if c == 0 && lp.intertwine_state.retained_last {
            continue;
        }
        let last = c + 1 == pts.len();
        let st = &mut lp.intertwine_state;
        st.save_area = last;
        if last {
            st.saved_areas.clear();
            st.last_pti = c;
        }
        do_transform_point(lp, &pts[c]);
    }
    lp.intertwine_state.pts = pts;
}

fn is_l_corner(prev: &Pt, pt: &Pt, next: &Pt) -> bool {
    (prev.x == pt.x || prev.y == pt.y)
        && (next.x == pt.x || next.y == pt.y)
        && prev.x != next.x
        && prev.y != next.y
}

/// Snapshots the destination under the stamp at `pt`
fn save_stroke_pt_area(lp: &mut ToolLoop, pt: &Pt) {
    let area = lp.point_shape().modified_area(lp, pt.x, pt.y);
    let region = lp.tiled_mode().collapse_region(&Region::from_rect(area), lp.canvas());
    for rect in region.rects() {
        match lp.dst().crop(*rect, lp.clear_color()) {
            Ok(image) => lp.intertwine_state.saved_areas.push(SavedArea {
                image,
                pos: *pt,
                rect: *rect,
            }),
            Err(err) => warn!("Pixel-perfect can't save the area under {:?}: {}", pt.point(), err),
        }
    }
}

/// Takes back the last stamp when it was made for point `pti`
fn restore_last_pts(lp: &mut ToolLoop, pti: usize, pt: &Pt) {
    let st = &mut lp.intertwine_state;
    if st.saved_areas.is_empty() || pti != st.last_pti || st.saved_areas[0].pos != *pt {
        return;
    }

    let saved = std::mem::take(&mut st.saved_areas);
    let mut restored = Region::new();
    for area in &saved {
        lp.dst.copy_from(&area.image, area.rect.x, area.rect.y, area.image.bounds());
        restored.add_rect(area.rect);
    }
    lp.sync_tiles(&restored);
    lp.intertwine_state.restored = restored;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{rgba, rgba_geta, PixelFormat};
    use crate::document::Document;
    use crate::tools::catalog::{FillMode, ToolButtonConfig};
    use crate::tools::controller::Controller;
    use crate::tools::ink::{Ink, PaintInkType};
    use crate::tools::point_shape::PointShape;
    use crate::tools::pointer::Button;
    use crate::tools::tool_loop::ToolLoopParams;
    use crate::tools::FreehandAlgorithm;

    fn setup(config: ToolButtonConfig, fg: u32, edit: impl FnOnce(&mut ToolLoopParams)) -> ToolLoop {
        let mut doc = Document::new(PixelFormat::Rgb, 12, 12);
        doc.add_layer("Layer").unwrap();
        let mut params = ToolLoopParams::new("test", config, Button::Left);
        params.fg = fg;
        edit(&mut params);
        let mut lp = ToolLoop::new(&doc, params).unwrap();
        let ink = lp.ink();
        ink.prepare_ink(&mut lp).unwrap();
        lp.intertwine().prepare_intertwine(&mut lp);
        lp.point_shape().prepare_point_shape(&mut lp);
        let canvas = Region::from_rect(lp.canvas());
        lp.validate_dst(&canvas);
        lp
    }

    fn config(controller: Controller, intertwine: Intertwine, trace_policy: TracePolicy) -> ToolButtonConfig {
        ToolButtonConfig {
            ink: Ink::Paint(PaintInkType::AlphaCompositing),
            controller,
            point_shape: PointShape::Pixel,
            intertwine,
            trace_policy,
            fill: FillMode::None,
        }
    }

    fn stroke(pts: &[(i32, i32)]) -> Stroke {
        Stroke::from_points(pts.iter().map(|&(x, y)| Pt::new(x, y)).collect())
    }

    fn painted(lp: &ToolLoop) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in 0..lp.dst().height() {
            for x in 0..lp.dst().width() {
                if rgba_geta(lp.dst().get_pixel(x, y)) != 0 {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn test_lines_emit_shared_corner_once() {
        let cfg = config(Controller::PointByPoint, Intertwine::AsLines, TracePolicy::Last);
        let mut lp = setup(cfg, rgba(255, 0, 0, 128), |_| {});
        Intertwine::AsLines.join_stroke(&mut lp, &stroke(&[(0, 0), (5, 0), (5, 5)]));

        // Every pixel was inked exactly once
        assert_eq!(lp.alpha_histogram().iter().sum::<u64>(), 11);
        assert_eq!(painted(&lp).len(), 11);
        assert_eq!(rgba_geta(lp.dst().get_pixel(5, 0)), 128);
    }

    #[test]
    fn test_pixel_perfect_staircase_is_one_pixel_wide() {
        let cfg = config(Controller::Freehand, Intertwine::AsPixelPerfect, TracePolicy::Accumulate);
        let mut lp = setup(cfg, rgba(0, 0, 0, 255), |p| {
            p.freehand_algorithm = FreehandAlgorithm::PixelPerfect;
        });
        assert_eq!(lp.intertwine(), Intertwine::AsPixelPerfect);

        for seg in [[(0, 0), (1, 0)], [(1, 0), (1, 1)], [(1, 1), (2, 1)]] {
            Intertwine::AsPixelPerfect.join_stroke(&mut lp, &stroke(&seg));
        }
        assert_eq!(painted(&lp), vec![(0, 0), (1, 1), (2, 1)]);
    }

    #[test]
    fn test_pixel_perfect_keeps_outside_corner_of_plain_l() {
        let cfg = config(Controller::Freehand, Intertwine::AsPixelPerfect, TracePolicy::Accumulate);
        let mut lp = setup(cfg, rgba(0, 0, 0, 255), |p| {
            p.freehand_algorithm = FreehandAlgorithm::PixelPerfect;
        });
        Intertwine::AsPixelPerfect.join_stroke(&mut lp, &stroke(&[(0, 0), (3, 0)]));
        Intertwine::AsPixelPerfect.join_stroke(&mut lp, &stroke(&[(3, 0), (3, 3)]));
        // Only the pixel closing the L goes, both arms stay connected
        assert!(painted(&lp).contains(&(0, 0)));
        assert!(painted(&lp).contains(&(3, 3)));
        assert!(!painted(&lp).contains(&(3, 0)));
    }

    #[test]
    fn test_rotated_rectangle_bounds_hold_corners() {
        let s = stroke(&[(0, 0), (10, 6)]);
        assert_eq!(rectangles_bounds(&s, 0.0), Rect::new(0, 0, 11, 7));

        let angle = 0.5;
        let bounds = rectangles_bounds(&s, angle);
        for p in rotate_rectangle(0, 0, 10, 6, angle) {
            assert!(bounds.contains(p.x, p.y));
        }
        assert!(bounds.h > 7);
    }

    #[test]
    fn test_slightly_rotated_rectangle_keeps_its_size() {
        let s = stroke(&[(0, 0), (9, 5)]);
        let straight = rectangles_bounds(&s, 0.0);
        assert_eq!(straight, Rect::new(0, 0, 10, 6));
        for angle in [0.002, 0.01, -0.01] {
            assert_eq!(rectangles_bounds(&s, angle), straight);
            let corners = rotate_rectangle(0, 0, 9, 5, angle);
            assert_eq!(corners[0], Point::new(0, 0));
            assert_eq!(corners[2], Point::new(9, 5));
        }
    }

    #[test]
    fn test_ellipse_bounds_include_edge() {
        let s = stroke(&[(2, 2), (6, 4)]);
        assert_eq!(ellipses_bounds(&s, 0.0), Rect::new(2, 2, 6, 4));
    }

    #[test]
    fn test_rectangle_outline() {
        let cfg = config(Controller::TwoPoints, Intertwine::AsRectangles, TracePolicy::Last);
        let mut lp = setup(cfg, rgba(0, 0, 0, 255), |_| {});
        Intertwine::AsRectangles.join_stroke(&mut lp, &stroke(&[(1, 1), (4, 3)]));
        let px = painted(&lp);
        assert_eq!(px.len(), 10);
        assert!(!px.contains(&(2, 2)));
    }

    #[test]
    fn test_bezier_with_two_points_is_a_line() {
        let cfg = config(Controller::FourPoints, Intertwine::AsBezier, TracePolicy::Last);
        let mut lp = setup(cfg, rgba(0, 0, 0, 255), |_| {});
        Intertwine::AsBezier.join_stroke(&mut lp, &stroke(&[(0, 2), (4, 2)]));
        assert_eq!(painted(&lp), vec![(0, 2), (1, 2), (2, 2), (3, 2), (4, 2)]);
    }
}
