//! Controllers turn button presses and pointer movement into the stroke
//! the intertwine walks.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;
use crate::stroke::{Pt, Stroke};

use super::tool_loop::ToolLoop;
use super::{ToolLoopModifiers, TracePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Controller {
    /// Every sample is a new stroke point (pencil)
    #[default]
    Freehand,
    /// Start and end of a drag (line, rectangle, ellipse)
    TwoPoints,
    /// Four clicks placing bezier control points (curve)
    FourPoints,
    /// Only the click position (paint bucket)
    OnePoint,
    /// One point per click until a click without drag (polygon)
    PointByPoint,
    /// Straight line from the last stroke, then freehand (Shift+click)
    LineFreehand,
}

/// Stage of a line-then-freehand gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum LineStage {
    #[default]
    NotStarted,
    Line,
    Freehand,
}

/// Per-gesture controller state
#[derive(Debug, Default)]
pub(crate) struct ControllerState {
    /// Last sample, for origin moves and line continuation
    last: Pt,
    first: Pt,
    center: Pt,
    /// Shape rotation in radians
    angle: f64,
    clicks: u32,
    stage: LineStage,
}

/// What the controllers read from the loop
#[derive(Debug, Clone, Copy)]
struct Context {
    modifiers: ToolLoopModifiers,
    snap_by_angle: bool,
    snap_to_grid: bool,
    brush_bounds: Rect,
}

impl Context {
    fn new(lp: &ToolLoop) -> Self {
        Self {
            modifiers: lp.modifiers(),
            snap_by_angle: lp.intertwine().snaps_by_angle(),
            snap_to_grid: lp.controller().can_snap_to_grid() && lp.params().snap_to_grid,
            brush_bounds: lp.brush().bounds(),
        }
    }

    fn has(&self, m: ToolLoopModifiers) -> bool {
        self.modifiers.contains(m)
    }
}

impl Controller {
    pub const IDS: [(&'static str, Controller); 6] = [
        ("freehand", Controller::Freehand),
        ("two_points", Controller::TwoPoints),
        ("four_points", Controller::FourPoints),
        ("one_point", Controller::OnePoint),
        ("point_by_point", Controller::PointByPoint),
        ("line_freehand", Controller::LineFreehand),
    ];

    pub fn from_id(id: &str) -> Option<Controller> {
        Self::IDS.iter().find(|(name, _)| *name == id).map(|(_, c)| *c)
    }

    pub fn id(self) -> &'static str {
        Self::IDS
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(name, _)| *name)
            .unwrap_or("freehand")
    }

    pub fn is_freehand(self) -> bool {
        matches!(self, Controller::Freehand | Controller::LineFreehand)
    }

    pub fn is_two_points(self) -> bool {
        self == Controller::TwoPoints
    }

    pub fn is_one_point(self) -> bool {
        self == Controller::OnePoint
    }

    /// One-point tools (bucket, magic wand) ignore the grid
    pub fn can_snap_to_grid(self) -> bool {
        self != Controller::OnePoint
    }

    /// Policy forced by the controller for the current stage
    pub(crate) fn trace_policy_override(self, st: &ControllerState) -> Option<TracePolicy> {
        (self == Controller::LineFreehand && st.stage == LineStage::Line).then_some(TracePolicy::Last)
    }

    /// Rotation of rectangles and ellipses, in radians
    pub(crate) fn shape_angle(self, st: &ControllerState) -> f64 {
        match self {
            Controller::TwoPoints => st.angle,
            _ => 0.0,
        }
    }

    /// Last freehand point, where a Shift+click line would start
    pub(crate) fn last_point(self, st: &ControllerState) -> Option<Pt> {
        self.is_freehand().then_some(st.last)
    }

    pub(crate) fn prepare_controller(self, lp: &mut ToolLoop) {
        lp.controller_state = ControllerState::default();
    }

    pub(crate) fn press_button(self, lp: &mut ToolLoop, stroke: &mut Stroke, pt: Pt) {
        let cx = Context::new(lp);
        let st = &mut lp.controller_state;
        match self {
            Controller::Freehand => freehand_press(st, stroke, pt),
            Controller::TwoPoints => two_points_press(st, stroke, pt),
            Controller::PointByPoint => {
                st.last = pt;
                stroke.add_point(pt);
                stroke.add_point(pt);
            }
            Controller::OnePoint => {
                if stroke.is_empty() {
                    stroke.add_point(pt);
                }
            }
            Controller::FourPoints => {
                st.last = pt;
                if stroke.is_empty() {
                    stroke.reset_to(4, pt);
                    st.clicks = 0;
                } else {
                    st.clicks += 1;
                }
            }
            Controller::LineFreehand => {
                st.last = pt;
                match st.stage {
                    LineStage::NotStarted => {
                        st.stage = LineStage::Line;
                        two_points_press(st, stroke, pt);
                    }
                    LineStage::Line => {
                        // Ctrl+Shift keeps drawing lines
                        if !cx.has(ToolLoopModifiers::SQUARE_ASPECT) {
                            st.stage = LineStage::Freehand;
                        }
                    }
                    LineStage::Freehand => freehand_press(st, stroke, pt),
                }
            }
        }
    }

    /// Returns `true` when the gesture goes on after the release (more
    /// clicks are expected)
    pub(crate) fn release_button(self, lp: &mut ToolLoop, stroke: &mut Stroke, pt: Pt) -> bool {
        let st = &mut lp.controller_state;
        match self {
            Controller::PointByPoint => {
                let n = stroke.len();
                if n < 2 {
                    return false;
                }
                !(stroke[n - 2].same_position(&pt) && stroke[n - 1].same_position(&pt))
            }
            Controller::FourPoints => {
                st.clicks += 1;
                st.clicks < 4
            }
            Controller::LineFreehand => {
                if let Some(last) = stroke.last_point() {
                    st.last = last;
                }
                false
            }
            Controller::Freehand | Controller::TwoPoints | Controller::OnePoint => false,
        }
    }

    pub(crate) fn movement(self, lp: &mut ToolLoop, stroke: &mut Stroke, pt: Pt) {
        let cx = Context::new(lp);
        let st = &mut lp.controller_state;
        match self {
            Controller::Freehand => freehand_move(st, stroke, pt),
            Controller::TwoPoints => two_points_move(&cx, st, stroke, pt),
            Controller::PointByPoint => {
                if stroke.is_empty() || moving_origin(&cx, st, stroke, pt) {
                    return;
                }
                let n = stroke.len();
                stroke[n - 1] = pt;
            }
            Controller::OnePoint => {}
            Controller::FourPoints => {
                if stroke.len() < 4 || moving_origin(&cx, st, stroke, pt) {
                    return;
                }
                match st.clicks {
                    0 => {
                        for i in 1..stroke.len() {
                            stroke[i] = pt;
                        }
                    }
                    1 | 2 => {
                        stroke[1] = pt;
                        stroke[2] = pt;
                    }
                    3 => stroke[2] = pt,
                    _ => {}
                }
            }
            Controller::LineFreehand => match st.stage {
                LineStage::Line => two_points_move(&cx, st, stroke, pt),
                _ => freehand_move(st, stroke, pt),
            },
        }
    }

    /// Points the intertwine receives in a regular loop step
    pub(crate) fn stroke_to_intertwine(self, st: &ControllerState, input: &Stroke) -> Stroke {
        match self {
            Controller::Freehand => freehand_tail(input),
            Controller::TwoPoints => two_points_head(input),
            Controller::LineFreehand => match st.stage {
                LineStage::Line => two_points_head(input),
                _ => freehand_tail(input),
            },
            Controller::FourPoints | Controller::OnePoint | Controller::PointByPoint => input.clone(),
        }
    }

    /// Human readable position/size of the stroke for the status bar
    pub(crate) fn status_text(self, lp: &ToolLoop, stroke: &Stroke) -> String {
        let st = &lp.controller_state;
        let (Some(first), Some(last)) = (stroke.first_point(), stroke.last_point()) else {
            return String::new();
        };
        let two_points = self == Controller::TwoPoints
            || (self == Controller::LineFreehand && st.stage == LineStage::Line);
        match self {
            _ if two_points => two_points_text(st.angle, lp.intertwine().snaps_by_angle(), stroke),
            Controller::OnePoint => format!("pos: {} {}", first.x, first.y),
            Controller::FourPoints if stroke.len() >= 4 => format!(
                "start: {} {} end: {} {} ({} {} - {} {})",
                stroke[0].x, stroke[0].y, stroke[3].x, stroke[3].y, stroke[1].x, stroke[1].y, stroke[2].x, stroke[2].y
            ),
            _ => format!("start: {} {} end: {} {}", first.x, first.y, last.x, last.y),
        }
    }
}

fn freehand_press(st: &mut ControllerState, stroke: &mut Stroke, pt: Pt) {
    st.last = pt;
    stroke.add_point(pt);
}

fn freehand_move(st: &mut ControllerState, stroke: &mut Stroke, pt: Pt) {
    st.last = pt;
    stroke.add_point(pt);
}

/// Only the last segment: previous ones are already in the preview
fn freehand_tail(input: &Stroke) -> Stroke {
    let pts = input.points();
    let start = pts.len().saturating_sub(2);
    Stroke::from_points(pts[start..].to_vec())
}

fn two_points_head(input: &Stroke) -> Stroke {
    let pts = input.points();
    Stroke::from_points(pts[..pts.len().min(2)].to_vec())
}

fn two_points_press(st: &mut ControllerState, stroke: &mut Stroke, pt: Pt) {
    st.last = pt;
    st.first = pt;
    st.center = pt;
    st.angle = 0.0;
    stroke.add_point(pt);
    stroke.add_point(pt);
}

/// Space bar drags every point of the stroke
fn moving_origin(cx: &Context, st: &mut ControllerState, stroke: &mut Stroke, pt: Pt) -> bool {
    let used = cx.has(ToolLoopModifiers::MOVE_ORIGIN);
    if used {
        let (dx, dy) = (pt.x - st.last.x, pt.y - st.last.y);
        stroke.offset(dx, dy);
        st.first.x += dx;
        st.first.y += dy;
        st.center.x += dx;
        st.center.y += dy;
    }
    st.last = pt;
    used
}

fn two_points_move(cx: &Context, st: &mut ControllerState, stroke: &mut Stroke, pt: Pt) {
    if stroke.len() < 2 || moving_origin(cx, st, stroke, pt) {
        return;
    }

    if !cx.snap_by_angle && cx.has(ToolLoopModifiers::ROTATE_SHAPE) {
        if cx.has(ToolLoopModifiers::FROM_CENTER) {
            st.center = st.first;
        } else {
            st.center.x = (stroke[0].x + stroke[1].x) / 2;
            st.center.y = (stroke[0].y + stroke[1].y) / 2;
        }
        st.angle = ((pt.y - st.center.y) as f64).atan2((pt.x - st.center.x) as f64);
        return;
    }

    let first = st.first;
    stroke[0] = first;
    stroke[1] = pt;

    let mut iso_angle = false;
    if cx.has(ToolLoopModifiers::SQUARE_ASPECT) {
        let dx = stroke[1].x - first.x;
        let dy = stroke[1].y - first.y;
        let minsize = dx.abs().min(dy.abs());
        let maxsize = dx.abs().max(dy.abs());

        if cx.snap_by_angle {
            let angle = (180.0 * (-dy as f64 / dx as f64).atan() / std::f64::consts::PI).abs();
            if angle < 18.0 {
                stroke[1].y = first.y;
            } else if angle < 36.0 {
                stroke[1].x = first.x + dx.signum() * maxsize;
                stroke[1].y = first.y + dy.signum() * maxsize / 2;
                iso_angle = true;
            } else if angle < 54.0 {
                stroke[1].x = first.x + dx.signum() * minsize;
                stroke[1].y = first.y + dy.signum() * minsize;
            } else if angle < 72.0 {
                stroke[1].x = first.x + dx.signum() * maxsize / 2;
                stroke[1].y = first.y + dy.signum() * maxsize;
                iso_angle = true;
            } else {
                stroke[1].x = first.x;
            }
        } else {
            stroke[1].x = first.x + dx.signum() * minsize;
            stroke[1].y = first.y + dy.signum() * minsize;
        }
    }

    if st.angle.abs() > 0.001 {
        let rx = stroke[1].x - st.center.x;
        let ry = stroke[1].y - st.center.y;
        stroke[0].x = st.center.x - rx;
        stroke[0].y = st.center.y - ry;
        stroke[1].x = st.center.x + rx;
        stroke[1].y = st.center.y + ry;
    } else if cx.has(ToolLoopModifiers::FROM_CENTER) {
        let rx = stroke[1].x - first.x;
        let ry = stroke[1].y - first.y;
        let odd_x = if iso_angle && rx.abs() > ry.abs() { rx.signum() * (rx & 1) } else { 0 };
        let odd_y = if iso_angle && rx.abs() < ry.abs() { ry.signum() * (ry & 1) } else { 0 };
        stroke[0].x = first.x - rx + odd_x;
        stroke[0].y = first.y - ry + odd_y;
        stroke[1].x = first.x + rx;
        stroke[1].y = first.y + ry;
    }

    // Snapped points are brush corners; keep the far edge on the grid
    if cx.snap_to_grid {
        let b = cx.brush_bounds;
        if stroke[0].x < stroke[1].x {
            stroke[1].x -= b.w;
        } else if stroke[0].x > stroke[1].x {
            stroke[0].x -= b.w;
        }
        if stroke[0].y < stroke[1].y {
            stroke[1].y -= b.h;
        } else if stroke[0].y > stroke[1].y {
            stroke[0].y -= b.h;
        }
    }
}

fn two_points_text(angle: f64, snap_by_angle: bool, stroke: &Stroke) -> String {
    if stroke.len() < 2 {
        return String::new();
    }
    let (a, b) = (stroke[0], stroke[1]);
    let w = (b.x - a.x).abs() + 1;
    let h = (b.y - a.y).abs() + 1;
    let d = gcd(w, h);
    let mut text = format!(
        "start: {} {} end: {} {} size: {} {} distance: {:.1}",
        a.x,
        a.y,
        b.x,
        b.y,
        w,
        h,
        ((w * w + h * h) as f64).sqrt()
    );
    let has_angle = angle.abs() > 0.001;
    if has_angle || snap_by_angle {
        let angle = if has_angle {
            angle
        } else {
            ((a.y - b.y) as f64).atan2((b.x - a.x) as f64)
        };
        text.push_str(&format!(" angle: {:.1}", angle.to_degrees()));
    }
    text.push_str(&format!(" aspect: {}:{}", w / d, h / d));
    text
}

fn gcd(a: i32, b: i32) -> i32 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freehand_tail_is_last_segment() {
        let stroke = Stroke::from_points(vec![Pt::new(0, 0), Pt::new(1, 0), Pt::new(2, 1)]);
        let out = freehand_tail(&stroke);
        assert_eq!(out.to_points(), vec![crate::geometry::Point::new(1, 0), crate::geometry::Point::new(2, 1)]);
    }

    #[test]
    fn test_square_aspect_snaps_line_to_45_degrees() {
        let cx = Context {
            modifiers: ToolLoopModifiers::SQUARE_ASPECT,
            snap_by_angle: true,
            snap_to_grid: false,
            brush_bounds: Rect::new(0, 0, 1, 1),
        };
        let mut st = ControllerState::default();
        let mut stroke = Stroke::new();
        two_points_press(&mut st, &mut stroke, Pt::new(0, 0));
        two_points_move(&cx, &mut st, &mut stroke, Pt::new(10, 9));
        assert_eq!((stroke[1].x, stroke[1].y), (9, 9));
        two_points_move(&cx, &mut st, &mut stroke, Pt::new(10, 1));
        assert_eq!((stroke[1].x, stroke[1].y), (10, 0));
    }

    #[test]
    fn test_from_center_mirrors_start() {
        let cx = Context {
            modifiers: ToolLoopModifiers::FROM_CENTER,
            snap_by_angle: false,
            snap_to_grid: false,
            brush_bounds: Rect::new(0, 0, 1, 1),
        };
        let mut st = ControllerState::default();
        let mut stroke = Stroke::new();
        two_points_press(&mut st, &mut stroke, Pt::new(5, 5));
        two_points_move(&cx, &mut st, &mut stroke, Pt::new(8, 7));
        assert_eq!((stroke[0].x, stroke[0].y), (2, 3));
        assert_eq!((stroke[1].x, stroke[1].y), (8, 7));
    }

    #[test]
    fn test_move_origin_offsets_stroke() {
        let cx = Context {
            modifiers: ToolLoopModifiers::MOVE_ORIGIN,
            snap_by_angle: false,
            snap_to_grid: false,
            brush_bounds: Rect::new(0, 0, 1, 1),
        };
        let mut st = ControllerState::default();
        let mut stroke = Stroke::new();
        two_points_press(&mut st, &mut stroke, Pt::new(0, 0));
        two_points_move(&cx, &mut st, &mut stroke, Pt::new(3, 2));
        assert_eq!((stroke[0].x, stroke[0].y), (3, 2));
        assert_eq!((st.first.x, st.first.y), (3, 2));
    }

    #[test]
    fn test_status_text_aspect() {
        let stroke = Stroke::from_points(vec![Pt::new(0, 0), Pt::new(3, 1)]);
        let text = two_points_text(0.0, false, &stroke);
        assert!(text.starts_with("start: 0 0 end: 3 1 size: 4 2"));
        assert!(text.ends_with("aspect: 2:1"));
    }
}
