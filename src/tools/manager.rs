//! Drives one gesture: feeds pointer events to the controller, runs a
//! loop step (intertwine, point shape, ink) after each event, reports
//! dirty areas to the preview and finally commits or discards the
//! destination image.

use std::time::Duration;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::command::History;
use crate::document::{read_document, write_document, SharedDocument};
use crate::error::ToolLoopResult;
use crate::geometry::{Point, Rect, Region};
use crate::layer::BlendMode;
use crate::renderer::PreviewSink;
use crate::stroke::{Pt, Stroke};

use super::dynamics::Stabilizer;
use super::pointer::{Button, Pointer};
use super::tool_loop::{CommitReport, ToolLoop, ToolLoopParams};
use super::{ToolLoopModifiers, TracePolicy};

/// Mouse moves of tools that redraw the whole trace are coalesced for
/// this long
pub const DELAYED_MOUSE_MOVE: Duration = Duration::from_millis(5);

#[derive(Debug)]
pub struct ToolLoopManager {
    lp: ToolLoop,
    blend_mode: BlendMode,
    stroke: Stroke,
    last_pointer: Option<Pointer>,
    stabilizer: Stabilizer,
    /// Area drawn by the previous step, restored by the next one when the
    /// trace policy is `Last`
    next_dirty: Region,
    /// Bounds of every dirty area of the gesture
    touched: Rect,
    prepared: bool,
    canceled: bool,
}

impl ToolLoopManager {
    pub fn new(lp: ToolLoop) -> Self {
        let factor = lp.dynamics().stabilizer_factor;
        Self {
            lp,
            blend_mode: BlendMode::Normal,
            stroke: Stroke::new(),
            last_pointer: None,
            stabilizer: Stabilizer::new(Point::default(), factor),
            next_dirty: Region::new(),
            touched: Rect::default(),
            prepared: false,
            canceled: false,
        }
    }

    /// Starts a gesture over the active layer of `doc`. The reader lock is
    /// held only while the layer is snapshotted; a busy document refuses
    /// the gesture before anything is allocated.
    pub fn start(doc: &SharedDocument, params: ToolLoopParams) -> ToolLoopResult<Self> {
        let guard = read_document(doc, params.lock_wait)?;
        let blend_mode = guard
            .active_layer()
            .and_then(|id| guard.layer(id))
            .map(|layer| layer.blend_mode)
            .unwrap_or_default();
        let tool_id = params.tool_id.clone();
        let lp = ToolLoop::new(&guard, params).inspect_err(|err| {
            warn!("Can't start '{}': {}", tool_id, err);
        })?;
        drop(guard);

        info!("Gesture with '{}' started", tool_id);
        let mut manager = Self::new(lp);
        manager.blend_mode = blend_mode;
        Ok(manager)
    }

    pub fn tool_loop(&self) -> &ToolLoop {
        &self.lp
    }

    pub fn stroke(&self) -> &Stroke {
        &self.stroke
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn status_text(&self) -> &str {
        self.lp.status_text()
    }

    /// Where a Shift+click line starts once this gesture is over
    pub fn last_freehand_point(&self) -> Option<Point> {
        if self.stroke.is_empty() {
            return None;
        }
        let lp = &self.lp;
        lp.controller().last_point(&lp.controller_state).map(|pt| pt.point())
    }

    /// How long mouse moves can be held back before the next step
    pub fn mouse_move_delay(&self) -> Duration {
        match self.lp.trace_policy() {
            TracePolicy::Last => DELAYED_MOUSE_MOVE,
            TracePolicy::Accumulate | TracePolicy::Overlap => Duration::ZERO,
        }
    }

    /// Resets every strategy for a new gesture. Must run before the first
    /// button press. On error the gesture is canceled.
    pub fn prepare_loop(&mut self, pointer: &Pointer, sink: &mut dyn PreviewSink) -> ToolLoopResult<()> {
        self.stroke.clear();
        self.next_dirty.clear();
        self.touched = Rect::default();
        self.last_pointer = Some(*pointer);
        self.stabilizer.reset(pointer.point);

        let lp = &mut self.lp;
        if let Err(err) = lp.ink().prepare_ink(lp) {
            warn!("Gesture canceled, the ink can't be prepared: {}", err);
            self.canceled = true;
            return Err(err);
        }
        lp.controller().prepare_controller(lp);
        lp.intertwine().prepare_intertwine(lp);
        lp.point_shape().prepare_point_shape(lp);
        self.prepared = true;

        sink.install_preview_image(lp.layer(), lp.dst(), Point::default(), self.blend_mode);
        Ok(())
    }

    /// Handles a button press; pressing the other button cancels
    pub fn press_button(&mut self, pointer: &Pointer, sink: &mut dyn PreviewSink) {
        if self.canceled || !self.prepared {
            return;
        }
        let policy_before = self.lp.trace_policy();
        self.last_pointer = Some(*pointer);

        if is_other_button(self.lp.button(), pointer.button) {
            info!("Gesture canceled by the other button");
            self.cancel(sink);
            return;
        }

        self.stabilizer.reset(pointer.point);
        let pt = self.sprite_stroke_pt(pointer);
        let controller = self.lp.controller();
        controller.press_button(&mut self.lp, &mut self.stroke, pt);
        self.update_status_text();

        // A Shift+click line that just got confirmed is already drawn
        let policy_after = self.lp.trace_policy();
        if policy_before == policy_after || policy_after == TracePolicy::Last {
            self.do_loop_step(false, sink);
        }
    }

    /// Returns `true` when the controller waits for more clicks
    pub fn release_button(&mut self, pointer: &Pointer, sink: &mut dyn PreviewSink) -> bool {
        if self.canceled || !self.prepared {
            return false;
        }
        self.last_pointer = Some(*pointer);
        let pt = self.sprite_stroke_pt(pointer);
        let controller = self.lp.controller();
        let more = controller.release_button(&mut self.lp, &mut self.stroke, pt);

        let ink = self.lp.ink();
        if !more
            && (self.lp.trace_policy() == TracePolicy::Last
                || ink.is_selection()
                || ink.is_slice()
                || self.lp.is_filled())
        {
            ink.set_final_step(&mut self.lp, true);
            self.do_loop_step(true, sink);
            ink.set_final_step(&mut self.lp, false);
        }
        more
    }

    pub fn movement(&mut self, pointer: &Pointer, sink: &mut dyn PreviewSink) {
        if self.canceled || !self.prepared {
            return;
        }
        self.last_pointer = Some(*pointer);

        let mut pointer = *pointer;
        let dynamics = self.lp.dynamics();
        if dynamics.stabilizer && dynamics.stabilizer_factor > 0 {
            pointer.point = self.stabilizer.filter(pointer.point);
        }

        let pt = self.sprite_stroke_pt(&pointer);
        let controller = self.lp.controller();
        controller.movement(&mut self.lp, &mut self.stroke, pt);
        self.update_status_text();
        self.do_loop_step(false, sink);
    }

    /// Keys pressed mid-gesture change the shape right away
    pub fn notify_modifiers_change(&mut self, modifiers: ToolLoopModifiers, sink: &mut dyn PreviewSink) {
        if self.lp.modifiers() == modifiers {
            return;
        }
        self.lp.set_modifiers(modifiers);
        if self.canceled || self.stroke.is_empty() || self.lp.trace_policy() != TracePolicy::Last {
            return;
        }
        if let Some(pointer) = self.last_pointer {
            self.movement(&pointer, sink);
        }
    }

    /// Discards the preview. Safe to call at any time, any number of times.
    pub fn cancel(&mut self, sink: &mut dyn PreviewSink) {
        if !self.canceled {
            debug!("Canceling gesture, {} points in the stroke", self.stroke.len());
        }
        self.canceled = true;
        sink.remove_preview_image();
        if !self.touched.is_empty() {
            sink.invalidate_region(&Region::from_rect(self.touched));
        }
    }

    /// Finishes the gesture. With `commit` the changes become one undo
    /// step; otherwise (or after a cancel) the document is left as it was.
    /// `Ok(None)` means nothing was committed.
    pub fn end(
        mut self,
        commit: bool,
        doc: &SharedDocument,
        history: &mut dyn History,
        sink: &mut dyn PreviewSink,
    ) -> ToolLoopResult<Option<CommitReport>> {
        if !commit || self.canceled || !self.prepared {
            self.cancel(sink);
            info!("Gesture with '{}' canceled", self.lp.params().tool_id);
            return Ok(None);
        }

        let result = self.commit(doc, history);
        sink.remove_preview_image();
        if !self.touched.is_empty() {
            sink.invalidate_region(&Region::from_rect(self.touched));
        }
        match &result {
            Ok(report) => info!(
                "Gesture with '{}' committed, dirty {:?}",
                self.lp.params().tool_id,
                report.dirty
            ),
            Err(err) => warn!("Gesture with '{}' not committed: {}", self.lp.params().tool_id, err),
        }
        result.map(Some)
    }

    fn commit(&self, doc: &SharedDocument, history: &mut dyn History) -> ToolLoopResult<CommitReport> {
        let label = self.lp.params().tool_id.clone();
        let id = history.begin_cel_transaction(&label)?;
        match self.apply_transaction(id, &label, doc, history) {
            Ok(recorded) => Ok(recorded),
            Err(err) => {
                history.abort_cel_transaction(id);
                Err(err)
            }
        }
    }

    fn apply_transaction(
        &self,
        id: Uuid,
        label: &str,
        doc: &SharedDocument,
        history: &mut dyn History,
    ) -> ToolLoopResult<CommitReport> {
        let mut guard = write_document(doc, self.lp.params().lock_wait)?;
        let tx = self.lp.build_transaction(id, label)?;
        let dirty = tx.dirty.bounds();
        let recorded = history.commit_cel_transaction(&mut guard, tx)?;
        Ok(CommitReport {
            transaction_id: recorded.then_some(id),
            dirty,
            uses_alpha: self.lp.uses_alpha(),
            new_selection: self.lp.new_selection().is_some(),
            slice: self.lp.slice_bounds(),
        })
    }

    /// Canvas point for a pointer sample, snapped and with dynamics
    fn sprite_stroke_pt(&mut self, pointer: &Pointer) -> Pt {
        let lp = &mut self.lp;
        let brush = lp.base_brush();
        let mut pt = Pt {
            size: brush.size(),
            angle: brush.angle(),
            ..Pt::new(pointer.point.x, pointer.point.y)
        };

        let controller = lp.controller();
        if controller.can_snap_to_grid() && lp.params().snap_to_grid {
            let snapped = lp.grid().snap(pointer.point) + lp.brush().center();
            pt.x = snapped.x;
            pt.y = snapped.y;
        }

        let dynamics = *lp.dynamics();
        if dynamics.is_dynamic() && !lp.is_filled() && controller.is_freehand() {
            dynamics.adjust_point(pointer, &mut pt);
        }

        lp.set_speed(Point::new(pointer.velocity.x as i32, pointer.velocity.y as i32));
        pt
    }

    fn update_status_text(&mut self) {
        let text = self.lp.controller().status_text(&self.lp, &self.stroke);
        self.lp.set_status_text(text);
    }

    fn do_loop_step(&mut self, last_step: bool, sink: &mut dyn PreviewSink) {
        let controller = self.lp.controller();
        let main_stroke = if last_step {
            self.stroke.clone()
        } else {
            controller.stroke_to_intertwine(&self.lp.controller_state, &self.stroke)
        };
        self.lp.main_stroke = main_stroke.clone();

        let mut dirty = self.dirty_area(&main_stroke);

        let lp = &mut self.lp;
        let ink = lp.ink();
        ink.prepare_for_strokes(lp, &main_stroke);

        let fill = lp.is_filled() && (last_step || lp.is_preview_filled());
        if lp.trace_policy() == TracePolicy::Last || fill {
            lp.invalidate_dst();
        }
        lp.validate_dst(&dirty);

        let intertwine = lp.intertwine();
        if main_stroke.is_empty() {
            debug!("Loop step with an empty stroke");
        } else if fill {
            intertwine.fill_stroke(lp, &main_stroke);
        } else {
            intertwine.join_stroke(lp, &main_stroke);
        }

        if lp.trace_policy() == TracePolicy::Overlap {
            lp.copy_valid_dst_to_src(&dirty);
        }

        dirty.add_region(&intertwine.take_restored_region(lp));
        if !dirty.is_empty() {
            let extra = lp.validate_dst_tileset(&dirty);
            dirty.add_region(&extra);
            debug!("Loop step (last {}): dirty {:?}", last_step, dirty.bounds());
            sink.update_preview_image(lp.dst(), &dirty);
            sink.invalidate_region(&dirty);
            self.touched = self.touched.union(&dirty.bounds());
        }
    }

    /// Canvas area the step can touch. With the `Last` policy it also
    /// covers the previous trace, which has to be erased.
    fn dirty_area(&mut self, stroke: &Stroke) -> Region {
        let lp = &self.lp;
        let mut dirty = Region::new();
        if !stroke.is_empty() {
            let shape = lp.point_shape();
            let bounds = lp.intertwine().stroke_bounds(lp, stroke);
            let r1 = shape.modified_area(lp, bounds.x, bounds.y);
            let r2 = shape.modified_area(lp, bounds.x2() - 1, bounds.y2() - 1);
            let area = r1.union(&r2);
            match lp.params().symmetry {
                Some(sym) if sym.is_active() => {
                    for r in sym.mirror_rect(area) {
                        dirty.add_rect(r);
                    }
                }
                _ => dirty.add_rect(area),
            }
        }
        let mut dirty = lp.tiled_mode().collapse_region(&dirty, lp.canvas());

        if lp.trace_policy() == TracePolicy::Last {
            let prev = std::mem::replace(&mut self.next_dirty, dirty.clone());
            dirty.add_region(&prev);
        }
        dirty
    }
}

fn is_other_button(loop_button: Button, pressed: Button) -> bool {
    matches!(
        (loop_button, pressed),
        (Button::Left, Button::Right) | (Button::Right, Button::Left)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{rgba, rgba_geta, PixelFormat};
    use crate::document::Document;
    use crate::renderer::Renderer;
    use crate::tools::catalog::ToolCatalog;
    use crate::tools::FreehandAlgorithm;

    fn manager_for(tool: &str) -> ToolLoopManager {
        let catalog = ToolCatalog::bundled().unwrap();
        let mut doc = Document::new(PixelFormat::Rgb, 16, 16);
        doc.add_layer("Layer").unwrap();
        let mut params = ToolLoopParams::for_tool(catalog.get(tool).unwrap(), Button::Left);
        params.fg = rgba(255, 0, 0, 255);
        ToolLoopManager::new(ToolLoop::new(&doc, params).unwrap())
    }

    #[test]
    fn test_delay_depends_on_trace_policy() {
        assert_eq!(manager_for("line").mouse_move_delay(), DELAYED_MOUSE_MOVE);
        assert_eq!(manager_for("pencil").mouse_move_delay(), Duration::ZERO);
    }

    #[test]
    fn test_other_button_cancels() {
        let mut sink = Renderer::new();
        let mut m = manager_for("pencil");
        let p = Pointer::at(2, 2, Button::Left);
        m.prepare_loop(&p, &mut sink).unwrap();
        m.press_button(&p, &mut sink);
        m.movement(&Pointer::at(5, 2, Button::Left), &mut sink);
        assert!(!m.is_canceled());

        m.press_button(&Pointer::at(5, 2, Button::Right), &mut sink);
        assert!(m.is_canceled());
        assert!(!sink.has_preview());

        // Events after a cancel are ignored
        m.movement(&Pointer::at(9, 9, Button::Left), &mut sink);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(9, 9)), 0);
    }

    #[test]
    fn test_line_redraws_from_source() {
        let mut sink = Renderer::new();
        let mut m = manager_for("line");
        let p = Pointer::at(1, 1, Button::Left);
        m.prepare_loop(&p, &mut sink).unwrap();
        m.press_button(&p, &mut sink);
        m.movement(&Pointer::at(10, 1, Button::Left), &mut sink);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(10, 1)), 255);

        // The previous trace goes away
        m.movement(&Pointer::at(1, 10, Button::Left), &mut sink);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(10, 1)), 0);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(1, 10)), 255);
    }

    #[test]
    fn test_modifiers_redraw_last_policy_tools() {
        let mut sink = Renderer::new();
        let mut m = manager_for("line");
        let p = Pointer::at(0, 0, Button::Left);
        m.prepare_loop(&p, &mut sink).unwrap();
        m.press_button(&p, &mut sink);
        m.movement(&Pointer::at(10, 1, Button::Left), &mut sink);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(10, 1)), 255);

        m.notify_modifiers_change(ToolLoopModifiers::SQUARE_ASPECT, &mut sink);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(10, 0)), 255);
        assert_eq!(rgba_geta(m.tool_loop().dst().get_pixel(10, 1)), 0);
    }

    #[test]
    fn test_long_stroke_keeps_dirty_areas_compact() {
        let mut sink = Renderer::new();
        let mut m = manager_for("pencil");
        let p = Pointer::at(0, 0, Button::Left);
        m.prepare_loop(&p, &mut sink).unwrap();
        m.press_button(&p, &mut sink);
        for i in 1..2000 {
            let (x, y) = (i % 16, (i / 16) % 16);
            m.movement(&Pointer::at(x, y, Button::Left), &mut sink);
        }
        assert_eq!(m.touched, Rect::new(0, 0, 16, 16));
        assert!(sink.take_invalid_region().rects().len() <= Region::MAX_RECTS);
    }

    /// Paints the whole stroke of `m` in one pass on a fresh loop
    fn one_shot(m: &ToolLoopManager, doc: &Document) -> Vec<u32> {
        let mut lp = ToolLoop::new(doc, m.tool_loop().params().clone()).unwrap();
        lp.ink().prepare_ink(&mut lp).unwrap();
        lp.controller().prepare_controller(&mut lp);
        lp.intertwine().prepare_intertwine(&mut lp);
        lp.point_shape().prepare_point_shape(&mut lp);
        let canvas = lp.canvas();
        lp.validate_dst(&Region::from_rect(canvas));
        let stroke = m.stroke().clone();
        lp.main_stroke = stroke.clone();
        lp.intertwine().join_stroke(&mut lp, &stroke);
        lp.dst().pixels().to_vec()
    }

    fn drag_pencil(algorithm: FreehandAlgorithm, path: &[(i32, i32)]) -> (Vec<u32>, Vec<u32>) {
        let catalog = ToolCatalog::bundled().unwrap();
        let mut doc = Document::new(PixelFormat::Rgb, 16, 16);
        doc.add_layer("Layer").unwrap();
        let mut params = ToolLoopParams::for_tool(catalog.get("pencil").unwrap(), Button::Left);
        params.fg = rgba(255, 0, 0, 255);
        params.freehand_algorithm = algorithm;

        let mut sink = Renderer::new();
        let mut m = ToolLoopManager::new(ToolLoop::new(&doc, params).unwrap());
        let (x, y) = path[0];
        let p = Pointer::at(x, y, Button::Left);
        m.prepare_loop(&p, &mut sink).unwrap();
        m.press_button(&p, &mut sink);
        for &(x, y) in &path[1..] {
            m.movement(&Pointer::at(x, y, Button::Left), &mut sink);
        }
        let (x, y) = path[path.len() - 1];
        assert!(!m.release_button(&Pointer::at(x, y, Button::Left), &mut sink));
        assert_eq!(m.stroke().len(), path.len());

        let preview = m.tool_loop().dst().pixels().to_vec();
        (preview, one_shot(&m, &doc))
    }

    #[test]
    fn test_preview_matches_one_shot_lines() {
        let path = [(1, 1), (9, 4), (3, 12), (14, 14), (14, 2)];
        let (preview, replay) = drag_pencil(FreehandAlgorithm::Default, &path);
        assert!(preview.iter().any(|&c| rgba_geta(c) == 255));
        assert_eq!(preview, replay);
    }

    #[test]
    fn test_preview_matches_one_shot_pixel_perfect() {
        let path = [(0, 0), (1, 0), (1, 1), (2, 1), (2, 2), (3, 2), (3, 3), (8, 3), (8, 9)];
        let (preview, replay) = drag_pencil(FreehandAlgorithm::PixelPerfect, &path);
        assert_eq!(preview, replay);

        // Corners of the staircase were taken back
        let at = |x: i32, y: i32| rgba_geta(preview[(y * 16 + x) as usize]);
        assert_eq!(at(1, 0), 0);
        assert_eq!(at(2, 1), 0);
        assert_eq!(at(1, 1), 255);
        assert_eq!(at(2, 2), 255);
    }
}
