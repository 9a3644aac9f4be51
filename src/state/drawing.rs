use std::time::{Duration, Instant};

use egui::{Pos2, Vec2};
use log::debug;

use crate::command::History;
use crate::document::SharedDocument;
use crate::error::ToolLoopResult;
use crate::geometry::Point;
use crate::input::{PointerSample, VelocitySensor};
use crate::renderer::PreviewSink;
use crate::tools::{CommitReport, Pointer, ToolLoopManager, ToolLoopModifiers};

use super::delayed_mouse_move::DelayedMouseMove;

/// A press and release closer than this (in screen pixels) ...
const CLICK_MAX_DELTA: f32 = 4.0;
/// ... and quicker than this is a click, not a drag
const CLICK_MAX_TIME: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawingKind {
    Regular,
    /// Straight line from the last freehand point (Shift+click)
    LineFreehand,
}

/// What a button release means for the gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// The tool waits for more clicks (polygon, curve)
    MoreClicks,
    /// The gesture is finished and can be committed
    Done,
    /// A plain click with a selection tool: nothing to commit, the
    /// selection goes away
    Click,
}

/// The editor while a gesture is in progress
#[derive(Debug)]
pub struct DrawingState {
    manager: ToolLoopManager,
    kind: DrawingKind,
    delayed: DelayedMouseMove,
    velocity: VelocitySensor,
    last_pointer: Pointer,
    mouse_down_pos: Pos2,
    mouse_down_time: Instant,
    mouse_max_delta: Vec2,
    mouse_move_received: bool,
    mouse_press_received: bool,
}

impl DrawingState {
    /// Prepares the loop and presses the button at `pointer`
    pub fn start(
        mut manager: ToolLoopManager,
        kind: DrawingKind,
        pointer: Pointer,
        screen_pos: Pos2,
        now: Instant,
        sink: &mut dyn PreviewSink,
    ) -> ToolLoopResult<Self> {
        let delayed = DelayedMouseMove::new(manager.mouse_move_delay(), pointer.point);
        manager.prepare_loop(&pointer, sink)?;
        manager.press_button(&pointer, sink);
        Ok(Self {
            manager,
            kind,
            delayed,
            velocity: VelocitySensor::new(),
            last_pointer: pointer,
            mouse_down_pos: screen_pos,
            mouse_down_time: now,
            mouse_max_delta: Vec2::ZERO,
            mouse_move_received: false,
            mouse_press_received: false,
        })
    }

    pub fn manager(&self) -> &ToolLoopManager {
        &self.manager
    }

    pub fn kind(&self) -> DrawingKind {
        self.kind
    }

    pub fn is_canceled(&self) -> bool {
        self.manager.is_canceled()
    }

    /// Whether a button went down after the gesture started
    pub fn mouse_press_received(&self) -> bool {
        self.mouse_press_received
    }

    /// Straight line preview waiting for the click
    pub fn is_line_preview(&self) -> bool {
        self.kind == DrawingKind::LineFreehand && !self.mouse_press_received
    }

    pub fn on_mouse_down(&mut self, pointer: Pointer, sink: &mut dyn PreviewSink) {
        self.mouse_press_received = true;
        self.last_pointer = pointer;
        self.delayed.on_mouse_down(pointer.point);
        self.manager.press_button(&pointer, sink);
    }

    pub fn on_mouse_move(&mut self, sample: &PointerSample, point: Point, now: Instant, sink: &mut dyn PreviewSink) {
        self.velocity.update(sample.pos, now);
        self.last_pointer = Pointer {
            point,
            velocity: self.velocity.velocity(),
            kind: sample.kind,
            pressure: sample.pressure,
            ..self.last_pointer
        };

        self.mouse_move_received = true;
        let delta = sample.pos - self.mouse_down_pos;
        self.mouse_max_delta.x = self.mouse_max_delta.x.max(delta.x.abs());
        self.mouse_max_delta.y = self.mouse_max_delta.y.max(delta.y.abs());

        if let Some(point) = self.delayed.on_mouse_move(point, now) {
            self.send_movement(point, sink);
        }
    }

    /// Sends a move to the tool loop right away
    pub fn send_movement(&mut self, point: Point, sink: &mut dyn PreviewSink) {
        self.last_pointer.point = point;
        if !self.manager.is_canceled() {
            self.manager.movement(&self.last_pointer, sink);
        }
    }

    /// Commits a held back move once its delay elapsed
    pub fn tick(&mut self, now: Instant, sink: &mut dyn PreviewSink) {
        if let Some(point) = self.delayed.tick(now) {
            self.send_movement(point, sink);
        }
    }

    pub fn on_mouse_up(&mut self, pointer: Pointer, now: Instant, sink: &mut dyn PreviewSink) -> Release {
        if let Some(point) = self.delayed.on_mouse_up(pointer.point) {
            self.send_movement(point, sink);
        }
        self.last_pointer = Pointer {
            button: self.last_pointer.button,
            ..pointer
        };

        // A click with a selection tool in replace (or intersect) mode
        // deselects instead of selecting nothing
        let lp = self.manager.tool_loop();
        let selection_click = lp.ink().is_selection()
            && !lp.controller().is_one_point()
            && self.is_click(now)
            && (lp.modifiers().contains(ToolLoopModifiers::REPLACE_SELECTION)
                || lp.modifiers().contains(ToolLoopModifiers::INTERSECT_SELECTION));
        if selection_click {
            debug!("Selection click, nothing to select");
            return Release::Click;
        }

        if self.manager.release_button(&self.last_pointer, sink) {
            Release::MoreClicks
        } else {
            Release::Done
        }
    }

    pub fn notify_modifiers_change(&mut self, modifiers: ToolLoopModifiers, sink: &mut dyn PreviewSink) {
        if !self.manager.is_canceled() {
            self.manager.notify_modifiers_change(modifiers, sink);
        }
    }

    /// Press and release in about the same place, quickly enough
    fn is_click(&self, now: Instant) -> bool {
        !self.mouse_move_received
            || (self.mouse_max_delta.x < CLICK_MAX_DELTA
                && self.mouse_max_delta.y < CLICK_MAX_DELTA
                && now.saturating_duration_since(self.mouse_down_time) < CLICK_MAX_TIME)
    }

    pub fn end(
        self,
        commit: bool,
        doc: &SharedDocument,
        history: &mut dyn History,
        sink: &mut dyn PreviewSink,
    ) -> ToolLoopResult<Option<CommitReport>> {
        self.manager.end(commit, doc, history, sink)
    }
}
