//! The editor owns the document and everything around it, and routes
//! input to the state it's in.

use std::time::{Duration, Instant};

use egui::{ColorImage, Key, Modifiers, Pos2};
use log::{debug, info, warn};

use crate::brush::Brush;
use crate::color::ColorValue;
use crate::command::{CommandHistory, EditorCommand, History, MaskPatch, Transaction};
use crate::config::Preferences;
use crate::document::{write_document, SharedDocument};
use crate::error::StateTransitionError;
use crate::event::{EditorEvent, EventBus};
use crate::geometry::{Point, Region};
use crate::input::{is_straight_line_modifier, tool_loop_modifiers, InputEvent, PointerSample, Viewport};
use crate::layer::LayerId;
use crate::renderer::Renderer;
use crate::selection::Mask;
use crate::util::time::current_time_secs;
use crate::tools::{
    Button, Controller, Pointer, ToolButtonConfig, ToolCatalog, ToolLoopManager, ToolLoopParams,
};

use super::drawing::{DrawingKind, DrawingState, Release};
use super::EditorState;

/// Screen pixels of vertical drag per zoom step
const ZOOM_DRAG_STEP: f32 = 16.0;

#[derive(Debug)]
pub struct Editor {
    doc: SharedDocument,
    catalog: ToolCatalog,
    prefs: Preferences,
    history: CommandHistory,
    renderer: Renderer,
    bus: EventBus,
    viewport: Viewport,
    state: EditorState,
    drawing: Option<DrawingState>,
    tool: String,
    fg: ColorValue,
    bg: ColorValue,
    brush: Brush,
    /// Where the next Shift+click line starts
    last_point: Option<Point>,
    modifiers: Modifiers,
    space: bool,
    hover: Option<PointerSample>,
    /// Screen position where scrolling or zooming was last applied
    drag_anchor: Pos2,
    zoom_anchor: Pos2,
}

impl Editor {
    pub fn new(doc: SharedDocument, catalog: ToolCatalog, prefs: Preferences) -> Self {
        let tool = catalog
            .get("pencil")
            .or_else(|| catalog.tools().first())
            .map(|tool| tool.id.clone())
            .unwrap_or_default();
        Self {
            doc,
            catalog,
            prefs,
            history: CommandHistory::new(),
            renderer: Renderer::new(),
            bus: EventBus::new(),
            viewport: Viewport::default(),
            state: EditorState::Standby,
            drawing: None,
            tool,
            fg: crate::color::rgba(0, 0, 0, 255),
            bg: crate::color::rgba(255, 255, 255, 255),
            brush: Brush::default(),
            last_point: None,
            modifiers: Modifiers::NONE,
            space: false,
            hover: None,
            drag_anchor: Pos2::ZERO,
            zoom_anchor: Pos2::ZERO,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn drawing(&self) -> Option<&DrawingState> {
        self.drawing.as_ref()
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Changes apply from the next gesture on
    pub fn preferences_mut(&mut self) -> &mut Preferences {
        &mut self.prefs
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Primary and secondary colors, in the document's pixel format
    pub fn set_colors(&mut self, fg: ColorValue, bg: ColorValue) {
        self.fg = fg;
        self.bg = bg;
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    /// Where a Shift+click line would start
    pub fn last_point(&self) -> Option<Point> {
        self.last_point
    }

    fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.prefs.editor.lock_wait_ms)
    }

    /// Renders the document with the gesture preview. A busy document
    /// gives a placeholder of `placeholder_size`.
    pub fn render(&self, placeholder_size: [usize; 2]) -> ColorImage {
        self.renderer.render(&self.doc, self.lock_wait(), placeholder_size)
    }

    pub fn transition_to(&mut self, new_state: EditorState) -> Result<(), StateTransitionError> {
        if !self.state.can_transition_to(&new_state) {
            return Err(StateTransitionError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        let old = self.state;
        self.state = new_state;
        debug!("Editor state {:?} -> {:?}", old, new_state);
        self.bus.emit(EditorEvent::StateChanged { old, new: new_state });
        Ok(())
    }

    fn back_to_standby(&mut self) {
        if let Err(err) = self.transition_to(EditorState::Standby) {
            debug!("{}", err);
        }
    }

    /// Selects another tool. Unknown ids are ignored.
    pub fn set_tool(&mut self, id: &str) -> bool {
        if self.catalog.get(id).is_none() {
            warn!("There is no tool '{}'", id);
            return false;
        }
        if self.tool != id {
            let old = std::mem::replace(&mut self.tool, id.to_string());
            info!("Tool changed from '{}' to '{}'", old, id);
            self.bus.emit(EditorEvent::ToolChanged { old, new: id.to_string() });
        }
        true
    }

    pub fn on_input(&mut self, event: &InputEvent, now: Instant) {
        match event {
            InputEvent::PointerDown {
                sample,
                button,
                modifiers,
            } => {
                self.modifiers = *modifiers;
                self.hover = Some(*sample);
                self.on_mouse_down(sample, *button, now);
            }
            InputEvent::PointerUp {
                sample,
                button,
                modifiers,
            } => {
                self.modifiers = *modifiers;
                self.hover = Some(*sample);
                self.on_mouse_up(sample, *button, now);
            }
            InputEvent::PointerMove { sample, .. } => {
                self.hover = Some(*sample);
                self.on_mouse_move(sample, now);
            }
            InputEvent::PointerLeave => self.hover = None,
            InputEvent::ModifiersChanged(modifiers) => self.on_modifiers_changed(*modifiers, now),
            InputEvent::KeyDown { key: Key::Space, .. } => {
                self.space = true;
                self.on_modifiers_changed(self.modifiers, now);
            }
            InputEvent::KeyDown { .. } => {}
            InputEvent::KeyUp { key: Key::Escape, .. } => {
                if self.drawing.is_some() {
                    info!("Gesture canceled with Esc");
                    self.finish_drawing(false);
                }
            }
            InputEvent::KeyUp { key: Key::Space, .. } => {
                self.space = false;
                self.on_modifiers_changed(self.modifiers, now);
            }
            InputEvent::KeyUp { .. } => {}
            InputEvent::Wheel { delta, modifiers } => self.on_wheel(delta.y, *modifiers),
        }
        self.flush_invalid_region();
    }

    /// Runs timers: held back mouse moves are committed here
    pub fn tick(&mut self, now: Instant) {
        if let Some(drawing) = self.drawing.as_mut() {
            drawing.tick(now, &mut self.renderer);
            self.emit_status_text();
        }
        self.flush_invalid_region();
    }

    pub fn execute_command(&mut self, command: EditorCommand) {
        if command.interrupts_gesture() {
            if let Some(drawing) = &self.drawing {
                // Commands typed while only previewing a Shift line still run
                let preview_only = drawing.is_line_preview();
                info!("{:?} interrupts the gesture", command);
                self.finish_drawing(false);
                if command.is_consumed_by_gesture() && !preview_only {
                    self.flush_invalid_region();
                    return;
                }
            }
        }

        match command {
            EditorCommand::Undo => self.undo(),
            EditorCommand::Redo => self.redo(),
            EditorCommand::Cancel => {}
            EditorCommand::ZoomIn => {
                let anchor = self.zoom_target();
                self.viewport.zoom_in_at(anchor);
                self.emit_view_changed();
            }
            EditorCommand::ZoomOut => {
                let anchor = self.zoom_target();
                self.viewport.zoom_out_at(anchor);
                self.emit_view_changed();
            }
            EditorCommand::SetTool(id) => {
                self.set_tool(&id);
            }
            EditorCommand::Deselect => self.deselect(),
        }
        self.flush_invalid_region();
    }

    fn on_mouse_down(&mut self, sample: &PointerSample, button: Button, now: Instant) {
        match self.state {
            EditorState::Standby => {
                if button == Button::Middle || (button == Button::Left && self.space) {
                    let next = if self.modifiers.command {
                        EditorState::Zooming
                    } else {
                        EditorState::Scrolling
                    };
                    self.drag_anchor = sample.pos;
                    self.zoom_anchor = sample.pos;
                    self.back_to(next);
                    return;
                }
                let straight = is_straight_line_modifier(self.modifiers);
                self.start_drawing(sample, button, now, straight);
            }
            EditorState::Drawing => {
                let Some(drawing) = self.drawing.as_mut() else {
                    return;
                };
                let point = self.viewport.screen_to_canvas(sample.pos);
                let loop_button = drawing.manager().tool_loop().button();

                // Right click on a Shift line preview redraws it with the
                // other button
                if drawing.is_line_preview() && button != loop_button {
                    self.finish_drawing(false);
                    self.start_drawing(sample, button, now, true);
                    if let Some(drawing) = self.drawing.as_mut() {
                        drawing.on_mouse_down(pointer(sample, point, button), &mut self.renderer);
                    }
                } else {
                    drawing.on_mouse_down(pointer(sample, point, button), &mut self.renderer);
                }
                if self.drawing.as_ref().is_some_and(|d| d.is_canceled()) {
                    self.finish_drawing(false);
                }
            }
            EditorState::Scrolling | EditorState::Zooming => {}
        }
    }

    fn on_mouse_up(&mut self, sample: &PointerSample, button: Button, now: Instant) {
        match self.state {
            EditorState::Scrolling | EditorState::Zooming => self.back_to_standby(),
            EditorState::Drawing => {
                let point = self.viewport.screen_to_canvas(sample.pos);
                let Some(drawing) = self.drawing.as_mut() else {
                    return;
                };
                match drawing.on_mouse_up(pointer(sample, point, button), now, &mut self.renderer) {
                    Release::MoreClicks => self.emit_status_text(),
                    Release::Done => self.finish_drawing(true),
                    Release::Click => {
                        self.finish_drawing(false);
                        self.deselect();
                    }
                }
                // Shift still down: the next line starts from here
                if self.drawing.is_none()
                    && self.prefs.editor.straight_line_preview
                    && is_straight_line_modifier(self.modifiers)
                {
                    self.start_line_preview(sample, now);
                }
            }
            EditorState::Standby => {}
        }
    }

    fn on_mouse_move(&mut self, sample: &PointerSample, now: Instant) {
        match self.state {
            EditorState::Drawing => {
                let point = self.viewport.screen_to_canvas(sample.pos);
                if let Some(drawing) = self.drawing.as_mut() {
                    drawing.on_mouse_move(sample, point, now, &mut self.renderer);
                    self.emit_status_text();
                }
            }
            EditorState::Scrolling => {
                self.viewport.scroll_by(sample.pos - self.drag_anchor);
                self.drag_anchor = sample.pos;
                self.emit_view_changed();
            }
            EditorState::Zooming => {
                let dy = sample.pos.y - self.drag_anchor.y;
                if dy.abs() >= ZOOM_DRAG_STEP {
                    if dy < 0.0 {
                        self.viewport.zoom_in_at(self.zoom_anchor);
                    } else {
                        self.viewport.zoom_out_at(self.zoom_anchor);
                    }
                    self.drag_anchor = sample.pos;
                    self.emit_view_changed();
                }
            }
            EditorState::Standby => {}
        }
    }

    fn on_modifiers_changed(&mut self, modifiers: Modifiers, now: Instant) {
        self.modifiers = modifiers;
        match self.drawing.as_mut() {
            Some(drawing) => {
                if drawing.is_line_preview() && !is_straight_line_modifier(modifiers) {
                    debug!("Shift released, dropping the line preview");
                    self.finish_drawing(false);
                    return;
                }
                let config = drawing.manager().tool_loop().params().config;
                let mods = tool_loop_modifiers(modifiers, self.space, &config);
                drawing.notify_modifiers_change(mods, &mut self.renderer);
                self.emit_status_text();
            }
            None => {
                if self.state.is_standby()
                    && self.prefs.editor.straight_line_preview
                    && is_straight_line_modifier(modifiers)
                {
                    if let Some(sample) = self.hover {
                        self.start_line_preview(&sample, now);
                    }
                }
            }
        }
    }

    fn on_wheel(&mut self, dy: f32, modifiers: Modifiers) {
        if dy == 0.0 {
            return;
        }
        if modifiers.command {
            let anchor = self.zoom_target();
            if dy > 0.0 {
                self.viewport.zoom_in_at(anchor);
            } else {
                self.viewport.zoom_out_at(anchor);
            }
        } else {
            self.viewport.scroll_by(egui::Vec2::new(0.0, dy));
        }
        self.emit_view_changed();
    }

    fn back_to(&mut self, state: EditorState) {
        if let Err(err) = self.transition_to(state) {
            warn!("{}", err);
        }
    }

    fn zoom_target(&self) -> Pos2 {
        self.hover.map(|s| s.pos).unwrap_or_else(|| self.viewport.origin())
    }

    /// Start of a Shift+click line for a tool configured as `config`
    fn straight_line_start(&self, config: &ToolButtonConfig) -> Option<Point> {
        let freehand_paint = config.controller == Controller::Freehand
            && config.ink.is_paint()
            && !config.point_shape.is_flood_fill();
        self.last_point.filter(|_| freehand_paint)
    }

    /// Shift held without a click: the line follows the pointer until
    /// the button goes down
    fn start_line_preview(&mut self, sample: &PointerSample, now: Instant) {
        let Some(tool) = self.catalog.get(&self.tool) else {
            return;
        };
        if self.straight_line_start(&tool.left).is_some() {
            self.start_drawing(sample, Button::Left, now, true);
        }
    }

    fn start_drawing(&mut self, sample: &PointerSample, button: Button, now: Instant, straight: bool) {
        let Some(tool) = self.catalog.get(&self.tool).cloned() else {
            warn!("No tool selected");
            return;
        };
        let mut params = ToolLoopParams::from_preferences(
            &tool,
            button,
            &self.prefs.editor,
            &self.prefs.tool(&tool.id),
            self.fg,
            self.bg,
            self.brush.clone(),
        );
        params.seed = current_time_secs().to_bits();

        let line_from = straight.then(|| self.straight_line_start(&params.config)).flatten();
        let kind = match line_from {
            Some(_) => {
                params.config.controller = Controller::LineFreehand;
                DrawingKind::LineFreehand
            }
            None => DrawingKind::Regular,
        };
        params.modifiers = tool_loop_modifiers(self.modifiers, self.space, &params.config);

        let manager = match ToolLoopManager::start(&self.doc, params) {
            Ok(manager) => manager,
            Err(err) => {
                self.bus.emit(EditorEvent::Notice(err.to_string()));
                return;
            }
        };
        let layer = manager.tool_loop().layer();
        self.back_to(EditorState::Drawing);

        let point = self.viewport.screen_to_canvas(sample.pos);
        let first = pointer(sample, line_from.unwrap_or(point), button);
        let mut drawing = match DrawingState::start(manager, kind, first, sample.pos, now, &mut self.renderer) {
            Ok(drawing) => drawing,
            Err(err) => {
                self.bus.emit(EditorEvent::Notice(err.to_string()));
                self.bus.emit(EditorEvent::GestureCanceled { tool: tool.id });
                self.back_to_standby();
                return;
            }
        };
        self.bus.emit(EditorEvent::GestureStarted { tool: tool.id, layer });
        if line_from.is_some() {
            drawing.send_movement(point, &mut self.renderer);
        }
        self.drawing = Some(drawing);
        self.emit_status_text();
    }

    /// Ends the gesture in progress, committing it or not
    fn finish_drawing(&mut self, commit: bool) {
        let Some(drawing) = self.drawing.take() else {
            return;
        };
        let tool = drawing.manager().tool_loop().params().tool_id.clone();
        let last_point = drawing.manager().last_freehand_point();

        match drawing.end(commit, &self.doc, &mut self.history, &mut self.renderer) {
            Ok(Some(report)) => {
                if last_point.is_some() {
                    self.last_point = last_point;
                }
                self.bus.emit(EditorEvent::GestureCommitted {
                    tool,
                    transaction: report.transaction_id,
                    dirty: report.dirty,
                });
                self.emit_history_changed();
            }
            Ok(None) => self.bus.emit(EditorEvent::GestureCanceled { tool }),
            Err(err) => {
                self.bus.emit(EditorEvent::Notice(err.to_string()));
                self.bus.emit(EditorEvent::GestureCanceled { tool });
            }
        }
        self.back_to_standby();
    }

    fn undo(&mut self) {
        let dirty = match write_document(&self.doc, self.lock_wait()) {
            Ok(mut doc) => self.history.undo(&mut doc),
            Err(err) => {
                self.bus.emit(EditorEvent::Notice(err.to_string()));
                return;
            }
        };
        self.after_history_step(dirty);
    }

    fn redo(&mut self) {
        let dirty = match write_document(&self.doc, self.lock_wait()) {
            Ok(mut doc) => self.history.redo(&mut doc),
            Err(err) => {
                self.bus.emit(EditorEvent::Notice(err.to_string()));
                return;
            }
        };
        self.after_history_step(dirty);
    }

    fn after_history_step(&mut self, dirty: Option<Region>) {
        if let Some(dirty) = dirty {
            self.bus.emit(EditorEvent::Invalidate(dirty));
            self.emit_history_changed();
        }
    }

    /// Clears the selection as one undo step
    fn deselect(&mut self) {
        let mut doc = match write_document(&self.doc, self.lock_wait()) {
            Ok(doc) => doc,
            Err(err) => {
                self.bus.emit(EditorEvent::Notice(err.to_string()));
                return;
            }
        };
        if doc.mask().is_empty() {
            return;
        }
        let id = match self.history.begin_cel_transaction("deselect") {
            Ok(id) => id,
            Err(err) => {
                warn!("Can't deselect: {}", err);
                return;
            }
        };
        let layer = doc.active_layer().unwrap_or(LayerId::new(0));
        let mut tx = Transaction::new(id, "deselect", layer);
        tx.dirty = Region::from_rect(doc.mask().bounds());
        tx.mask = Some(MaskPatch {
            before: doc.mask().clone(),
            after: Mask::new(),
        });
        let dirty = tx.dirty.clone();
        match self.history.commit_cel_transaction(&mut doc, tx) {
            Ok(_) => {
                drop(doc);
                info!("Deselected");
                self.bus.emit(EditorEvent::Invalidate(dirty));
                self.emit_history_changed();
            }
            Err(err) => {
                self.history.abort_cel_transaction(id);
                warn!("Can't deselect: {}", err);
            }
        }
    }

    fn emit_status_text(&self) {
        if let Some(drawing) = &self.drawing {
            let text = drawing.manager().status_text();
            if !text.is_empty() {
                self.bus.emit(EditorEvent::StatusText(text.to_string()));
            }
        }
    }

    fn emit_view_changed(&self) {
        self.bus.emit(EditorEvent::ViewChanged {
            zoom: self.viewport.zoom(),
            scroll: self.viewport.scroll(),
        });
    }

    fn emit_history_changed(&self) {
        self.bus.emit(EditorEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    fn flush_invalid_region(&mut self) {
        let region = self.renderer.take_invalid_region();
        if !region.is_empty() {
            self.bus.emit(EditorEvent::Invalidate(region));
        }
    }
}

fn pointer(sample: &PointerSample, point: Point, button: Button) -> Pointer {
    Pointer {
        point,
        velocity: egui::Vec2::ZERO,
        button,
        kind: sample.kind,
        pressure: sample.pressure,
    }
}
