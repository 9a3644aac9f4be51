use std::time::{Duration, Instant};

use egui::{Key, Modifiers, Pos2};
use pixel_paint::color::{rgba_geta, PixelFormat};
use pixel_paint::event::EventLog;
use pixel_paint::geometry::{Point, Rect};
use pixel_paint::input::PointerSample;
use pixel_paint::selection::Mask;
use pixel_paint::tools::{Button, FreehandAlgorithm};
use pixel_paint::{Document, Editor, EditorCommand, EditorEvent, EditorState, InputEvent, Preferences, ToolCatalog};

fn editor() -> (Editor, EventLog) {
    let mut doc = Document::new(PixelFormat::Rgb, 16, 16);
    doc.add_layer("Layer 1").unwrap();
    let editor = Editor::new(doc.into_shared(), ToolCatalog::bundled().unwrap(), Preferences::default());
    let log = EventLog::new();
    editor.bus().subscribe(Box::new(log.clone()));
    (editor, log)
}

fn sample(x: f32, y: f32) -> PointerSample {
    PointerSample::mouse(Pos2::new(x + 0.5, y + 0.5))
}

fn down(x: f32, y: f32, button: Button, modifiers: Modifiers) -> InputEvent {
    InputEvent::PointerDown {
        sample: sample(x, y),
        button,
        modifiers,
    }
}

fn up(x: f32, y: f32, button: Button, modifiers: Modifiers) -> InputEvent {
    InputEvent::PointerUp {
        sample: sample(x, y),
        button,
        modifiers,
    }
}

fn moved(x: f32, y: f32) -> InputEvent {
    InputEvent::PointerMove {
        sample: sample(x, y),
        modifiers: Modifiers::NONE,
    }
}

fn alpha_at(editor: &Editor, x: i32, y: i32) -> u8 {
    let doc = editor.document().read();
    let layer = doc.layer(doc.active_layer().unwrap()).unwrap();
    rgba_geta(layer.image().unwrap().get_pixel(x, y))
}

#[test]
fn test_pencil_drag_commits_one_step() {
    let (mut editor, log) = editor();
    let now = Instant::now();
    assert_eq!(editor.tool(), "pencil");

    editor.on_input(&down(1.0, 1.0, Button::Left, Modifiers::NONE), now);
    assert_eq!(editor.state(), EditorState::Drawing);
    editor.on_input(&moved(6.0, 1.0), now);
    editor.on_input(&up(6.0, 1.0, Button::Left, Modifiers::NONE), now);

    assert_eq!(editor.state(), EditorState::Standby);
    assert!(editor.drawing().is_none());
    assert_eq!(editor.history().len(), 1);
    assert_eq!(alpha_at(&editor, 3, 1), 255);
    assert_eq!(editor.last_point(), Some(Point::new(6, 1)));

    let events = log.events();
    assert!(events.contains(&EditorEvent::StateChanged {
        old: EditorState::Standby,
        new: EditorState::Drawing,
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, EditorEvent::GestureCommitted { dirty, .. } if *dirty == Rect::new(1, 1, 6, 1))));
    assert!(events.contains(&EditorEvent::HistoryChanged {
        can_undo: true,
        can_redo: false,
    }));

    editor.execute_command(EditorCommand::Undo);
    assert_eq!(alpha_at(&editor, 3, 1), 0);
    editor.execute_command(EditorCommand::Redo);
    assert_eq!(alpha_at(&editor, 3, 1), 255);
}

#[test]
fn test_escape_cancels_gesture() {
    let (mut editor, log) = editor();
    let now = Instant::now();

    editor.on_input(&down(1.0, 1.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&moved(9.0, 9.0), now);
    editor.on_input(
        &InputEvent::KeyUp {
            key: Key::Escape,
            modifiers: Modifiers::NONE,
        },
        now,
    );

    assert_eq!(editor.state(), EditorState::Standby);
    assert!(editor.history().is_empty());
    assert!(!editor.renderer().has_preview());
    assert_eq!(alpha_at(&editor, 5, 5), 0);
    assert!(log.events().iter().any(|e| matches!(e, EditorEvent::GestureCanceled { .. })));

    // The release after the cancel is ignored
    editor.on_input(&up(9.0, 9.0, Button::Left, Modifiers::NONE), now);
    assert!(editor.history().is_empty());
}

#[test]
fn test_undo_while_drawing_only_cancels() {
    let (mut editor, _log) = editor();
    let now = Instant::now();

    editor.on_input(&down(0.0, 0.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&up(0.0, 0.0, Button::Left, Modifiers::NONE), now);
    assert_eq!(editor.history().len(), 1);

    editor.on_input(&down(2.0, 2.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&moved(4.0, 2.0), now);
    editor.execute_command(EditorCommand::Undo);

    assert_eq!(editor.state(), EditorState::Standby);
    assert_eq!(alpha_at(&editor, 3, 2), 0);
    // The first dot is still there: the undo was used up by the cancel
    assert_eq!(editor.history().len(), 1);
    assert_eq!(alpha_at(&editor, 0, 0), 255);
}

#[test]
fn test_zoom_does_not_interrupt_gesture() {
    let (mut editor, _log) = editor();
    let now = Instant::now();

    editor.on_input(&down(1.0, 1.0, Button::Left, Modifiers::NONE), now);
    editor.execute_command(EditorCommand::ZoomIn);
    assert_eq!(editor.state(), EditorState::Drawing);
    assert_eq!(editor.viewport().zoom(), 2);
}

#[test]
fn test_other_button_cancels_gesture() {
    let (mut editor, _log) = editor();
    let now = Instant::now();

    editor.on_input(&down(1.0, 1.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&moved(5.0, 1.0), now);
    editor.on_input(&down(5.0, 1.0, Button::Right, Modifiers::NONE), now);

    assert_eq!(editor.state(), EditorState::Standby);
    assert!(editor.history().is_empty());
    assert_eq!(alpha_at(&editor, 3, 1), 0);
}

#[test]
fn test_middle_drag_scrolls() {
    let (mut editor, log) = editor();
    let now = Instant::now();

    editor.on_input(&down(10.0, 10.0, Button::Middle, Modifiers::NONE), now);
    assert_eq!(editor.state(), EditorState::Scrolling);
    editor.on_input(&moved(20.0, 15.0), now);
    editor.on_input(&up(20.0, 15.0, Button::Middle, Modifiers::NONE), now);

    assert_eq!(editor.state(), EditorState::Standby);
    assert_eq!(editor.viewport().scroll(), egui::Vec2::new(-10.0, -5.0));
    assert!(editor.history().is_empty());
    assert!(log.events().iter().any(|e| matches!(e, EditorEvent::ViewChanged { .. })));
}

#[test]
fn test_line_moves_wait_for_tick() {
    let (mut editor, _log) = editor();
    assert!(editor.set_tool("line"));
    let start = Instant::now();

    editor.on_input(&down(1.0, 1.0, Button::Left, Modifiers::NONE), start);
    editor.on_input(&moved(8.0, 1.0), start + Duration::from_millis(1));
    let dst_alpha = |editor: &Editor| {
        let lp = editor.drawing().unwrap().manager().tool_loop();
        rgba_geta(lp.dst().get_pixel(8, 1))
    };
    assert_eq!(dst_alpha(&editor), 0);

    editor.tick(start + Duration::from_millis(2));
    assert_eq!(dst_alpha(&editor), 0);
    editor.tick(start + Duration::from_millis(20));
    assert_eq!(dst_alpha(&editor), 255);

    editor.on_input(&up(8.0, 1.0, Button::Left, Modifiers::NONE), start + Duration::from_millis(21));
    assert_eq!(editor.history().len(), 1);
    assert_eq!(alpha_at(&editor, 8, 1), 255);
}

#[test]
fn test_shift_click_draws_line_from_last_point() {
    let (mut editor, _log) = editor();
    let now = Instant::now();

    // A dot sets where the line starts
    editor.on_input(&down(2.0, 2.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&up(2.0, 2.0, Button::Left, Modifiers::NONE), now);
    assert_eq!(editor.last_point(), Some(Point::new(2, 2)));

    // Holding Shift previews the line under the pointer
    editor.on_input(&moved(8.0, 2.0), now);
    editor.on_input(&InputEvent::ModifiersChanged(Modifiers::SHIFT), now);
    assert_eq!(editor.state(), EditorState::Drawing);
    assert!(editor.drawing().unwrap().is_line_preview());

    editor.on_input(&down(8.0, 2.0, Button::Left, Modifiers::SHIFT), now);
    editor.on_input(&up(8.0, 2.0, Button::Left, Modifiers::SHIFT), now);
    assert_eq!(editor.history().len(), 2);
    assert_eq!(alpha_at(&editor, 5, 2), 255);

    // Releasing Shift drops the next preview without recording anything
    assert!(editor.drawing().is_some_and(|d| d.is_line_preview()));
    editor.on_input(&InputEvent::ModifiersChanged(Modifiers::NONE), now);
    assert_eq!(editor.state(), EditorState::Standby);
    assert_eq!(editor.history().len(), 2);
}

#[test]
fn test_selection_click_deselects() {
    let (mut editor, _log) = editor();
    editor.document().write().set_mask(Mask::from_rect(Rect::new(0, 0, 4, 4)));
    assert!(editor.set_tool("rectangular_marquee"));
    let now = Instant::now();

    editor.on_input(&down(6.0, 6.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&up(6.0, 6.0, Button::Left, Modifiers::NONE), now);

    assert_eq!(editor.state(), EditorState::Standby);
    assert!(editor.document().read().mask().is_empty());
    assert_eq!(editor.history().len(), 1);

    editor.execute_command(EditorCommand::Undo);
    assert_eq!(editor.document().read().mask().bounds(), Rect::new(0, 0, 4, 4));
}

#[test]
fn test_unknown_tool_is_ignored() {
    let (mut editor, log) = editor();
    editor.execute_command(EditorCommand::SetTool("chisel".into()));
    assert_eq!(editor.tool(), "pencil");

    editor.execute_command(EditorCommand::SetTool("eraser".into()));
    assert_eq!(editor.tool(), "eraser");
    assert!(log.events().contains(&EditorEvent::ToolChanged {
        old: "pencil".into(),
        new: "eraser".into(),
    }));
}

#[test]
fn test_tool_preferences_apply_to_next_gesture() {
    let (mut editor, _log) = editor();
    editor.preferences_mut().tool_mut("pencil").freehand_algorithm = FreehandAlgorithm::PixelPerfect;
    let now = Instant::now();

    editor.on_input(&down(0.0, 0.0, Button::Left, Modifiers::NONE), now);
    editor.on_input(&moved(1.0, 0.0), now);
    editor.on_input(&moved(1.0, 1.0), now);
    editor.on_input(&moved(2.0, 1.0), now);
    editor.on_input(&up(2.0, 1.0, Button::Left, Modifiers::NONE), now);

    assert_eq!(alpha_at(&editor, 0, 0), 255);
    assert_eq!(alpha_at(&editor, 1, 0), 0);
    assert_eq!(alpha_at(&editor, 2, 1), 255);
}
