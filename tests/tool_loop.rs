use std::time::Duration;

use pixel_paint::color::{rgba, rgba_geta, PixelFormat};
use pixel_paint::document::{Document, SharedDocument};
use pixel_paint::error::ToolLoopError;
use pixel_paint::geometry::{Grid, Point, Rect};
use pixel_paint::image::Image;
use pixel_paint::palette::Palette;
use pixel_paint::renderer::Renderer;
use pixel_paint::tools::{
    Button, FreehandAlgorithm, Pointer, ShadingTable, Symmetry, SymmetryMode, ToolCatalog, ToolLoopManager,
    ToolLoopParams,
};
use pixel_paint::CommandHistory;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rgb_doc() -> SharedDocument {
    let mut doc = Document::new(PixelFormat::Rgb, 16, 16);
    doc.add_layer("Layer 1").unwrap();
    doc.into_shared()
}

fn indexed_doc() -> SharedDocument {
    let mut doc = Document::new(PixelFormat::Indexed, 10, 8);
    doc.set_palette(Palette::new(vec![rgba(0, 0, 0, 0), rgba(255, 0, 0, 255)]));
    doc.set_transparent_index(0);
    doc.add_layer("Layer 1").unwrap();
    doc.into_shared()
}

fn params(tool: &str) -> ToolLoopParams {
    params_for(tool, Button::Left)
}

fn params_for(tool: &str, button: Button) -> ToolLoopParams {
    let catalog = ToolCatalog::bundled().unwrap();
    let mut params = ToolLoopParams::for_tool(catalog.get(tool).unwrap(), button);
    params.fg = rgba(0, 0, 255, 255);
    params
}

fn layer_pixel(doc: &SharedDocument, x: i32, y: i32) -> u32 {
    let doc = doc.read();
    let layer = doc.layer(doc.active_layer().unwrap()).unwrap();
    layer.image().unwrap().get_pixel(x, y)
}

fn layer_pixels(doc: &SharedDocument) -> Vec<u32> {
    let doc = doc.read();
    let layer = doc.layer(doc.active_layer().unwrap()).unwrap();
    layer.image().unwrap().pixels().to_vec()
}

/// Press at the first point, move through the rest, release at the last
fn drag(manager: &mut ToolLoopManager, sink: &mut Renderer, points: &[(i32, i32)]) {
    drag_with(manager, sink, Button::Left, points);
}

fn drag_with(manager: &mut ToolLoopManager, sink: &mut Renderer, button: Button, points: &[(i32, i32)]) {
    let (x, y) = points[0];
    let first = Pointer::at(x, y, button);
    manager.prepare_loop(&first, sink).unwrap();
    manager.press_button(&first, sink);
    for &(x, y) in &points[1..] {
        manager.movement(&Pointer::at(x, y, button), sink);
    }
    let (x, y) = points[points.len() - 1];
    assert!(!manager.release_button(&Pointer::at(x, y, button), sink));
}

fn fill_layer(doc: &SharedDocument, rect: Rect, color: u32) {
    let mut guard = doc.write();
    let id = guard.active_layer().unwrap();
    guard.layer_mut(id).unwrap().image_mut().unwrap().fill_rect(rect, color);
}

/// Runs a whole gesture and commits it
fn paint(doc: &SharedDocument, params: ToolLoopParams, button: Button, points: &[(i32, i32)]) -> CommandHistory {
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();
    let mut manager = ToolLoopManager::start(doc, params).unwrap();
    drag_with(&mut manager, &mut sink, button, points);
    manager.end(true, doc, &mut history, &mut sink).unwrap().unwrap();
    history
}

#[test]
fn test_line_on_indexed_document() {
    init_logger();
    let doc = indexed_doc();
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();
    let mut p = params("line");
    p.fg = 1;

    let mut manager = ToolLoopManager::start(&doc, p).unwrap();
    drag(&mut manager, &mut sink, &[(2, 3), (6, 3)]);
    let report = manager.end(true, &doc, &mut history, &mut sink).unwrap().unwrap();

    assert!(report.transaction_id.is_some());
    assert_eq!(report.dirty, Rect::new(2, 3, 5, 1));
    assert_eq!(history.len(), 1);
    let tx = history.last().unwrap();
    assert_eq!(Some(tx.id), report.transaction_id);
    assert_eq!(tx.cel.as_ref().unwrap().bounds, Rect::new(2, 3, 5, 1));

    for x in 2..=6 {
        assert_eq!(layer_pixel(&doc, x, 3), 1);
    }
    assert_eq!(layer_pixel(&doc, 1, 3), 0);
    assert_eq!(layer_pixel(&doc, 7, 3), 0);
    assert_eq!(layer_pixel(&doc, 4, 2), 0);
}

#[test]
fn test_commit_matches_preview() {
    let doc = rgb_doc();
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();

    let mut manager = ToolLoopManager::start(&doc, params("pencil")).unwrap();
    drag(&mut manager, &mut sink, &[(1, 1), (8, 4), (3, 12)]);
    assert!(sink.has_preview());
    let preview = manager.tool_loop().dst().pixels().to_vec();
    assert_eq!(manager.tool_loop().dst().get_pixel(8, 4), rgba(0, 0, 255, 255));
    assert_eq!(manager.tool_loop().dst().get_pixel(3, 12), rgba(0, 0, 255, 255));

    manager.end(true, &doc, &mut history, &mut sink).unwrap().unwrap();
    assert!(!sink.has_preview());
    assert_eq!(layer_pixels(&doc), preview);
}

#[test]
fn test_replayed_stroke_gives_same_pixels() {
    let stroke = [(2, 2), (9, 5), (4, 13), (14, 14)];
    let replay = || {
        let doc = rgb_doc();
        let mut history = CommandHistory::new();
        let mut sink = Renderer::new();
        let mut manager = ToolLoopManager::start(&doc, params("pencil")).unwrap();
        drag(&mut manager, &mut sink, &stroke);
        manager.end(true, &doc, &mut history, &mut sink).unwrap();
        layer_pixels(&doc)
    };
    assert_eq!(replay(), replay());
}

#[test]
fn test_cancel_leaves_no_trace() {
    let doc = rgb_doc();
    let before = layer_pixels(&doc);
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();

    let mut manager = ToolLoopManager::start(&doc, params("pencil")).unwrap();
    drag(&mut manager, &mut sink, &[(1, 1), (8, 8)]);
    manager.cancel(&mut sink);
    manager.cancel(&mut sink);
    assert!(manager.is_canceled());

    let report = manager.end(true, &doc, &mut history, &mut sink).unwrap();
    assert!(report.is_none());
    assert!(history.is_empty());
    assert!(!sink.has_preview());
    assert_eq!(layer_pixels(&doc), before);
}

#[test]
fn test_locked_document_refuses_gesture() {
    let doc = rgb_doc();
    let mut p = params("pencil");
    p.lock_wait = Duration::from_millis(5);

    let guard = doc.write();
    let err = ToolLoopManager::start(&doc, p).unwrap_err();
    assert_eq!(err, ToolLoopError::DocumentLocked);
    drop(guard);
}

#[test]
fn test_locked_document_at_commit_rolls_back() {
    init_logger();
    let doc = rgb_doc();
    let before = layer_pixels(&doc);
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();
    let mut p = params("pencil");
    p.lock_wait = Duration::from_millis(5);

    let mut manager = ToolLoopManager::start(&doc, p.clone()).unwrap();
    drag(&mut manager, &mut sink, &[(1, 1), (5, 5)]);
    {
        let guard = doc.read();
        let err = manager.end(true, &doc, &mut history, &mut sink).unwrap_err();
        assert_eq!(err, ToolLoopError::DocumentLocked);
        drop(guard);
    }
    assert!(!sink.has_preview());
    assert!(history.is_empty());
    assert_eq!(layer_pixels(&doc), before);

    // The aborted transaction doesn't block the next gesture
    let mut manager = ToolLoopManager::start(&doc, p).unwrap();
    drag(&mut manager, &mut sink, &[(1, 1), (5, 5)]);
    assert!(manager.end(true, &doc, &mut history, &mut sink).unwrap().is_some());
    assert_eq!(history.len(), 1);
}

#[test]
fn test_scratch_budget_and_locked_layer() {
    let doc = rgb_doc();
    let mut p = params("pencil");
    p.scratch_budget = 16;
    assert!(matches!(
        ToolLoopManager::start(&doc, p),
        Err(ToolLoopError::OutOfMemory { .. })
    ));

    {
        let mut guard = doc.write();
        let id = guard.active_layer().unwrap();
        guard.layer_mut(id).unwrap().editable = false;
    }
    assert_eq!(
        ToolLoopManager::start(&doc, params("pencil")).unwrap_err(),
        ToolLoopError::LayerNotEditable
    );
}

#[test]
fn test_freehand_lines_are_continuous() {
    let doc = rgb_doc();
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();

    let mut manager = ToolLoopManager::start(&doc, params("pencil")).unwrap();
    drag(&mut manager, &mut sink, &[(0, 0), (5, 0), (5, 4)]);
    manager.end(true, &doc, &mut history, &mut sink).unwrap();

    for x in 0..=5 {
        assert_eq!(rgba_geta(layer_pixel(&doc, x, 0)), 255);
    }
    for y in 0..=4 {
        assert_eq!(rgba_geta(layer_pixel(&doc, 5, y)), 255);
    }
    assert_eq!(rgba_geta(layer_pixel(&doc, 4, 1)), 0);
}

#[test]
fn test_pixel_perfect_drops_corners() {
    let doc = rgb_doc();
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();
    let mut p = params("pencil");
    p.freehand_algorithm = FreehandAlgorithm::PixelPerfect;

    let mut manager = ToolLoopManager::start(&doc, p).unwrap();
    drag(&mut manager, &mut sink, &[(0, 0), (1, 0), (1, 1), (2, 1)]);
    manager.end(true, &doc, &mut history, &mut sink).unwrap();

    assert_eq!(rgba_geta(layer_pixel(&doc, 0, 0)), 255);
    assert_eq!(rgba_geta(layer_pixel(&doc, 1, 0)), 0);
    assert_eq!(rgba_geta(layer_pixel(&doc, 1, 1)), 255);
    assert_eq!(rgba_geta(layer_pixel(&doc, 2, 1)), 255);
}

#[test]
fn test_alpha_usage_follows_committed_trace() {
    let doc = rgb_doc();
    {
        let mut guard = doc.write();
        let id = guard.active_layer().unwrap();
        let image = guard.layer_mut(id).unwrap().image_mut().unwrap();
        image.fill_rect(Rect::new(0, 3, 16, 1), rgba(255, 255, 255, 255));
    }
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();
    let mut p = params("line");
    p.fg = rgba(0, 0, 255, 128);

    let mut manager = ToolLoopManager::start(&doc, p).unwrap();
    let first = Pointer::at(2, 3, Button::Left);
    manager.prepare_loop(&first, &mut sink).unwrap();
    manager.press_button(&first, &mut sink);
    // Over transparent pixels the trace is translucent
    manager.movement(&Pointer::at(2, 10, Button::Left), &mut sink);
    assert!(manager.tool_loop().uses_alpha());

    // Over the opaque row it isn't, and only that trace is kept
    manager.movement(&Pointer::at(6, 3, Button::Left), &mut sink);
    assert!(!manager.release_button(&Pointer::at(6, 3, Button::Left), &mut sink));
    let report = manager.end(true, &doc, &mut history, &mut sink).unwrap().unwrap();
    assert_eq!(report.dirty, Rect::new(2, 3, 5, 1));
    assert!(!report.uses_alpha);
    assert_eq!(rgba_geta(layer_pixel(&doc, 4, 3)), 255);
}

#[test]
fn test_translucent_eraser_fades_pixels() {
    let doc = rgb_doc();
    fill_layer(&doc, Rect::new(0, 4, 16, 1), rgba(255, 0, 0, 255));
    let mut p = params("eraser");
    p.opacity = 128;

    paint(&doc, p, Button::Left, &[(2, 4), (6, 4)]);
    for x in 2..=6 {
        assert_eq!(layer_pixel(&doc, x, 4), rgba(255, 0, 0, 127));
    }
    assert_eq!(layer_pixel(&doc, 7, 4), rgba(255, 0, 0, 255));
}

#[test]
fn test_right_eraser_replaces_fg_with_bg() {
    let doc = rgb_doc();
    fill_layer(&doc, Rect::new(0, 4, 8, 1), rgba(0, 0, 255, 255));
    fill_layer(&doc, Rect::new(8, 4, 8, 1), rgba(255, 0, 0, 255));

    paint(&doc, params_for("eraser", Button::Right), Button::Right, &[(2, 4), (12, 4)]);
    for x in 2..8 {
        assert_eq!(layer_pixel(&doc, x, 4), rgba(255, 255, 255, 255));
    }
    for x in 8..=12 {
        assert_eq!(layer_pixel(&doc, x, 4), rgba(255, 0, 0, 255));
    }
    assert_eq!(layer_pixel(&doc, 1, 4), rgba(0, 0, 255, 255));
}

#[test]
fn test_shading_steps_along_the_ramp() {
    let doc = rgb_doc();
    let (dark, mid, light) = (rgba(0, 0, 0, 255), rgba(128, 128, 128, 255), rgba(255, 255, 255, 255));
    fill_layer(&doc, Rect::new(0, 5, 4, 1), mid);
    fill_layer(&doc, Rect::new(4, 5, 4, 1), rgba(0, 255, 0, 255));
    let ramp = ShadingTable::Colors(vec![dark, mid, light]);
    let mut p = params("shading");
    p.shading = Some(ramp.clone());

    paint(&doc, p, Button::Left, &[(1, 5), (6, 5)]);
    assert_eq!(layer_pixel(&doc, 2, 5), dark);
    assert_eq!(layer_pixel(&doc, 0, 5), mid);
    // Off the ramp
    assert_eq!(layer_pixel(&doc, 5, 5), rgba(0, 255, 0, 255));

    let mut right = params_for("shading", Button::Right);
    right.shading = Some(ramp);
    paint(&doc, right, Button::Right, &[(0, 5)]);
    assert_eq!(layer_pixel(&doc, 0, 5), light);
}

#[test]
fn test_gradient_runs_from_fg_to_bg() {
    let doc = rgb_doc();
    paint(&doc, params("gradient"), Button::Left, &[(0, 5), (15, 5)]);

    let reds: Vec<u32> = (0..16).map(|x| layer_pixel(&doc, x, 9)).map(|c| c & 0xff).collect();
    assert!(reds.windows(2).all(|w| w[0] <= w[1]));
    assert!(reds[0] < 16 && reds[15] > 240);
    assert_eq!(rgba_geta(layer_pixel(&doc, 8, 0)), 255);
    assert_eq!(layer_pixel(&doc, 3, 2) & 0xff, reds[3]);
}

#[test]
fn test_symmetry_mirrors_the_stroke() {
    let doc = rgb_doc();
    let mut p = params("pencil");
    p.symmetry = Some(Symmetry::new(SymmetryMode::Horizontal, 8.0, 0.0));

    let history = paint(&doc, p, Button::Left, &[(2, 3), (4, 3)]);
    for x in 2..=4 {
        assert_eq!(layer_pixel(&doc, x, 3), rgba(0, 0, 255, 255));
        assert_eq!(layer_pixel(&doc, 15 - x, 3), rgba(0, 0, 255, 255));
    }
    assert_eq!(rgba_geta(layer_pixel(&doc, 8, 3)), 0);
    assert_eq!(history.last().unwrap().cel.as_ref().unwrap().bounds, Rect::new(2, 3, 12, 1));
}

#[test]
fn test_painting_a_tile_updates_every_instance() {
    let mut doc = Document::new(PixelFormat::Rgb, 16, 8);
    let id = doc.add_tilemap_layer("Tiles", Grid::new(Point::new(0, 0), 8, 8)).unwrap();
    {
        let tm = doc.layer_mut(id).unwrap().tilemap_mut().unwrap();
        let mut tile = Image::try_new(PixelFormat::Rgb, 8, 8).unwrap();
        tile.clear(rgba(0, 0, 0, 0));
        let index = tm.add_tile(tile);
        tm.set_tile(Point::new(0, 0), index);
        tm.set_tile(Point::new(1, 0), index);
    }
    let doc = doc.into_shared();
    let mut history = CommandHistory::new();
    let mut sink = Renderer::new();

    let mut manager = ToolLoopManager::start(&doc, params("pencil")).unwrap();
    drag(&mut manager, &mut sink, &[(2, 2)]);
    // The other cell shows the edit while the gesture runs
    assert_eq!(manager.tool_loop().dst().get_pixel(10, 2), rgba(0, 0, 255, 255));
    let report = manager.end(true, &doc, &mut history, &mut sink).unwrap().unwrap();
    assert_eq!(report.dirty, Rect::new(0, 0, 16, 8));

    let tx = history.last().unwrap();
    assert!(tx.cel.is_none());
    assert_eq!(tx.tiles.len(), 1);
    assert_eq!(tx.tiles[0].index, 1);
    assert_eq!(tx.tiles[0].after.get_pixel(2, 2), rgba(0, 0, 255, 255));
    assert_eq!(rgba_geta(tx.tiles[0].before.get_pixel(2, 2)), 0);

    let guard = doc.read();
    let tile = guard.layer(id).unwrap().tilemap().unwrap().tile_image(1).unwrap();
    assert_eq!(tile.get_pixel(2, 2), rgba(0, 0, 255, 255));
}
