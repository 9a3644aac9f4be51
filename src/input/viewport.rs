use egui::{Pos2, Rect as ScreenRect, Vec2};
use log::debug;

use crate::geometry::{Point, Rect};

/// Zoom factors the editor steps through
pub const ZOOM_LEVELS: [i32; 12] = [1, 2, 3, 4, 6, 8, 12, 16, 24, 32, 48, 64];

/// Maps screen positions to canvas pixels. The canvas is shown at an
/// integer zoom, scrolled by a screen-space offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Screen position of the view's top-left corner
    origin: Pos2,
    /// Screen pixels scrolled away from the canvas origin
    scroll: Vec2,
    zoom: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(Pos2::ZERO)
    }
}

impl Viewport {
    pub fn new(origin: Pos2) -> Self {
        Self {
            origin,
            scroll: Vec2::ZERO,
            zoom: 1,
        }
    }

    pub fn origin(&self) -> Pos2 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Pos2) {
        self.origin = origin;
    }

    pub fn scroll(&self) -> Vec2 {
        self.scroll
    }

    pub fn zoom(&self) -> i32 {
        self.zoom
    }

    /// Canvas pixel under a screen position
    pub fn screen_to_canvas(&self, pos: Pos2) -> Point {
        let rel = pos - self.origin + self.scroll;
        let zoom = self.zoom as f32;
        Point::new((rel.x / zoom).floor() as i32, (rel.y / zoom).floor() as i32)
    }

    /// Top-left screen corner of a canvas pixel
    pub fn canvas_to_screen(&self, pt: Point) -> Pos2 {
        let zoom = self.zoom as f32;
        self.origin - self.scroll + Vec2::new(pt.x as f32 * zoom, pt.y as f32 * zoom)
    }

    pub fn canvas_to_screen_rect(&self, rect: Rect) -> ScreenRect {
        ScreenRect::from_min_max(
            self.canvas_to_screen(rect.origin()),
            self.canvas_to_screen(Point::new(rect.x + rect.w, rect.y + rect.h)),
        )
    }

    /// Moves the canvas with the pointer
    pub fn scroll_by(&mut self, delta: Vec2) {
        self.scroll -= delta;
    }

    /// Changes the zoom keeping the canvas point under `anchor` in place
    pub fn set_zoom_at(&mut self, zoom: i32, anchor: Pos2) {
        let zoom = zoom.clamp(ZOOM_LEVELS[0], ZOOM_LEVELS[ZOOM_LEVELS.len() - 1]);
        if zoom == self.zoom {
            return;
        }
        let rel = anchor - self.origin;
        let canvas = (rel + self.scroll) / self.zoom as f32;
        self.scroll = canvas * zoom as f32 - rel;
        debug!("Zoom {} -> {}", self.zoom, zoom);
        self.zoom = zoom;
    }

    pub fn zoom_in_at(&mut self, anchor: Pos2) {
        if let Some(&next) = ZOOM_LEVELS.iter().find(|&&z| z > self.zoom) {
            self.set_zoom_at(next, anchor);
        }
    }

    pub fn zoom_out_at(&mut self, anchor: Pos2) {
        if let Some(&prev) = ZOOM_LEVELS.iter().rev().find(|&&z| z < self.zoom) {
            self.set_zoom_at(prev, anchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_canvas_mapping() {
        let mut view = Viewport::new(Pos2::new(100.0, 50.0));
        view.set_zoom_at(4, Pos2::new(100.0, 50.0));
        assert_eq!(view.screen_to_canvas(Pos2::new(109.0, 53.9)), Point::new(2, 0));
        assert_eq!(view.screen_to_canvas(Pos2::new(99.0, 50.0)), Point::new(-1, 0));
        assert_eq!(view.canvas_to_screen(Point::new(2, 3)), Pos2::new(108.0, 62.0));
    }

    #[test]
    fn test_zoom_keeps_anchor() {
        let mut view = Viewport::default();
        let anchor = Pos2::new(40.0, 40.0);
        assert_eq!(view.screen_to_canvas(anchor), Point::new(40, 40));
        view.zoom_in_at(anchor);
        assert_eq!(view.zoom(), 2);
        assert_eq!(view.screen_to_canvas(anchor), Point::new(40, 40));
        view.zoom_out_at(anchor);
        view.zoom_out_at(anchor);
        assert_eq!(view.zoom(), 1);
    }

    #[test]
    fn test_scroll_follows_pointer() {
        let mut view = Viewport::default();
        view.scroll_by(Vec2::new(10.0, 0.0));
        assert_eq!(view.canvas_to_screen(Point::new(0, 0)), Pos2::new(10.0, 0.0));
    }
}
