use egui::Vec2;

use crate::geometry::Point;

/// Mouse button that drives a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Button {
    #[default]
    None,
    Left,
    Right,
    Middle,
}

/// Input device the sample comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerType {
    #[default]
    Unknown,
    Mouse,
    Pen,
    Eraser,
}

/// One pointer sample, already in canvas coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub point: Point,
    /// Screen pixels per 50ms, as measured by the velocity sensor
    pub velocity: Vec2,
    pub button: Button,
    pub kind: PointerType,
    /// 0.0..=1.0, only meaningful for pens
    pub pressure: f32,
}

impl Pointer {
    pub fn new(point: Point, button: Button) -> Self {
        Self {
            point,
            velocity: Vec2::ZERO,
            button,
            kind: PointerType::Mouse,
            pressure: 1.0,
        }
    }

    pub fn at(x: i32, y: i32, button: Button) -> Self {
        Self::new(Point::new(x, y), button)
    }

    pub fn with_point(self, point: Point) -> Self {
        Self { point, ..self }
    }

    /// Whether the device reports pressure
    pub fn has_pressure(&self) -> bool {
        matches!(self.kind, PointerType::Pen | PointerType::Eraser)
    }
}
