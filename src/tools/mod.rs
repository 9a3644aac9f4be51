//! The drawing pipeline run by every gesture: a controller turns pointer
//! samples into a stroke, an intertwine walks the stroke stamping a point
//! shape, and the point shape feeds scanlines to an ink.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod controller;
pub mod dynamics;
pub mod gradient;
pub mod ink;
pub mod ink_processing;
pub mod intertwine;
pub mod manager;
pub mod point_shape;
pub mod pointer;
pub mod symmetry;
pub mod tool_loop;

pub use catalog::{FillMode, Tool, ToolButtonConfig, ToolCatalog};
pub use controller::Controller;
pub use dynamics::{DynamicSensor, DynamicsOptions, Stabilizer};
pub use gradient::{DitheringMatrix, GradientType};
pub use ink::{EraserInkType, Ink, PaintInkType};
pub use intertwine::Intertwine;
pub use manager::ToolLoopManager;
pub use point_shape::PointShape;
pub use pointer::{Button, Pointer, PointerType};
pub use symmetry::{Symmetry, SymmetryMode};
pub use tool_loop::{CommitReport, ShadingTable, ToolLoop, ToolLoopParams};

/// How the preview keeps previous traces between loop steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TracePolicy {
    /// Every step draws over the previous ones (freehand)
    #[default]
    Accumulate,
    /// Every step starts from the source image again (lines, shapes)
    Last,
    /// Like accumulate, but each trace becomes the source of the next one
    Overlap,
}

bitflags! {
    /// Keyboard modifiers translated into tool behavior
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ToolLoopModifiers: u32 {
        const REPLACE_SELECTION = 1 << 0;
        const ADD_SELECTION = 1 << 1;
        const SUBTRACT_SELECTION = 1 << 2;
        const INTERSECT_SELECTION = 1 << 3;
        const MOVE_ORIGIN = 1 << 4;
        const SQUARE_ASPECT = 1 << 5;
        const FROM_CENTER = 1 << 6;
        const ROTATE_SHAPE = 1 << 7;
    }
}

impl ToolLoopModifiers {
    pub const SELECTION_MODES: ToolLoopModifiers = ToolLoopModifiers::REPLACE_SELECTION
        .union(ToolLoopModifiers::ADD_SELECTION)
        .union(ToolLoopModifiers::SUBTRACT_SELECTION)
        .union(ToolLoopModifiers::INTERSECT_SELECTION);
}

/// Freehand line algorithm chosen in the tool options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreehandAlgorithm {
    #[default]
    Default,
    PixelPerfect,
    Dots,
}
