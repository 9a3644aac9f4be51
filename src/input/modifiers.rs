use egui::Modifiers;

use crate::tools::{ToolButtonConfig, ToolLoopModifiers};

/// Translates the keys held down into what they mean for the tool.
///
/// Selection tools: Shift adds, Alt subtracts, Shift+Alt intersects.
/// Shape tools: Shift keeps the aspect (or snaps the angle of lines),
/// Ctrl draws from the center and Alt rotates. Freehand tools only snap
/// the Shift+click line angle with Ctrl+Shift. Space moves the origin.
pub fn tool_loop_modifiers(mods: Modifiers, space: bool, config: &ToolButtonConfig) -> ToolLoopModifiers {
    let mut out = ToolLoopModifiers::empty();
    if space {
        out |= ToolLoopModifiers::MOVE_ORIGIN;
    }

    if config.ink.is_selection() {
        out |= match (mods.shift, mods.alt) {
            (true, true) => ToolLoopModifiers::INTERSECT_SELECTION,
            (true, false) => ToolLoopModifiers::ADD_SELECTION,
            (false, true) => ToolLoopModifiers::SUBTRACT_SELECTION,
            (false, false) => ToolLoopModifiers::REPLACE_SELECTION,
        };
        if mods.command && !config.controller.is_freehand() {
            out |= ToolLoopModifiers::FROM_CENTER;
        }
        return out;
    }

    if config.controller.is_freehand() {
        if mods.shift && mods.command {
            out |= ToolLoopModifiers::SQUARE_ASPECT;
        }
        return out;
    }

    if mods.shift {
        out |= ToolLoopModifiers::SQUARE_ASPECT;
    }
    if mods.command {
        out |= ToolLoopModifiers::FROM_CENTER;
    }
    if mods.alt {
        out |= ToolLoopModifiers::ROTATE_SHAPE;
    }
    out
}

/// Shift (or Ctrl+Shift) with a freehand tool draws a straight line from
/// the last point
pub fn is_straight_line_modifier(mods: Modifiers) -> bool {
    mods.shift && !mods.alt
}
