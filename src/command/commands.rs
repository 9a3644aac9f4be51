use serde::{Deserialize, Serialize};

/// Commands the user can run from menus or shortcuts while the canvas
/// has focus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorCommand {
    Undo,
    Redo,
    /// Cancel the gesture in progress
    Cancel,
    ZoomIn,
    ZoomOut,
    /// Change the active tool
    SetTool(String),
    /// Clear the selection mask
    Deselect,
}

impl EditorCommand {
    /// Whether a gesture in progress must be canceled before the command
    /// runs. Zooming keeps drawing.
    pub fn interrupts_gesture(&self) -> bool {
        !matches!(self, EditorCommand::ZoomIn | EditorCommand::ZoomOut)
    }

    /// Whether the command only stops the gesture and does nothing else
    /// while one is running
    pub fn is_consumed_by_gesture(&self) -> bool {
        matches!(self, EditorCommand::Undo | EditorCommand::Redo | EditorCommand::Cancel)
    }
}
