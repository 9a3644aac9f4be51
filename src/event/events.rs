use uuid::Uuid;

use crate::geometry::{Rect, Region};
use crate::layer::LayerId;
use crate::state::EditorState;

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    StateChanged {
        old: EditorState,
        new: EditorState,
    },
    ToolChanged {
        old: String,
        new: String,
    },
    GestureStarted {
        tool: String,
        layer: LayerId,
    },
    GestureCommitted {
        tool: String,
        /// `None` when nothing changed
        transaction: Option<Uuid>,
        dirty: Rect,
    },
    GestureCanceled {
        tool: String,
    },
    /// Shape position/size for the status bar
    StatusText(String),
    /// Transient message for the user (busy document, out of memory)
    Notice(String),
    /// Canvas area to repaint
    Invalidate(Region),
    ViewChanged {
        zoom: i32,
        scroll: egui::Vec2,
    },
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
    },
}
