mod delayed_mouse_move;
mod drawing;
mod editor;
mod editor_state;

pub use delayed_mouse_move::DelayedMouseMove;
pub use drawing::{DrawingKind, DrawingState, Release};
pub use editor::Editor;
pub use editor_state::EditorState;
