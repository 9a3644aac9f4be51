//! The editor state machine.
//!
//! ```text
//!              ┌────────────┐
//!        ┌─────►  Drawing   ├─────┐
//!        │     └────────────┘     │
//! ┌──────┴───┐ ┌────────────┐ ┌───▼──────┐
//! │ Standby  ├─► Scrolling  ├─► Standby  │
//! └──────┬───┘ └────────────┘ └───▲──────┘
//!        │     ┌────────────┐     │
//!        └─────►  Zooming   ├─────┘
//!              └────────────┘
//! ```
//!
//! Every state other than Standby ends by going back to Standby.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EditorState {
    /// Waiting for the user
    #[default]
    Standby,
    /// A tool gesture is in progress
    Drawing,
    /// Dragging the view around
    Scrolling,
    /// Dragging to change the zoom
    Zooming,
}

impl EditorState {
    /// Validates whether a transition to the new state is allowed
    pub fn can_transition_to(&self, new_state: &EditorState) -> bool {
        match (self, new_state) {
            (EditorState::Standby, EditorState::Standby) => false,
            (EditorState::Standby, _) => true,
            (_, EditorState::Standby) => true,
            _ => false,
        }
    }

    pub fn is_standby(&self) -> bool {
        matches!(self, EditorState::Standby)
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self, EditorState::Drawing)
    }
}
