mod commands;
mod history;
pub mod transaction;

pub use commands::EditorCommand;
pub use history::{CommandHistory, History};
pub use transaction::{CelPatch, MaskPatch, TilePatch, Transaction};
