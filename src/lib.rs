#![warn(clippy::all, rust_2018_idioms)]

pub mod brush;
pub mod color;
pub mod command;
pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod file_handler;
pub mod geometry;
pub mod image;
pub mod input;
pub mod layer;
pub mod palette;
pub mod renderer;
pub mod selection;
pub mod state;
pub mod stroke;
pub mod tools;
pub mod util;

pub use command::{CommandHistory, EditorCommand};
pub use config::Preferences;
pub use document::{Document, SharedDocument};
pub use error::{CatalogError, CodecError, ConfigError, StateTransitionError, ToolLoopError};
pub use event::{EditorEvent, EventBus};
pub use input::{InputEvent, InputHandler};
pub use renderer::Renderer;
pub use state::{Editor, EditorState};
pub use stroke::Stroke;
pub use tools::{ToolCatalog, ToolLoopManager};
