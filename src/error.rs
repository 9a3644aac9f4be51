use thiserror::Error;

/// Reasons a gesture can't start or can't be committed.
///
/// None of these corrupt the document: a refused gesture leaves no state
/// behind and a failed commit rolls the transaction back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolLoopError {
    #[error("The document is busy, try again in a moment")]
    DocumentLocked,

    #[error("Not enough memory to allocate {bytes} bytes for the drawing buffer")]
    OutOfMemory { bytes: usize },

    #[error("There is no active layer to draw on")]
    NoActiveLayer,

    #[error("The active layer is locked or hidden")]
    LayerNotEditable,

    #[error("The undo history is not available")]
    HistoryUnavailable,
}

/// Errors found while resolving the tool catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to parse tool catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Tool '{tool}' uses an unknown {kind} '{id}'")]
    UnknownStrategy {
        tool: String,
        kind: &'static str,
        id: String,
    },

    #[error("Tool '{tool}' has an unsupported configuration: {reason}")]
    UnsupportedCombination { tool: String, reason: String },

    #[error("Tool '{0}' is defined more than once")]
    DuplicateTool(String),

    #[error("The tool catalog doesn't define any tool")]
    Empty,
}

/// Errors reading or writing preference snapshots
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse preferences: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to access preferences file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid preference value: {0}")]
    Invalid(String),
}

/// Errors from the image file codecs
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to access image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image dimensions {width}x{height}")]
    Dimensions { width: u32, height: u32 },
}

/// Result type for gesture operations
pub type ToolLoopResult<T> = Result<T, ToolLoopError>;

/// Refused editor state change
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTransitionError {
    #[error("Can't go from {from:?} to {to:?}")]
    InvalidTransition {
        from: crate::state::EditorState,
        to: crate::state::EditorState,
    },
}
