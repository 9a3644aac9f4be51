//! Editor and tool preferences.
//!
//! Preferences are plain serde snapshots. A gesture never reads them
//! directly: `ToolLoopParams::from_preferences` copies what it needs when
//! the button goes down.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::{Grid, TiledMode};
use crate::tools::{DitheringMatrix, DynamicsOptions, FreehandAlgorithm, GradientType, Symmetry};

/// Ink picked in the tool options for paint tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InkType {
    #[default]
    Simple,
    AlphaCompositing,
    Copy,
    LockAlpha,
    Shading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPreferences {
    /// How long a gesture waits for the document lock
    pub lock_wait_ms: u64,
    /// Bytes a gesture may allocate for its scratch images
    pub scratch_budget: usize,
    pub tiled_mode: TiledMode,
    pub grid: Grid,
    pub snap_to_grid: bool,
    /// Flood fill stays inside the grid cell it starts in
    pub stop_at_grid: bool,
    pub symmetry: Symmetry,
    /// Shift+click draws a straight line from the last freehand point
    pub straight_line_preview: bool,
    pub dynamics: DynamicsOptions,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            lock_wait_ms: 100,
            scratch_budget: 512 * 1024 * 1024,
            tiled_mode: TiledMode::None,
            grid: Grid::default(),
            snap_to_grid: false,
            stop_at_grid: false,
            symmetry: Symmetry::default(),
            straight_line_preview: true,
            dynamics: DynamicsOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPreferences {
    pub ink_type: InkType,
    pub opacity: u8,
    pub tolerance: u8,
    pub contiguous: bool,
    /// 8-connected flood fill
    pub eight_connected: bool,
    pub freehand_algorithm: FreehandAlgorithm,
    pub filled: bool,
    pub preview_filled: bool,
    pub spray_width: i32,
    pub spray_speed: i32,
    pub gradient_type: GradientType,
    pub dithering: DitheringMatrix,
}

impl Default for ToolPreferences {
    fn default() -> Self {
        Self {
            ink_type: InkType::Simple,
            opacity: 255,
            tolerance: 0,
            contiguous: true,
            eight_connected: false,
            freehand_algorithm: FreehandAlgorithm::Default,
            filled: false,
            preview_filled: false,
            spray_width: 16,
            spray_speed: 32,
            gradient_type: GradientType::Linear,
            dithering: DitheringMatrix::None,
        }
    }
}

/// Everything saved between sessions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub editor: EditorPreferences,
    /// Per tool id; tools without an entry use the defaults
    pub tools: HashMap<String, ToolPreferences>,
}

impl Preferences {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let prefs: Preferences = serde_json::from_str(json)?;
        prefs.validate()?;
        Ok(prefs)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn tool(&self, id: &str) -> ToolPreferences {
        self.tools.get(id).cloned().unwrap_or_default()
    }

    pub fn tool_mut(&mut self, id: &str) -> &mut ToolPreferences {
        self.tools.entry(id.to_string()).or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.editor;
        if e.scratch_budget == 0 {
            return Err(ConfigError::Invalid("scratch budget must be positive".into()));
        }
        if e.grid.tile_w <= 0 || e.grid.tile_h <= 0 {
            return Err(ConfigError::Invalid(format!(
                "grid cells must be positive, got {}x{}",
                e.grid.tile_w, e.grid.tile_h
            )));
        }
        if e.dynamics.stabilizer_factor < 0 {
            return Err(ConfigError::Invalid("stabilizer factor can't be negative".into()));
        }
        for (id, tool) in &self.tools {
            if tool.spray_width < 1 || tool.spray_speed < 1 {
                return Err(ConfigError::Invalid(format!(
                    "spray of '{}' needs a positive width and speed",
                    id
                )));
            }
        }
        Ok(())
    }
}

/// Reads and writes the preferences file
#[derive(Debug, Clone)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved preferences; a missing file gives the defaults
    pub fn load(&self) -> Result<Preferences, ConfigError> {
        if !self.path.exists() {
            debug!("No preferences at {}, using defaults", self.path.display());
            return Ok(Preferences::default());
        }
        let json = fs::read_to_string(&self.path)?;
        let prefs = Preferences::from_json(&json).inspect_err(|err| {
            warn!("Ignoring preferences at {}: {}", self.path.display(), err);
        })?;
        info!("Loaded preferences from {}", self.path.display());
        Ok(prefs)
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), ConfigError> {
        prefs.validate()?;
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, prefs.to_json()?)?;
        info!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let prefs = Preferences::from_json(
            r#"{"editor": {"snap_to_grid": true}, "tools": {"pencil": {"opacity": 128}}}"#,
        )
        .unwrap();
        assert!(prefs.editor.snap_to_grid);
        assert_eq!(prefs.editor.lock_wait_ms, 100);
        assert_eq!(prefs.tool("pencil").opacity, 128);
        assert!(prefs.tool("pencil").contiguous);
        assert_eq!(prefs.tool("spray"), ToolPreferences::default());
    }

    #[test]
    fn test_invalid_values_are_refused() {
        let mut prefs = Preferences::default();
        prefs.tool_mut("spray").spray_width = 0;
        assert!(matches!(prefs.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(Preferences::from_json("[1, 2"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("pixel_paint_prefs_{}", uuid::Uuid::new_v4()));
        let store = PreferencesStore::new(dir.join("prefs.json"));
        assert_eq!(store.load().unwrap(), Preferences::default());

        let mut prefs = Preferences::default();
        prefs.editor.tiled_mode = TiledMode::Both;
        prefs.tool_mut("pencil").freehand_algorithm = FreehandAlgorithm::PixelPerfect;
        store.save(&prefs).unwrap();
        assert_eq!(store.load().unwrap(), prefs);

        fs::remove_dir_all(dir).unwrap();
    }
}
