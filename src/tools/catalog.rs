//! Tool definitions: which ink, controller, point shape and intertwine
//! each tool binds to each mouse button. Loaded from JSON and validated
//! once, so gestures only ever see resolved strategies.

use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

use super::controller::Controller;
use super::ink::Ink;
use super::intertwine::Intertwine;
use super::point_shape::PointShape;
use super::pointer::Button;
use super::TracePolicy;

const BUNDLED_CATALOG: &str = include_str!("../../resources/tools.json");

/// Whether a tool draws the interior of its shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    #[default]
    None,
    Always,
    /// Follows the "filled" tool preference
    Optional,
}

impl FillMode {
    fn from_id(id: &str) -> Option<FillMode> {
        match id {
            "none" => Some(FillMode::None),
            "always" => Some(FillMode::Always),
            "optional" => Some(FillMode::Optional),
            _ => None,
        }
    }
}

impl TracePolicy {
    fn from_id(id: &str) -> Option<TracePolicy> {
        match id {
            "accumulate" => Some(TracePolicy::Accumulate),
            "last" => Some(TracePolicy::Last),
            "overlap" => Some(TracePolicy::Overlap),
            _ => None,
        }
    }
}

/// Strategies bound to one mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolButtonConfig {
    pub ink: Ink,
    pub controller: Controller,
    pub point_shape: PointShape,
    pub intertwine: Intertwine,
    pub trace_policy: TracePolicy,
    pub fill: FillMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub group: String,
    pub left: ToolButtonConfig,
    pub right: ToolButtonConfig,
}

impl Tool {
    /// Configuration for `button`; every button but the right one uses the
    /// left configuration
    pub fn config(&self, button: Button) -> ToolButtonConfig {
        match button {
            Button::Right => self.right,
            _ => self.left,
        }
    }
}

/// Strategy identifiers of one button as written in the catalog. Missing
/// right-button fields fall back to the left ones.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawButton {
    ink: Option<String>,
    controller: Option<String>,
    pointshape: Option<String>,
    intertwine: Option<String>,
    tracepolicy: Option<String>,
    fill: Option<String>,
}

impl RawButton {
    fn overridden_by(&self, other: &RawButton) -> RawButton {
        RawButton {
            ink: other.ink.clone().or_else(|| self.ink.clone()),
            controller: other.controller.clone().or_else(|| self.controller.clone()),
            pointshape: other.pointshape.clone().or_else(|| self.pointshape.clone()),
            intertwine: other.intertwine.clone().or_else(|| self.intertwine.clone()),
            tracepolicy: other.tracepolicy.clone().or_else(|| self.tracepolicy.clone()),
            fill: other.fill.clone().or_else(|| self.fill.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTool {
    id: String,
    name: String,
    #[serde(default)]
    group: String,
    #[serde(flatten)]
    left: RawButton,
    #[serde(default)]
    right: Option<RawButton>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    tools: Vec<RawTool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
}

impl ToolCatalog {
    /// The catalog shipped in `resources/tools.json`
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        if raw.tools.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(raw.tools.len());
        for raw_tool in raw.tools {
            if !seen.insert(raw_tool.id.clone()) {
                return Err(CatalogError::DuplicateTool(raw_tool.id));
            }
            let left = resolve_button(&raw_tool.id, &raw_tool.left)?;
            let right = match &raw_tool.right {
                Some(right) => resolve_button(&raw_tool.id, &raw_tool.left.overridden_by(right))?,
                None => left,
            };
            debug!("Tool '{}': left {:?}, right {:?}", raw_tool.id, left, right);
            tools.push(Tool {
                id: raw_tool.id,
                name: raw_tool.name,
                group: raw_tool.group,
                left,
                right,
            });
        }

        info!("Loaded tool catalog with {} tools", tools.len());
        Ok(Self { tools })
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn get(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn lookup<T>(
    tool: &str,
    kind: &'static str,
    id: Option<&str>,
    default: Option<&str>,
    from_id: impl Fn(&str) -> Option<T>,
) -> Result<T, CatalogError> {
    let id = id.or(default).unwrap_or_default();
    from_id(id).ok_or_else(|| CatalogError::UnknownStrategy {
        tool: tool.to_string(),
        kind,
        id: id.to_string(),
    })
}

fn resolve_button(tool: &str, raw: &RawButton) -> Result<ToolButtonConfig, CatalogError> {
    let config = ToolButtonConfig {
        ink: lookup(tool, "ink", raw.ink.as_deref(), None, Ink::from_id)?,
        controller: lookup(tool, "controller", raw.controller.as_deref(), None, Controller::from_id)?,
        point_shape: lookup(tool, "point shape", raw.pointshape.as_deref(), None, PointShape::from_id)?,
        intertwine: lookup(tool, "intertwine", raw.intertwine.as_deref(), None, Intertwine::from_id)?,
        trace_policy: lookup(
            tool,
            "trace policy",
            raw.tracepolicy.as_deref(),
            Some("accumulate"),
            TracePolicy::from_id,
        )?,
        fill: lookup(tool, "fill mode", raw.fill.as_deref(), Some("none"), FillMode::from_id)?,
    };
    validate(tool, &config)?;
    Ok(config)
}

fn validate(tool: &str, config: &ToolButtonConfig) -> Result<(), CatalogError> {
    let unsupported = |reason: &str| {
        Err(CatalogError::UnsupportedCombination {
            tool: tool.to_string(),
            reason: reason.to_string(),
        })
    };

    if config.fill != FillMode::None
        && !matches!(
            config.intertwine,
            Intertwine::AsLines | Intertwine::AsRectangles | Intertwine::AsEllipses
        )
    {
        return unsupported("only lines, rectangles and ellipses can be filled");
    }
    if config.ink.is_gradient() && !config.controller.is_two_points() {
        return unsupported("the gradient ink needs a two points controller");
    }
    if (config.ink.is_selection() || config.ink.is_slice()) && config.point_shape.is_spray() {
        return unsupported("selections can't be sprayed");
    }
    if config.point_shape.is_flood_fill() && config.controller.is_freehand() {
        return unsupported("flood fill can't follow a freehand stroke");
    }
    if config.trace_policy == TracePolicy::Overlap {
        return unsupported("the overlap policy is picked by dynamics, not by tools");
    }
    Ok(())
}
