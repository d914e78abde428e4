//! Tool selection: brush color, brush size, active tool.
//!
//! Pure local state. Nothing here touches history.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_SIZE: u32 = 5;
pub const MIN_SIZE: u32 = 1;
pub const MAX_SIZE: u32 = 100;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("invalid color: {0}")]
    InvalidColor(String),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl crate::frame::ErrorCode for ToolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidColor(_) => "E_INVALID_COLOR",
            Self::UnknownTool(_) => "E_UNKNOWN_TOOL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Brush,
    Eraser,
    Rectangle,
    Ellipse,
    Line,
    Text,
    Select,
}

impl FromStr for Tool {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brush" => Ok(Self::Brush),
            "eraser" => Ok(Self::Eraser),
            "rectangle" => Ok(Self::Rectangle),
            "ellipse" => Ok(Self::Ellipse),
            "line" => Ok(Self::Line),
            "text" => Ok(Self::Text),
            "select" => Ok(Self::Select),
            other => Err(ToolError::UnknownTool(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolState {
    pub color: String,
    pub size: u32,
    pub tool: Tool,
}

impl Default for ToolState {
    fn default() -> Self {
        Self { color: DEFAULT_COLOR.to_owned(), size: DEFAULT_SIZE, tool: Tool::Brush }
    }
}

impl ToolState {
    /// Set the stroke color. Picking a color while erasing switches back to
    /// the brush.
    ///
    /// # Errors
    ///
    /// Returns `InvalidColor` unless `color` is `#rgb` or `#rrggbb` hex.
    pub fn select_color(&mut self, color: &str) -> Result<(), ToolError> {
        if !is_hex_color(color) {
            return Err(ToolError::InvalidColor(color.to_owned()));
        }
        self.color = color.to_ascii_lowercase();
        if self.tool == Tool::Eraser {
            self.tool = Tool::Brush;
        }
        Ok(())
    }

    /// Set the stroke width, clamped to `MIN_SIZE..=MAX_SIZE`.
    pub fn select_size(&mut self, size: u32) {
        self.size = size.clamp(MIN_SIZE, MAX_SIZE);
    }

    pub fn select_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }
}

fn is_hex_color(s: &str) -> bool {
    let Some(hex) = s.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}
