use serde::{Deserialize, Serialize};

use crate::geometry::{Position, Size};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum WindowMode {
    /// Collapsed, draggable circle
    Orb,
    /// Note-entry panel; `expanded` picks the larger size preset
    Widget { expanded: bool },
}

impl WindowMode {
    pub fn is_orb(&self) -> bool {
        matches!(self, WindowMode::Orb)
    }
}

/// What the webview needs to render the current state
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct WidgetSnapshot {
    #[serde(flatten)]
    pub mode: WindowMode,
    pub dragging: bool,
    pub returning: bool,
    pub animating: bool,
    pub position: Position,
    pub size: Size,
}
