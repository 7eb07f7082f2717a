// Core geometry types shared by the host and UI contexts
// Handles positions, sizes, screen metrics and partial window updates

pub mod layout;

use serde::{Deserialize, Serialize};

pub use layout::{bottom_right, centered, clamp};

/// Logical on-screen window origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point offset by a pointer delta
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Screen-space pointer coordinates
pub type Point = Position;

/// Width and height of a window in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Available display area the window must stay inside.
///
/// The origin is the top-left of the work area, which is not at 0,0 when a
/// taskbar or menu bar sits on the top or left edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenMetrics {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenMetrics {
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_origin(0.0, 0.0, width, height)
    }

    pub fn with_origin(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Real window bounds as applied by the host, in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(f64::from(self.x), f64::from(self.y))
    }

    pub fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }
}

/// Partial window-bounds update. `None` fields leave the current value unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeometryCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub animate: bool,
}

impl GeometryCommand {
    /// Full size and position update
    pub fn bounds(position: Position, size: Size, animate: bool) -> Self {
        Self {
            width: Some(size.width),
            height: Some(size.height),
            x: Some(position.x),
            y: Some(position.y),
            animate,
        }
    }

    /// Position-only update, size left as is
    pub fn position(position: Position, animate: bool) -> Self {
        Self {
            x: Some(position.x),
            y: Some(position.y),
            animate,
            ..Self::default()
        }
    }

    /// Name of the first provided field that is not a finite number
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("width", self.width),
            ("height", self.height),
            ("x", self.x),
            ("y", self.y),
        ]
        .into_iter()
        .find(|(_, value)| value.is_some_and(|v| !v.is_finite()))
        .map(|(name, _)| name)
    }

    /// Merge into `current`, rounding provided fields to whole pixels
    pub fn apply_to(&self, current: Bounds) -> Bounds {
        Bounds {
            x: self.x.map_or(current.x, |v| v.round() as i32),
            y: self.y.map_or(current.y, |v| v.round() as i32),
            width: self.width.map_or(current.width, |v| v.round().max(0.0) as u32),
            height: self
                .height
                .map_or(current.height, |v| v.round().max(0.0) as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_command_keeps_missing_fields() {
        let current = Bounds::new(10, 20, 84, 84);
        let cmd = GeometryCommand {
            x: Some(99.6),
            ..GeometryCommand::default()
        };

        assert_eq!(cmd.apply_to(current), Bounds::new(100, 20, 84, 84));
    }

    #[test]
    fn test_full_command_rounds_every_field() {
        let current = Bounds::new(0, 0, 1, 1);
        let cmd = GeometryCommand::bounds(Position::new(779.5, 440.4), Size::new(360.2, 199.5), true);

        assert_eq!(cmd.apply_to(current), Bounds::new(780, 440, 360, 200));
    }

    #[test]
    fn test_non_finite_detection() {
        let cmd = GeometryCommand {
            width: Some(10.0),
            y: Some(f64::NAN),
            ..GeometryCommand::default()
        };
        assert_eq!(cmd.first_non_finite(), Some("y"));
        assert_eq!(GeometryCommand::position(Position::new(1.0, 2.0), false).first_non_finite(), None);
    }

    #[test]
    fn test_serialization_omits_missing_fields() {
        let cmd = GeometryCommand::position(Position::new(5.0, 6.0), false);
        let json = serde_json::to_value(cmd).unwrap();
        assert_eq!(json, serde_json::json!({"x": 5.0, "y": 6.0, "animate": false}));
    }
}
