// Layout policy: keeps windows inside the visible screen area

use super::{Position, ScreenMetrics, Size};

/// Constrain `desired` so the whole window stays `margin` away from every screen edge.
///
/// Each axis is clamped independently to `[origin + margin, origin + screen - size - margin]`.
/// When the window does not fit on an axis the result collapses to the lower bound.
pub fn clamp(desired: Position, size: Size, margin: f64, screen: ScreenMetrics) -> Position {
    Position::new(
        clamp_axis(desired.x, size.width, margin, screen.x, screen.width),
        clamp_axis(desired.y, size.height, margin, screen.y, screen.height),
    )
}

fn clamp_axis(value: f64, extent: f64, margin: f64, origin: f64, screen_extent: f64) -> f64 {
    let min = origin + margin;
    let max = origin + screen_extent - extent - margin;

    // Window larger than the available space, or garbage input
    if !(max >= min) || !value.is_finite() {
        return min;
    }

    value.max(min).min(max)
}

/// Window centered on screen, rounded to whole pixels
pub fn centered(size: Size, margin: f64, screen: ScreenMetrics) -> Position {
    let desired = Position::new(
        screen.x + ((screen.width - size.width) / 2.0).round(),
        screen.y + ((screen.height - size.height) / 2.0).round(),
    );
    clamp(desired, size, margin, screen)
}

/// Bottom-right corner inset by `margin`, the default orb home
pub fn bottom_right(size: Size, margin: f64, screen: ScreenMetrics) -> Position {
    let desired = Position::new(
        screen.x + screen.width - size.width - margin,
        screen.y + screen.height - size.height - margin,
    );
    clamp(desired, size, margin, screen)
}
