use serde::Serialize;
use tauri::{Emitter, LogicalPosition, LogicalSize, Runtime, WebviewWindow};

use super::{HostError, WindowBackend};
use crate::geometry::{Bounds, ScreenMetrics};

/// Event payload telling the webview which bounds were just applied
#[derive(Clone, Serialize)]
struct BoundsAppliedPayload {
    bounds: Bounds,
    animate: bool,
}

/// The widget's Tauri window
pub struct TauriWindow<R: Runtime> {
    window: WebviewWindow<R>,
}

impl<R: Runtime> TauriWindow<R> {
    pub fn new(window: WebviewWindow<R>) -> Self {
        Self { window }
    }
}

fn backend(e: tauri::Error) -> HostError {
    HostError::Backend(e.to_string())
}

impl<R: Runtime> WindowBackend for TauriWindow<R> {
    fn bounds(&self) -> Result<Bounds, HostError> {
        let scale = self.window.scale_factor().map_err(backend)?;
        let position = self
            .window
            .outer_position()
            .map_err(backend)?
            .to_logical::<f64>(scale);
        // set_size works on the inner size, so read the same thing back
        let size = self
            .window
            .inner_size()
            .map_err(backend)?
            .to_logical::<f64>(scale);

        Ok(Bounds::new(
            position.x.round() as i32,
            position.y.round() as i32,
            size.width.round() as u32,
            size.height.round() as u32,
        ))
    }

    fn set_size(&mut self, width: u32, height: u32) -> Result<(), HostError> {
        self.window
            .set_size(LogicalSize::new(f64::from(width), f64::from(height)))
            .map_err(backend)
    }

    fn set_position(&mut self, x: i32, y: i32) -> Result<(), HostError> {
        self.window
            .set_position(LogicalPosition::new(f64::from(x), f64::from(y)))
            .map_err(backend)
    }

    fn applied(&mut self, bounds: Bounds, animate: bool) {
        // Tauri has no native animated resize; the webview plays the open transition itself
        if let Err(e) = self
            .window
            .emit("bounds-applied", BoundsAppliedPayload { bounds, animate })
        {
            log::debug!("[host] Failed to emit bounds-applied: {}", e);
        }
    }

    fn close(&mut self) -> Result<(), HostError> {
        self.window.close().map_err(backend)
    }
}

/// Logical work area of the primary monitor, excluding taskbars and docks
pub fn screen_metrics<R: Runtime>(window: &WebviewWindow<R>) -> Option<ScreenMetrics> {
    let monitor = match window.primary_monitor() {
        Ok(Some(monitor)) => monitor,
        Ok(None) => {
            log::warn!("[host] No primary monitor reported");
            return None;
        }
        Err(e) => {
            log::warn!("[host] Failed to query primary monitor: {}", e);
            return None;
        }
    };

    let scale = monitor.scale_factor();
    let area = monitor.work_area();
    let origin = area.position.to_logical::<f64>(scale);
    let size = area.size.to_logical::<f64>(scale);
    Some(ScreenMetrics::with_origin(
        origin.x,
        origin.y,
        size.width,
        size.height,
    ))
}
