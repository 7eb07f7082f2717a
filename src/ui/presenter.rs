use tauri::{AppHandle, Emitter, Runtime};

use crate::state::window::WidgetSnapshot;

pub const WIDGET_STATE_EVENT: &str = "widget-state";

/// Renders state-machine snapshots in the webview
pub trait Presenter: Send + Sync + 'static {
    fn present(&self, snapshot: &WidgetSnapshot);
}

impl<R: Runtime> Presenter for AppHandle<R> {
    fn present(&self, snapshot: &WidgetSnapshot) {
        if let Err(e) = self.emit(WIDGET_STATE_EVENT, snapshot) {
            log::debug!("[ui] Failed to emit {}: {}", WIDGET_STATE_EVENT, e);
        }
    }
}
