use tauri_plugin_global_shortcut::Shortcut;

use crate::bridge::HostNotification;
use crate::config::ShortcutConfig;

/// Global shortcuts owned by the host and the notification each one raises
#[derive(Debug, Clone, Default)]
pub struct ShortcutBindings {
    bindings: Vec<(Shortcut, HostNotification)>,
}

impl ShortcutBindings {
    /// Parse the configured accelerators. Unparseable ones are logged and skipped.
    pub fn from_config(config: &ShortcutConfig) -> Self {
        let mut bindings = Vec::new();

        for (accelerator, action) in [
            (&config.toggle_widget, HostNotification::ToggleWidget),
            (&config.toggle_expand, HostNotification::ToggleExpand),
        ] {
            match accelerator.parse::<Shortcut>() {
                Ok(shortcut) => bindings.push((shortcut, action)),
                Err(e) => log::warn!(
                    "[host] Invalid shortcut {:?} for {}: {}",
                    accelerator,
                    action.channel(),
                    e
                ),
            }
        }

        Self { bindings }
    }

    pub fn action_for(&self, shortcut: &Shortcut) -> Option<HostNotification> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == shortcut)
            .map(|(_, action)| *action)
    }

    pub fn shortcuts(&self) -> Vec<Shortcut> {
        self.bindings.iter().map(|(s, _)| s.clone()).collect()
    }
}
