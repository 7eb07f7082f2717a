//! Widget configuration
//!
//! Margins, size presets and timings differ between builds of the widget, so
//! they all live here as named settings loaded from `config.toml`.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geometry::Size;

/// User-tunable settings persisted as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Distance kept between the window and every screen edge
    #[serde(default = "default_margin")]
    pub margin: f64,

    #[serde(default = "default_orb_size")]
    pub orb_size: Size,

    /// Widget size when collapsed
    #[serde(default = "default_widget_size")]
    pub widget_size: Size,

    /// Widget size when expanded
    #[serde(default = "default_widget_expanded_size")]
    pub widget_expanded_size: Size,

    /// Pointer travel (per axis) before a press becomes a drag
    #[serde(default = "default_drag_threshold")]
    pub drag_threshold: f64,

    #[serde(default = "default_return_duration_ms")]
    pub return_duration_ms: u64,

    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    #[serde(default = "default_status_clear_ms")]
    pub status_clear_ms: u64,

    /// Await host acknowledgement for mode transitions instead of fire-and-forget
    #[serde(default = "default_true")]
    pub acknowledge_transitions: bool,

    #[serde(default)]
    pub open_widget_on_drag_release: bool,

    #[serde(default)]
    pub start_expanded: bool,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub shortcuts: ShortcutConfig,

    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_data_source")]
    pub data_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutConfig {
    #[serde(default = "default_toggle_widget_shortcut")]
    pub toggle_widget: String,
    #[serde(default = "default_toggle_expand_shortcut")]
    pub toggle_expand: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingConfig {
    #[serde(default = "default_recording_seconds")]
    pub seconds: u32,
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,
}

fn default_true() -> bool {
    true
}

fn default_margin() -> f64 {
    24.0
}

fn default_orb_size() -> Size {
    Size::new(84.0, 84.0)
}

fn default_widget_size() -> Size {
    Size::new(360.0, 200.0)
}

fn default_widget_expanded_size() -> Size {
    Size::new(600.0, 400.0)
}

fn default_drag_threshold() -> f64 {
    5.0
}

fn default_return_duration_ms() -> u64 {
    150
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_status_clear_ms() -> u64 {
    3000
}

fn default_endpoint() -> String {
    "http://localhost:8000/v1/ingest".to_string()
}

fn default_user_id() -> String {
    "user-123".to_string()
}

fn default_data_source() -> String {
    "user_typed".to_string()
}

fn default_toggle_widget_shortcut() -> String {
    "CommandOrControl+Shift+P".to_string()
}

fn default_toggle_expand_shortcut() -> String {
    "Control+Shift+Space".to_string()
}

fn default_recording_seconds() -> u32 {
    10
}

fn default_whisper_model() -> String {
    "base".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            user_id: default_user_id(),
            data_source: default_data_source(),
        }
    }
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            toggle_widget: default_toggle_widget_shortcut(),
            toggle_expand: default_toggle_expand_shortcut(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            seconds: default_recording_seconds(),
            whisper_model: default_whisper_model(),
        }
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            margin: default_margin(),
            orb_size: default_orb_size(),
            widget_size: default_widget_size(),
            widget_expanded_size: default_widget_expanded_size(),
            drag_threshold: default_drag_threshold(),
            return_duration_ms: default_return_duration_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            status_clear_ms: default_status_clear_ms(),
            acknowledge_transitions: true,
            open_widget_on_drag_release: false,
            start_expanded: false,
            ingest: IngestConfig::default(),
            shortcuts: ShortcutConfig::default(),
            recording: RecordingConfig::default(),
        }
    }
}

impl WidgetConfig {
    /// Default location: `<config dir>/pensieve/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "pensieve", "pensieve")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, falling back to defaults when the file does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load from the default location. Never fails: problems are logged and defaults used.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            log::warn!("[config] No config directory available, using defaults");
            return Self::default();
        };

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("[config] {:#}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    pub fn return_duration(&self) -> Duration {
        Duration::from_millis(self.return_duration_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn status_clear_delay(&self) -> Duration {
        Duration::from_millis(self.status_clear_ms)
    }

    pub fn widget_size_for(&self, expanded: bool) -> Size {
        if expanded {
            self.widget_expanded_size
        } else {
            self.widget_size
        }
    }
}
