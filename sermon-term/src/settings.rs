//! Application settings

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sermon_config::PortConfiguration;

use crate::framing::LineEnding;

fn default_scan_interval_ms() -> u64 {
    1000
}

/// Settings persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Last used port configuration
    #[serde(default)]
    pub port: PortConfiguration,
    /// Terminator appended to sent lines
    #[serde(default)]
    pub line_ending: LineEnding,
    /// How often to look for a lost device, in milliseconds
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: PortConfiguration::default(),
            line_ending: LineEnding::default(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

impl Settings {
    /// Get the XDG config directory for sermon
    /// Uses $XDG_CONFIG_HOME/sermon on Linux/macOS, falls back to ~/.config/sermon
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("sermon"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("sermon"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk; missing or unreadable settings give the defaults
    pub fn load() -> Self {
        Self::settings_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| Self::from_json(&s))
            .unwrap_or_default()
    }

    fn from_json(json: &str) -> Option<Self> {
        match serde_json::from_str(json) {
            Ok(settings) => Some(settings),
            Err(e) => {
                tracing::warn!("Ignoring invalid settings file: {}", e);
                None
            }
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        std::fs::write(&path, json).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }
}
