//! Configuration module for syncscope
//!
//! Configuration is a single TOML file with one section per component.
//! Every key is optional; missing keys take their defaults.
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.syncscope/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.syncscope/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.syncscope\`
//!
//! # Files
//!
//! - `syncscope.toml` - Component settings
//! - `logs/` - Rolling log files written by the CLI
//!
//! # Example
//!
//! ```toml
//! [recorder]
//! tick_interval_ms = 20
//! stream_filters = ["bridge", "pointer"]
//!
//! [playback]
//! trail_window_s = 3.0
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.syncscope";

/// Config filename
pub const CONFIG_FILE: &str = "syncscope.toml";

/// Current config version
pub const CONFIG_VERSION: u32 = 1;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        SyncError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            SyncError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Get the directory for log files
pub fn log_dir() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join("logs"))
}

// ==================== Config File ====================

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Complete syncscope configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub recorder: RecorderSettings,

    #[serde(default)]
    pub producers: ProducerSettings,

    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub transport: TransportSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            recorder: RecorderSettings::default(),
            producers: ProducerSettings::default(),
            device: DeviceSettings::default(),
            transport: TransportSettings::default(),
            playback: PlaybackSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        if config.version > CONFIG_VERSION {
            tracing::warn!(
                "Config version {} is newer than supported version {}",
                config.version,
                CONFIG_VERSION
            );
        }
        Ok(config)
    }

    /// Load configuration, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load from the default location, falling back to defaults
    pub fn load_default_location() -> Self {
        match default_config_path() {
            Some(path) => Self::load_or_default(path),
            None => Self::default(),
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyncError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            SyncError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}
