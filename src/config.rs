//! Configuration for nookly-guard.

use crate::overlay::SurfaceSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path for the protection ledger and simulated OS state
    pub data_path: PathBuf,

    /// Secure overlay settings
    #[serde(default)]
    pub overlay: OverlayConfig,

    /// Default `tracing` filter when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nookly-guard");

        Self {
            data_path: data_dir,
            overlay: OverlayConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.overlay.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nookly-guard")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path.join("protection.json")
    }

    /// Where the simulated notification manager keeps its state between runs.
    pub fn notification_state_path(&self) -> PathBuf {
        self.data_path.join("notification_state.json")
    }
}

/// Secure overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    pub enabled: bool,
    /// Surface opacity in (0.0, 1.0]
    pub opacity: f32,
    /// Also request window-level capture prevention
    pub prevent_capture: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            opacity: SurfaceSpec::default().opacity,
            prevent_capture: true,
        }
    }
}

impl OverlayConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.opacity > 0.0 && self.opacity <= 1.0) {
            return Err(ConfigError::ParseError(format!(
                "overlay opacity must be in (0, 1], got {}",
                self.opacity
            )));
        }
        Ok(())
    }

    pub fn surface_spec(&self) -> SurfaceSpec {
        SurfaceSpec {
            opacity: self.opacity,
            prevent_capture: self.prevent_capture,
            ..SurfaceSpec::default()
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
