//! Configuration module for the aggregation builder
//!
//! The builder reads a single TOML file grouping the resolver, debounce and
//! preview settings. Every section is optional.
//!
//! # Config Location
//!
//! [`BuilderConfig::load_or_default`] looks in the platform-appropriate data
//! directory under `dev.hxyulin.aggregation-builder`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.aggregation-builder/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.aggregation-builder/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.aggregation-builder\`
//!
//! # Example
//!
//! ```toml
//! [resolver]
//! id_suffix = "_id"
//! max_depth = 8
//!
//! [debounce]
//! window_ms = 500
//!
//! [preview]
//! max_items = 20
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{BuilderError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.aggregation-builder";

/// Config filename
pub const CONFIG_FILE: &str = "builder.toml";

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Complete builder configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BuilderConfig {
    /// Field expansion settings
    pub resolver: ResolverSettings,

    /// Edit coalescing settings
    pub debounce: DebounceSettings,

    /// Live preview settings
    pub preview: PreviewSettings,
}

impl BuilderConfig {
    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| BuilderError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Serialize the config to TOML text
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BuilderError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(BuilderError::from)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load the config from the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load builder config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BuilderError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .map_err(|e| BuilderError::Config(format!("Failed to write config: {}", e)))
    }
}
