//! Configuration module for the node-graph engine
//!
//! One TOML file groups the tunables of every subsystem:
//!
//! ```toml
//! [runtime]
//! max_call_depth = 256
//!
//! [pools]
//! compaction_ratio = 0.5
//! retire_empty_pools = false
//!
//! [logging]
//! filter = "info,nodegraph_rs=debug"
//! ```
//!
//! Every table and key is optional; missing values take their defaults.
//!
//! # Config Location
//!
//! The default file lives in the platform config directory:
//! - **Linux**: `~/.config/nodegraph-rs/engine.toml`
//! - **macOS**: `~/Library/Application Support/nodegraph-rs/engine.toml`
//! - **Windows**: `%APPDATA%\nodegraph-rs\engine.toml`

pub mod settings;

pub use settings::*;

pub use crate::runtime::RuntimeConfig;
pub use crate::storage::PoolConfig;

use crate::error::{EngineError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for the config directory
pub const APP_ID: &str = "nodegraph-rs";

/// Config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Default config file path, if the platform has a config directory
pub fn default_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Call/read dispatch settings
    pub runtime: RuntimeConfig,

    /// Data pool settings
    pub pools: PoolConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(EngineError::from)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            EngineError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults on any error
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

    /// Save the config file to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(EngineError::from)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(EngineError::from)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.runtime.max_call_depth == 0 {
            return Err(EngineError::Config(
                "runtime.max_call_depth must be at least 1".to_string(),
            ));
        }
        let ratio = self.pools.compaction_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(EngineError::Config(format!(
                "pools.compaction_ratio must be a non-negative number, got {}",
                ratio
            )));
        }
        Ok(())
    }
}
