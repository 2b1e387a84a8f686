//! Logging settings
//!
//! The filter string uses `tracing_subscriber::EnvFilter` syntax. A `RUST_LOG`
//! environment variable, when set, takes precedence over the configured filter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,nodegraph_rs=debug";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    pub filter: String,

    /// Also write logs to this file (non-blocking)
    pub file: Option<PathBuf>,

    /// Include the event target in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            file: None,
            with_target: true,
        }
    }
}
