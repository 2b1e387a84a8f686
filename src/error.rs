//! Error handling for the node-graph engine
//!
//! Authoring mistakes and lookup misses never surface here: the graph model
//! reports them as `false`/no-ops and the runtime resolves them to defaults.
//! This type covers the fallible outer surfaces (configuration, persisted
//! programs, lifecycle misuse).

use crate::graph::ConnectError;
use crate::runtime::EngineState;
use crate::storage::LinkTableError;
use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// A connection attempt was rejected
    #[error("Connection rejected: {0}")]
    Connect(#[from] ConnectError),

    /// The link table builder protocol was violated
    #[error("Link table error: {0}")]
    LinkTable(#[from] LinkTableError),

    /// A lifecycle entry point was called in the wrong state
    #[error("Cannot {action} while engine is {from:?}")]
    InvalidTransition {
        from: EngineState,
        action: &'static str,
    },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Config("missing runtime table".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing runtime table"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = EngineError::Config("bad depth".to_string());
        let with_ctx = err.with_context("Failed to load engine.toml");
        assert!(with_ctx.to_string().contains("Failed to load engine.toml"));
        assert!(with_ctx.to_string().contains("bad depth"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = EngineError::InvalidTransition {
            from: EngineState::Uninitialized,
            action: "start",
        };
        assert_eq!(err.to_string(), "Cannot start while engine is Uninitialized");
    }

    #[test]
    fn test_link_table_error_converts() {
        let err: EngineError = LinkTableError::Incomplete(2).into();
        assert!(matches!(err, EngineError::LinkTable(LinkTableError::Incomplete(2))));
        assert_eq!(
            err.to_string(),
            "Link table error: 2 reserved link entries were never written"
        );
    }

    #[test]
    fn test_connect_error_converts() {
        let err: EngineError = ConnectError::SameNode.into();
        assert!(matches!(err, EngineError::Connect(ConnectError::SameNode)));
    }
}
