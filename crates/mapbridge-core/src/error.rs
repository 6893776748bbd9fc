//! Error types for the mapbridge browser-map core.
//!
//! Most runtime faults on the callback path are swallowed by design of the
//! protocol (malformed or stale callbacks are dropped), so the errors here
//! cover the operations that can genuinely fail: configuration, binding the
//! callback listener, and talking to the browser engine.

use thiserror::Error;

/// Result type alias using MapError as the error type.
pub type Result<T> = std::result::Result<T, MapError>;

/// Top-level error type for all mapbridge operations.
#[derive(Debug, Error)]
pub enum MapError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Callback channel errors
    #[error("Callback channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Browser engine errors
    #[error("Map engine error: {0}")]
    Engine(#[from] EngineError),

    /// The map did not report itself initialized in time
    #[error("Map view not initialized after {attempts} attempts")]
    InitializationFailed { attempts: u32 },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by the callback channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Listener could not bind its socket
    #[error("Failed to bind callback listener to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Channel was started twice
    #[error("Callback channel already running")]
    AlreadyRunning,

    /// Consumer of parsed callbacks went away
    #[error("Callback consumer disconnected")]
    ConsumerGone,
}

impl ChannelError {
    /// Creates a bind failed error.
    pub fn bind_failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while executing scripts in the browser.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Script execution failed inside the browser
    #[error("Script execution failed: {reason}")]
    ScriptFailed { reason: String },

    /// Browser component is gone
    #[error("Map engine unavailable")]
    Unavailable,
}

impl EngineError {
    /// Creates a script failed error.
    pub fn script_failed(reason: impl Into<String>) -> Self {
        Self::ScriptFailed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_helpers() {
        let err = ConfigError::invalid_value("reducer.selection_budget", "must be positive");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
        assert!(err.to_string().contains("reducer.selection_budget"));
    }

    #[test]
    fn test_channel_error_display() {
        let err: MapError = ChannelError::bind_failed("127.0.0.1:0", "denied").into();
        let display = err.to_string();
        assert!(display.contains("127.0.0.1:0"));
        assert!(display.contains("denied"));
    }
}
