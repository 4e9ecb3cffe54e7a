//! Error types for activity-relay-rs.

use thiserror::Error;

/// Relay result type.
pub type RelayResult<T> = Result<T, RelayError>;

/// Relay error type.
///
/// Every variant is fatal at startup: a caller that receives one must not
/// continue with a partially built configuration or dispatcher.
#[derive(Debug, Error)]
pub enum RelayError {
    // === Startup validation ===
    #[error("Invalid setting {key}: {reason}")]
    ConfigSyntax {
        /// Setting name the value was read from.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    #[error("Actor key error: {0}")]
    Key(String),

    #[error("Broker connection error: {0}")]
    BrokerConnection(String),

    // === Runtime ===
    #[error("Configuration source error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Shorthand for a [`RelayError::ConfigSyntax`] on `key`.
    pub fn syntax(key: &'static str, reason: impl Into<String>) -> Self {
        Self::ConfigSyntax {
            key,
            reason: reason.into(),
        }
    }

    /// Returns the error code used in logs.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigSyntax { .. } => "CONFIG_SYNTAX_ERROR",
            Self::Key(_) => "KEY_ERROR",
            Self::BrokerConnection(_) => "BROKER_CONNECTION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether the error was caused by the broker rather than local state.
    #[must_use]
    pub const fn is_broker_error(&self) -> bool {
        matches!(self, Self::BrokerConnection(_) | Self::Queue(_))
    }
}

// === From implementations ===

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
