//! Error types for Mika.
//!
//! Defines the main error enum used throughout the application.

use serde_json::{json, Value};
use thiserror::Error;

/// Main error type for Mika operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MikaError {
    /// Missing or invalid configuration (base URL, API key, config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or connection failures talking to the BI platform.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the BI platform.
    #[error("Remote error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// A card write was attempted while the metadata cache holds no database.
    #[error("No database available: metadata cache is empty")]
    NoDatabaseAvailable,

    /// Malformed tool arguments or an unknown tool.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal application errors (unexpected response shapes, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MikaError {
    /// Creates a configuration error with the given message.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a remote error from an HTTP status and response body.
    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Configuration Error",
            Self::Transport(_) => "Transport Error",
            Self::Remote { .. } => "Remote Error",
            Self::NoDatabaseAvailable => "No Database Available",
            Self::Validation(_) => "Validation Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns a stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Transport(_) => "transport",
            Self::Remote { .. } => "remote",
            Self::NoDatabaseAvailable => "no_database_available",
            Self::Validation(_) => "validation",
            Self::Internal(_) => "internal",
        }
    }

    /// Renders the error as the structured failure returned to the agent.
    pub fn to_tool_error(&self) -> Value {
        let mut error = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Remote { status, body } = self {
            error["status"] = json!(status);
            error["body"] = json!(body);
        }
        json!({ "error": error })
    }
}

/// Result type alias using MikaError.
pub type Result<T> = std::result::Result<T, MikaError>;
