//! Domain error types for the Xray sync.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use std::fmt;

use crate::config::ConfigError;

/// External system an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum System {
    Xray,
    Jira,
    Nextworld,
}

impl fmt::Display for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xray => write!(f, "Xray"),
            Self::Jira => write!(f, "Jira"),
            Self::Nextworld => write!(f, "Nextworld"),
        }
    }
}

/// Sync-level errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Configuration missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Credential exchange rejected
    #[error("Error getting {system} access token: {message}")]
    Auth { system: System, message: String },

    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote API answered with a non-success status
    #[error("{system} request failed with status {status}: {body}")]
    Api {
        system: System,
        status: u16,
        body: String,
    },

    /// GraphQL response carried errors or no data
    #[error("Xray GraphQL error: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    /// Response body did not match the expected shape
    #[error("Failed to decode {system} response: {message}")]
    Decode { system: System, message: String },

    /// Configured test execution does not exist in Xray
    #[error("Xray test execution {0} not found. Check the configured test execution ids")]
    ExecutionNotFound(String),
}

impl SyncError {
    /// Build an `Api` error from a response status and body text.
    pub fn api(system: System, status: reqwest::StatusCode, body: impl Into<String>) -> Self {
        SyncError::Api {
            system,
            status: status.as_u16(),
            body: body.into(),
        }
    }

    /// Build an `Auth` error.
    pub fn auth(system: System, message: impl Into<String>) -> Self {
        SyncError::Auth {
            system,
            message: message.into(),
        }
    }

    /// Build a `Decode` error.
    pub fn decode(system: System, message: impl fmt::Display) -> Self {
        SyncError::Decode {
            system,
            message: message.to_string(),
        }
    }
}

/// Convenience type alias for Results with SyncError.
pub type SyncResult<T> = Result<T, SyncError>;

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Http(err.to_string())
    }
}
