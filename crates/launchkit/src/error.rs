//! Error types for launchd operations.
//!
//! Only hard failures are errors. Expected action outcomes (protected
//! services, wrong passwords, not-found) are reported as
//! [`ActionResult`](crate::types::ActionResult) values instead.

use std::time::Duration;
use thiserror::Error;

/// Categories of errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Timeouts and daemon-contact failures (transient, retryable)
    Transient,
    /// Required tool is missing
    ToolNotFound,
    /// Input rejected before anything ran
    Validation,
    /// Primary service listing failed
    Discovery,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Whether this error category is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Service manager temporarily unavailable",
            Self::ToolNotFound => "Required system tool not found",
            Self::Validation => "Invalid input",
            Self::Discovery => "Could not list services",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Transient => "Wait a moment and try again",
            Self::ToolNotFound => "This tool only works on macOS with launchctl available",
            Self::Validation => "Check the service label",
            Self::Discovery => "Check that launchd is reachable from this session",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while talking to the service manager.
#[derive(Debug, Error)]
pub enum Error {
    /// Executable could not be found
    #[error("command not found: {0}")]
    CommandNotFound(String),

    /// Process could not be spawned
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Command exceeded its timeout and was killed
    #[error("{command} timed out after {}s", timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    /// Transient failures persisted through every retry
    #[error("gave up after {attempts} attempts: {}", errors.last().map(String::as_str).unwrap_or("unknown error"))]
    RetriesExhausted { attempts: u32, errors: Vec<String> },

    /// Primary listing command failed
    #[error("service discovery failed: {message}")]
    DiscoveryFailed { message: String },

    /// Label does not match the safe identifier pattern
    #[error("invalid service label: {0:?}")]
    InvalidLabel(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Timeout { .. } | Error::RetriesExhausted { .. } => ErrorCategory::Transient,
            Error::CommandNotFound(_) => ErrorCategory::ToolNotFound,
            Error::InvalidLabel(_) => ErrorCategory::Validation,
            Error::DiscoveryFailed { .. } => ErrorCategory::Discovery,
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        // An exhausted retry loop must not be retried again by an outer loop
        matches!(self, Error::Timeout { .. })
    }

    /// Retry bookkeeping carried by the error, if any.
    pub fn retry_errors(&self) -> Option<(u32, &[String])> {
        match self {
            Error::RetriesExhausted { attempts, errors } => Some((*attempts, errors.as_slice())),
            _ => None,
        }
    }
}

/// Result type for launchd operations.
pub type Result<T> = std::result::Result<T, Error>;
