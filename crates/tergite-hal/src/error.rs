//! Error types for the HAL crate.

use std::path::PathBuf;

use tergite_compile::CompileError;
use thiserror::Error;

/// Coarse classification of a [`HalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or configuration: unknown backend, malformed record, bad account.
    Configuration,
    /// The remote service could not be reached or answered with an error.
    Transport,
    /// An operation was called in a state that does not allow it.
    State,
    /// Data returned by the service does not match what was expected.
    Consistency,
    /// Local file system failure.
    Io,
}

/// Errors that can occur in HAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Non-OK response from the service.
    #[error("{context}: {detail}")]
    Api {
        /// What was being attempted.
        context: String,
        /// HTTP status code.
        status: u16,
        /// Server-provided `detail`, or the raw response text.
        detail: String,
    },

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compilation error.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable account file.
    #[error("Account file error: {0}")]
    AccountFile(#[from] ini::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No backend matches a lookup.
    #[error("No backend matches the criteria: {0}")]
    BackendNotFound(String),

    /// Several backends match a lookup that expects one.
    #[error("More than one backend matches the criteria: {0}")]
    MultipleBackends(String),

    /// No provider account is loaded.
    #[error("No provider account is available. Provide one via use_provider_account(..)")]
    NoProvider,

    /// Operation not allowed in the job's current state.
    #[error("Invalid job state: {0}")]
    InvalidState(String),

    /// Unsupported feature.
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Job ended in the error state without results.
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Job was cancelled before producing results.
    #[error("Job cancelled: {0}")]
    JobCancelled(String),

    /// A downloaded logfile lacks the job data it should carry.
    #[error("Malformed logfile {}: {reason}", path.display())]
    Logfile {
        /// Local path of the logfile.
        path: PathBuf,
        /// What is missing or unreadable.
        reason: String,
    },

    /// Timeout waiting for job.
    #[error("Timeout waiting for job {0}")]
    Timeout(String),
}

impl HalError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HalError::Api { .. } | HalError::Network(_) | HalError::Timeout(_) => {
                ErrorKind::Transport
            }
            HalError::Serialization(_) | HalError::Logfile { .. } => ErrorKind::Consistency,
            HalError::Io(_) => ErrorKind::Io,
            HalError::InvalidState(_) | HalError::JobFailed(_) | HalError::JobCancelled(_) => {
                ErrorKind::State
            }
            HalError::Compile(_)
            | HalError::AccountFile(_)
            | HalError::Configuration(_)
            | HalError::BackendNotFound(_)
            | HalError::MultipleBackends(_)
            | HalError::NoProvider
            | HalError::Unsupported(_) => ErrorKind::Configuration,
        }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HalError::Network(_) | HalError::Timeout(_) => true,
            HalError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> HalError {
        HalError::Api {
            context: "Error retrieving backends".into(),
            status,
            detail: "Unauthorized".into(),
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(api(401).to_string(), "Error retrieving backends: Unauthorized");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(api(401).kind(), ErrorKind::Transport);
        assert_eq!(
            HalError::InvalidState("submitted".into()).kind(),
            ErrorKind::State
        );
        assert_eq!(
            HalError::BackendNotFound("loke".into()).kind(),
            ErrorKind::Configuration
        );
        let compile: HalError = CompileError::CouplingNotFound {
            control: 0,
            target: 3,
        }
        .into();
        assert_eq!(compile.kind(), ErrorKind::Configuration);
        assert_eq!(compile.to_string(), "Coupling (0, 3) not in coupling map.");
    }

    #[test]
    fn test_retryable() {
        assert!(!api(401).is_retryable());
        assert!(api(503).is_retryable());
        assert!(api(429).is_retryable());
        assert!(!HalError::NoProvider.is_retryable());
    }
}
