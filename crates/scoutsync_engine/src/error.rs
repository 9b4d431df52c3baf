//! Error types for the reconciliation engine.

use scoutsync_core::{CoreError, HttpError};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while reading or writing the directory.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A directory request failed.
    #[error("{operation} {target}: {source}")]
    Request {
        /// Operation name, e.g. `groups.get`.
        operation: &'static str,
        /// Group, alias or member the request was about.
        target: String,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },

    /// The directory rejected an operation.
    #[error("{operation} {target} rejected: {message}")]
    Rejected {
        /// Operation name.
        operation: &'static str,
        /// Target of the operation.
        target: String,
        /// Reason given by the directory.
        message: String,
    },

    /// The directory answered with something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No access token could be obtained.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid engine configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Error from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EngineError {
    /// Creates a request error.
    pub fn request(operation: &'static str, target: impl Into<String>, source: HttpError) -> Self {
        Self::Request {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Creates a rejection.
    pub fn rejected(
        operation: &'static str,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            operation,
            target: target.into(),
            message: message.into(),
        }
    }

    /// Returns true if the directory reported the target as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Request { source, .. } if source.is_not_found())
    }
}
