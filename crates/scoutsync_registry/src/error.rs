//! Error types for the registry readers.

use scoutsync_core::HttpError;
use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur while reading the registry.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The request failed or returned a non-success status.
    #[error("registry request to {url} failed: {source}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying HTTP failure.
        #[source]
        source: HttpError,
    },

    /// The response did not have the expected shape.
    #[error("unexpected registry response from {url}: {message}")]
    Malformed {
        /// Requested URL.
        url: String,
        /// What was wrong.
        message: String,
    },
}

impl RegistryError {
    /// Creates a request error.
    pub fn request(url: impl Into<String>, source: HttpError) -> Self {
        Self::Request {
            url: url.into(),
            source,
        }
    }

    /// Creates a malformed-response error.
    pub fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status, if the registry answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Request { source, .. } => source.status,
            RegistryError::Malformed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_for_answered_requests() {
        let err = RegistryError::request("https://r.test", HttpError::status(401, "denied"));
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            err.to_string(),
            "registry request to https://r.test failed: HTTP 401: denied"
        );
        assert_eq!(RegistryError::malformed("u", "no data").status(), None);
    }
}
