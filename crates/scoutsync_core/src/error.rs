//! Error types for scoutsync core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while building desired state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A rewrite rule pattern failed to compile.
    #[error("invalid rewrite pattern {pattern:?}: {source}")]
    InvalidRewrite {
        /// The offending pattern.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The managed tag is blank.
    #[error("invalid managed tag {0:?}")]
    InvalidManagedTag(String),

    /// A date field could not be parsed.
    #[error("invalid date {value:?} (expected YYYY-MM-DD)")]
    InvalidDate {
        /// The raw value.
        value: String,
    },
}
