//! Error types for recwatch.
//!
//! All errors are strongly typed using thiserror. The only contract
//! violations the engine reports are invalid arguments, raised synchronously
//! at the violating call and never deferred.

use thiserror::Error;

/// Validation errors raised when a call violates the engine contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Record is not extensible and cannot accept new instrumentation")]
    RecordNotExtensible,

    #[error("Change type must be a non-empty string")]
    EmptyChangeType,
}

/// Top-level error type for recwatch.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl WatchError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for recwatch operations.
pub type WatchResult<T> = Result<T, WatchError>;
