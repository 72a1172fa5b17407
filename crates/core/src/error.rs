//! Core error model.

use thiserror::Error;

/// Result type used by the core helpers.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the shared primitives.
///
/// Component crates wrap these in their own error enums.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A stored counter value was not a non-negative decimal integer.
    #[error("invalid counter value: {0:?}")]
    InvalidCounter(String),

    /// An identifier was empty or otherwise unusable.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl CoreError {
    pub fn invalid_counter(value: impl Into<String>) -> Self {
        Self::InvalidCounter(value.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
