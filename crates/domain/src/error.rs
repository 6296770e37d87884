//! Error type for domain constructors and string parsing.
//!
//! Validation of whole game payloads is not an error; it produces a
//! [`ValidationReport`](crate::ValidationReport).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value broke a constructor rule (blank title)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An id string is not a UUID
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// A wire string names no known variant (asset kind, vote type, merge mode...)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// For `FromStr` impls whose input matches no variant.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}
