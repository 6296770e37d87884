//! Validated name newtypes for domain entities
//!
//! These newtypes ensure that names are valid by construction:
//! non-empty and trimmed of leading/trailing whitespace. Length is not capped.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

// ============================================================================
// GameTitle
// ============================================================================

/// A validated game title (non-empty, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameTitle(String);

impl GameTitle {
    /// Create a new validated game title.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the title is empty after trimming.
    pub fn new(title: impl Into<String>) -> Result<Self, DomainError> {
        let title = title.into();
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("Game title cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the title as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for GameTitle {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<GameTitle> for String {
    fn from(title: GameTitle) -> String {
        title.0
    }
}
