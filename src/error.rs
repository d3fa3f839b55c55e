//! Error types for the key tree.

use crate::remote::RemoteError;
use crate::types::Scope;
use thiserror::Error;

/// Main error type for tree and session operations.
///
/// A key that is simply not present in a tree is not an error: the
/// structural operations report it with a `false` return instead.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Scope not open: {0}")]
    ScopeNotFound(Scope),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Group already exists: {0}")]
    GroupExists(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Invalid key separator: {0:?}")]
    InvalidSeparator(String),

    #[error("Remote command failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TreeError {
    fn from(e: serde_json::Error) -> Self {
        TreeError::Serialization(e.to_string())
    }
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
