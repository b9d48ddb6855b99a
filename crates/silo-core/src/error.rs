//! Error types and result aliases for silo.
//!
//! This module defines the shared error types used across all silo components.
//! Errors are structured for programmatic handling and include context for debugging.

/// The result type used throughout silo.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in silo operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A block or object was not found in a storage tier.
    #[error("not found: {0}")]
    NotFound(String),

    /// A range-read argument was out of bounds for the block.
    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new storage error with the given message.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this error means the block does not exist.
    ///
    /// The cache layer uses this to distinguish a miss from a failing
    /// cache tier.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
