//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Letter content exceeds the storage ceiling for its kind.
    #[error("Letter content is {actual} characters, limit is {limit}")]
    ContentTooLong {
        /// Observed content length in characters.
        actual: usize,
        /// Ceiling for this kind of content.
        limit: usize,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
