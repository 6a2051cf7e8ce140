//! Error types for the gramin linking core.

use thiserror::Error;

/// Result type alias using gramin's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for village-linking operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Village not found
    #[error("Village not found: {0}")]
    VillageNotFound(uuid::Uuid),

    /// Link job not found
    #[error("Link job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// Audit entry not found
    #[error("Audit entry not found: {0}")]
    AuditNotFound(uuid::Uuid),

    /// Scan triggered inside another scan's cooldown window
    #[error("Rate limited: try again in {retry_after_mins} minute(s)")]
    RateLimited {
        /// Remaining wait time in whole minutes (ceiling).
        retry_after_mins: i64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed (no/invalid caller identity)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
