//! Common error types for smogwatch

use thiserror::Error;

/// Common result type for smogwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the server and library code
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failure (bad credentials, invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
