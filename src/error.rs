//! Error types for blobstack

use thiserror::Error;

/// Result type alias for blobstack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blobstack operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Length mismatch for {key}: declared {expected} bytes, transferred {actual}")]
    LengthMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// True when the error reports an absent key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
