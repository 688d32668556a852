use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the blog-image-deduper library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error talking to a remote backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local database error
    #[error("Database error: {0}")]
    Database(String),

    /// Object storage rejected a request
    #[error("Storage error ({status}): {message}")]
    Storage { status: u16, message: String },

    /// Blog store rejected a query
    #[error("Blog store error: {0}")]
    BlogStore(String),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Object not found in storage
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Caller supplied an unusable request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}
