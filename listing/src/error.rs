//! Error types for listings.

use thiserror::Error;

/// Result type alias for listing operations.
pub type Result<T> = std::result::Result<T, ListingError>;

/// Errors that can occur while reading or scanning a listing.
#[derive(Error, Debug)]
pub enum ListingError {
    /// Root path is missing or not a directory.
    #[error("not a directory: {0}")]
    InvalidRoot(String),

    /// Directory walk failed at the root.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Listing payload could not be decoded.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
