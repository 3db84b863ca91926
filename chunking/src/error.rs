//! Error types for the segmentation engine.

use thiserror::Error;

/// Result type alias for chunking operations.
pub type Result<T> = std::result::Result<T, ChunkingError>;

/// Errors surfaced to callers of the engine.
///
/// These are configuration problems and are always reported before any
/// document is touched. Failures inside a strategy never show up here; they
/// degrade to a fallback chunk instead (see [`SegmentationError`]).
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// `chunk_size` must be at least one character.
    #[error("chunk size must be greater than zero, got {0}")]
    InvalidChunkSize(i64),

    /// Overlap cannot be negative.
    #[error("overlap must not be negative, got {0}")]
    NegativeOverlap(i64),

    /// Overlap must be strictly smaller than the chunk size.
    #[error("overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },

    /// Strategy name not recognised.
    #[error("unknown chunking strategy: {0}")]
    UnknownStrategy(String),

    /// Configuration payload could not be decoded.
    #[error("invalid chunking configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChunkingError {
    /// Whether this is a configuration error (as opposed to a decoding error).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidChunkSize(_)
                | Self::NegativeOverlap(_)
                | Self::OverlapTooLarge { .. }
                | Self::UnknownStrategy(_)
        )
    }
}

/// Errors raised inside a strategy implementation.
///
/// The engine catches these per document and replaces the output with a
/// single verbatim chunk annotated with the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentationError {
    /// Braces or block keywords in a declaration never balance.
    #[error("unbalanced delimiters in `{symbol}` starting at line {line}")]
    UnbalancedDelimiters { symbol: String, line: usize },

    /// A declaration or section pattern failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// Any other internal failure.
    #[error("segmentation failed: {0}")]
    Internal(String),
}

impl From<regex_lite::Error> for SegmentationError {
    fn from(err: regex_lite::Error) -> Self {
        Self::InvalidPattern(err.to_string())
    }
}
