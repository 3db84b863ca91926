//! # Chunking
//!
//! Multi-strategy document segmentation for retrieval pipelines.
//!
//! ## Strategies
//!
//! - **Fixed**: character windows with overlap, optionally aligned to whitespace
//! - **Recursive**: coarse-to-fine separators chosen by content type
//! - **Semantic**: heading sections, then paragraph groups
//! - **Code**: top-level declarations of common languages
//! - **Domain**: job-script directives and build-recipe sections
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      ChunkingEngine                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ChunkingConfig ──► validate ──► SegmentStrategy ──► Segment    │
//! │                                        │               │        │
//! │                                        ▼               ▼        │
//! │                             SeparatorRegistry    Chunk (ids,    │
//! │                                                  offsets, meta) │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A strategy never fails the caller: on error the document comes back as
//! one `Fallback` chunk carrying the error message.

pub mod chunk;
pub mod config;
pub mod content_type;
pub mod document;
pub mod engine;
pub mod error;
pub mod separators;
pub mod strategies;

pub use chunk::{Chunk, ChunkKind, ChunkedBatch, ChunkedFile};
pub use config::{ChunkingConfig, ChunkingStrategy};
pub use content_type::ContentType;
pub use document::{Document, DocumentMeta};
pub use engine::{ChunkingEngine, OffsetMap, Segment, SegmentContext, SegmentStrategy, segment};
pub use error::{ChunkingError, Result, SegmentationError};
pub use separators::{Separator, SeparatorRegistry};
