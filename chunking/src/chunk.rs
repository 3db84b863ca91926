//! Chunks and the batch handed to the embedding collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ChunkingConfig, ChunkingStrategy};
use crate::document::DocumentMeta;

/// A segment of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// `"{document_id}:{strategy}:{index}"`.
    pub id: String,

    /// Originating document.
    pub document_id: String,

    /// 0-based ordinal within this run.
    pub index: usize,

    /// Number of chunks produced by this run.
    pub total_chunks: usize,

    /// Text content.
    pub content: String,

    /// Strategy that was requested for this run.
    pub strategy: ChunkingStrategy,

    /// What this chunk holds.
    pub kind: ChunkKind,

    /// Character offset of the first character in the document.
    pub start_offset: Option<usize>,

    /// Character offset one past the last character.
    pub end_offset: Option<usize>,

    /// Strategy-specific and document metadata.
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Length of the content in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Error annotation of a fallback chunk.
    pub fn error(&self) -> Option<&str> {
        self.metadata.get("error").map(String::as_str)
    }

    pub fn is_fallback(&self) -> bool {
        self.kind == ChunkKind::Fallback
    }
}

/// Type of chunk content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Generic text window or recursive piece.
    Text,
    /// A heading section.
    Section,
    /// A group of paragraphs.
    Paragraph,
    /// A named top-level declaration.
    Declaration,
    /// Leftover material between declarations or sections.
    Residual,
    /// A recognised job-script or recipe section.
    Directive,
    /// Verbatim document after a strategy failure.
    Fallback,
}

/// All chunks of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedFile {
    pub original_file: DocumentMeta,
    pub chunks: Vec<Chunk>,
    pub chunk_count: usize,
    /// Size of the original text in bytes.
    pub original_size: u64,
}

/// Payload for the embedding collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedBatch {
    pub chunked_files: Vec<ChunkedFile>,
    pub total_chunks: usize,
    pub chunking_config: ChunkingConfig,
}

impl ChunkedBatch {
    /// Empty batch for `config`.
    pub fn new(chunking_config: ChunkingConfig) -> Self {
        Self {
            chunked_files: Vec::new(),
            total_chunks: 0,
            chunking_config,
        }
    }

    /// Append one document's chunks.
    pub fn push(&mut self, original_file: DocumentMeta, chunks: Vec<Chunk>) {
        let chunk_count = chunks.len();
        self.total_chunks += chunk_count;
        self.chunked_files.push(ChunkedFile {
            original_size: original_file.size,
            original_file,
            chunks,
            chunk_count,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.total_chunks == 0
    }

    /// Iterate over every chunk in file order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunked_files.iter().flat_map(|f| f.chunks.iter())
    }
}
