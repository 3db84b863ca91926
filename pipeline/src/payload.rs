//! Stage configurations and outputs.

use std::fmt;

use ragflow_chunking::{ChunkedBatch, ChunkingConfig, Document};
use ragflow_listing::{FileSelection, FilterConfig, RepoListing};
use serde::{Deserialize, Serialize};

/// Configuration attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "camelCase")]
pub enum StageConfig {
    /// Folder and format filter.
    Filter(FilterConfig),

    /// Segmentation parameters.
    Chunk(ChunkingConfig),

    /// No configuration.
    #[default]
    None,
}

impl StageConfig {
    /// Filter configuration, or the default one for an unconfigured node.
    pub fn filter(&self) -> Option<FilterConfig> {
        match self {
            Self::Filter(config) => Some(config.clone()),
            Self::None => Some(FilterConfig::default()),
            Self::Chunk(_) => None,
        }
    }

    /// Chunking configuration, or the default one for an unconfigured node.
    pub fn chunking(&self) -> Option<ChunkingConfig> {
        match self {
            Self::Chunk(config) => Some(config.clone()),
            Self::None => Some(ChunkingConfig::default()),
            Self::Filter(_) => None,
        }
    }
}

/// Kind tag of a [`StageOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Listing,
    Selection,
    Documents,
    Chunks,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Selection => "selection",
            Self::Documents => "documents",
            Self::Chunks => "chunks",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output committed by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum StageOutput {
    /// Repository listing from the fetch collaborator.
    Listing(RepoListing),

    /// Entries kept by the filter.
    Selection(FileSelection),

    /// Fetched documents.
    Documents(Vec<Document>),

    /// Segmented documents for the embedding collaborator.
    Chunks(ChunkedBatch),
}

impl StageOutput {
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Listing(_) => OutputKind::Listing,
            Self::Selection(_) => OutputKind::Selection,
            Self::Documents(_) => OutputKind::Documents,
            Self::Chunks(_) => OutputKind::Chunks,
        }
    }

    /// Whether the payload carries nothing a downstream stage could use.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Listing(listing) => listing.is_empty(),
            Self::Selection(selection) => selection.is_empty(),
            Self::Documents(documents) => documents.is_empty(),
            Self::Chunks(batch) => batch.is_empty(),
        }
    }

    /// Number of items in the payload.
    pub fn len(&self) -> usize {
        match self {
            Self::Listing(listing) => listing.contents.len(),
            Self::Selection(selection) => selection.len(),
            Self::Documents(documents) => documents.len(),
            Self::Chunks(batch) => batch.total_chunks,
        }
    }
}
