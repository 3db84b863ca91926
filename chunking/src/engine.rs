//! The segmentation engine.
//!
//! Strategies only decide where the cuts go: they return byte ranges into the
//! document text. The engine owns everything else (validation, ids, ordinals,
//! offsets, metadata) so every strategy, including custom ones, honours the
//! same output contract.

use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkKind, ChunkedBatch};
use crate::config::ChunkingConfig;
use crate::content_type::ContentType;
use crate::document::Document;
use crate::error::{Result, SegmentationError};
use crate::separators::SeparatorRegistry;
use crate::strategies;

/// Maps between byte positions and character offsets of one text.
#[derive(Debug, Clone)]
pub struct OffsetMap {
    byte_starts: Vec<usize>,
    byte_len: usize,
}

impl OffsetMap {
    pub fn new(text: &str) -> Self {
        Self {
            byte_starts: text.char_indices().map(|(idx, _)| idx).collect(),
            byte_len: text.len(),
        }
    }

    /// Number of characters in the text.
    pub fn char_len(&self) -> usize {
        self.byte_starts.len()
    }

    /// Character offset of the byte position `byte`.
    pub fn char_at(&self, byte: usize) -> usize {
        self.byte_starts.partition_point(|start| *start < byte)
    }

    /// Byte position of character offset `char_idx`, clamped to the text end.
    pub fn byte_at(&self, char_idx: usize) -> usize {
        self.byte_starts
            .get(char_idx)
            .copied()
            .unwrap_or(self.byte_len)
    }
}

/// A cut produced by a strategy: a byte range of the document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub range: Range<usize>,
    pub kind: ChunkKind,
    pub metadata: BTreeMap<String, String>,
}

impl Segment {
    pub fn new(range: Range<usize>, kind: ChunkKind) -> Self {
        Self {
            range,
            kind,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach one metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Everything a strategy may look at while splitting one document.
pub struct SegmentContext<'a> {
    pub document: &'a Document,
    pub config: &'a ChunkingConfig,
    pub separators: &'a SeparatorRegistry,
    offsets: OffsetMap,
}

impl<'a> SegmentContext<'a> {
    pub fn new(
        document: &'a Document,
        config: &'a ChunkingConfig,
        separators: &'a SeparatorRegistry,
    ) -> Self {
        Self {
            document,
            config,
            separators,
            offsets: OffsetMap::new(&document.text),
        }
    }

    pub fn text(&self) -> &'a str {
        &self.document.text
    }

    pub fn content_type(&self) -> ContentType {
        self.document.content_type()
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }
}

/// A segmentation strategy.
///
/// Implementations may fail with a [`SegmentationError`]; the engine turns
/// that (and any panic) into a single fallback chunk.
pub trait SegmentStrategy: Send + Sync {
    /// Name used in log messages.
    fn name(&self) -> &'static str;

    /// Cut the document into ordered segments.
    fn split(&self, ctx: &SegmentContext<'_>) -> std::result::Result<Vec<Segment>, SegmentationError>;
}

/// Segment `document` with the default separator registry.
pub fn segment(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    ChunkingEngine::new().segment(document, config)
}

/// Runs strategies against documents.
#[derive(Debug, Clone, Default)]
pub struct ChunkingEngine {
    separators: SeparatorRegistry,
}

impl ChunkingEngine {
    /// Create an engine with the default separator registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom separator registry.
    pub fn with_registry(separators: SeparatorRegistry) -> Self {
        Self { separators }
    }

    pub fn separators(&self) -> &SeparatorRegistry {
        &self.separators
    }

    /// Segment one document with the strategy named in `config`.
    pub fn segment(&self, document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
        config.validate()?;
        let strategy = strategies::builtin(config.strategy);
        Ok(self.run(document, config, strategy))
    }

    /// Segment one document with a custom strategy under the same contract.
    pub fn segment_with(
        &self,
        document: &Document,
        config: &ChunkingConfig,
        strategy: &dyn SegmentStrategy,
    ) -> Result<Vec<Chunk>> {
        config.validate()?;
        Ok(self.run(document, config, strategy))
    }

    /// Segment every document into the payload for the embedding stage.
    pub fn segment_batch(
        &self,
        documents: &[Document],
        config: &ChunkingConfig,
    ) -> Result<ChunkedBatch> {
        config.validate()?;
        let strategy = strategies::builtin(config.strategy);

        let mut batch = ChunkedBatch::new(config.clone());
        for document in documents {
            let chunks = self.run(document, config, strategy);
            batch.push(document.meta.clone(), chunks);
        }
        debug!(
            "Chunked {} documents into {} chunks",
            batch.chunked_files.len(),
            batch.total_chunks
        );
        Ok(batch)
    }

    fn run(
        &self,
        document: &Document,
        config: &ChunkingConfig,
        strategy: &dyn SegmentStrategy,
    ) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let ctx = SegmentContext::new(document, config, &self.separators);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.split(&ctx)))
            .unwrap_or_else(|payload| Err(SegmentationError::Internal(panic_message(&*payload))))
            .and_then(|segments| check_ranges(&document.text, segments));

        let segments = match outcome {
            Ok(segments) => segments,
            Err(err) => {
                warn!(
                    "{} strategy failed on {}, emitting fallback chunk: {err}",
                    strategy.name(),
                    document.id
                );
                vec![
                    Segment::new(0..document.text.len(), ChunkKind::Fallback)
                        .with_meta("error", err.to_string()),
                ]
            }
        };

        let chunks = finalize(&ctx, segments);
        debug!(
            "Segmented {} into {} chunks ({})",
            document.id,
            chunks.len(),
            strategy.name()
        );
        chunks
    }
}

fn check_ranges(
    text: &str,
    segments: Vec<Segment>,
) -> std::result::Result<Vec<Segment>, SegmentationError> {
    match segments
        .iter()
        .find(|s| s.range.start > s.range.end || text.get(s.range.clone()).is_none())
    {
        Some(bad) => Err(SegmentationError::Internal(format!(
            "segment range {:?} is not a valid slice of the document",
            bad.range
        ))),
        None => Ok(segments),
    }
}

fn finalize(ctx: &SegmentContext<'_>, segments: Vec<Segment>) -> Vec<Chunk> {
    let document = ctx.document;
    let config = ctx.config;
    let text = ctx.text();
    let offsets = ctx.offsets();

    let segments: Vec<Segment> = segments
        .into_iter()
        .filter(|s| !s.range.is_empty())
        .collect();
    let total = segments.len();

    segments
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            let mut metadata = segment.metadata;
            if config.preserve_metadata {
                metadata.insert("name".to_string(), document.meta.name.clone());
                metadata.insert("path".to_string(), document.meta.path.clone());
                metadata.insert(
                    "content_type".to_string(),
                    document.content_type().as_str().to_string(),
                );
                if let Some(extension) = &document.meta.extension {
                    metadata.insert("extension".to_string(), extension.clone());
                }
            }

            Chunk {
                id: format!("{}:{}:{index}", document.id, config.strategy),
                document_id: document.id.clone(),
                index,
                total_chunks: total,
                content: text[segment.range.clone()].to_string(),
                strategy: config.strategy,
                kind: segment.kind,
                start_offset: Some(offsets.char_at(segment.range.start)),
                end_offset: Some(offsets.char_at(segment.range.end)),
                metadata,
            }
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "strategy panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingStrategy;
    use crate::error::ChunkingError;
    use pretty_assertions::assert_eq;

    struct Halves;

    impl SegmentStrategy for Halves {
        fn name(&self) -> &'static str {
            "halves"
        }

        fn split(
            &self,
            ctx: &SegmentContext<'_>,
        ) -> std::result::Result<Vec<Segment>, SegmentationError> {
            let mid = ctx.offsets().byte_at(ctx.offsets().char_len() / 2);
            Ok(vec![
                Segment::new(0..mid, ChunkKind::Text),
                Segment::new(mid..mid, ChunkKind::Text),
                Segment::new(mid..ctx.text().len(), ChunkKind::Text),
            ])
        }
    }

    struct Panics;

    impl SegmentStrategy for Panics {
        fn name(&self) -> &'static str {
            "panics"
        }

        fn split(
            &self,
            _ctx: &SegmentContext<'_>,
        ) -> std::result::Result<Vec<Segment>, SegmentationError> {
            panic!("boom")
        }
    }

    struct BadRange;

    impl SegmentStrategy for BadRange {
        fn name(&self) -> &'static str {
            "bad-range"
        }

        fn split(
            &self,
            ctx: &SegmentContext<'_>,
        ) -> std::result::Result<Vec<Segment>, SegmentationError> {
            Ok(vec![Segment::new(0..ctx.text().len() + 5, ChunkKind::Text)])
        }
    }

    #[test]
    fn test_offset_map_multibyte() {
        let map = OffsetMap::new("aé😀b");
        assert_eq!(map.char_len(), 4);
        assert_eq!(map.byte_at(2), 3);
        assert_eq!(map.byte_at(3), 7);
        assert_eq!(map.byte_at(9), 8);
        assert_eq!(map.char_at(7), 3);
        assert_eq!(map.char_at(8), 4);
    }

    #[test]
    fn test_custom_strategy_gets_contract() {
        let doc = Document::new("a.txt", "héllo world");
        let config = ChunkingConfig::new(ChunkingStrategy::Fixed).with_preserve_metadata(false);
        let chunks = ChunkingEngine::new()
            .segment_with(&doc, &config, &Halves)
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "a.txt:fixed:0");
        assert_eq!(chunks[1].id, "a.txt:fixed:1");
        assert_eq!(chunks[0].content, "héllo");
        assert_eq!(chunks[1].start_offset, Some(5));
        assert_eq!(chunks[1].end_offset, Some(11));
        assert!(chunks.iter().all(|c| c.total_chunks == 2));
        assert!(chunks.iter().all(|c| c.metadata.is_empty()));
    }

    #[test]
    fn test_panic_becomes_fallback_chunk() {
        let doc = Document::new("a.txt", "some text");
        let chunks = ChunkingEngine::new()
            .segment_with(&doc, &ChunkingConfig::default(), &Panics)
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_fallback());
        assert_eq!(chunks[0].content, "some text");
        assert_eq!(chunks[0].error(), Some("segmentation failed: boom"));
    }

    #[test]
    fn test_invalid_range_becomes_fallback_chunk() {
        let doc = Document::new("a.txt", "abc");
        let chunks = ChunkingEngine::new()
            .segment_with(&doc, &ChunkingConfig::default(), &BadRange)
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].error().is_some());
    }

    #[test]
    fn test_config_checked_before_processing() {
        let doc = Document::new("a.txt", "abc");
        let config = ChunkingConfig::default().with_chunk_size(5).with_overlap(5);
        let err = ChunkingEngine::new()
            .segment_with(&doc, &config, &Panics)
            .unwrap_err();
        assert!(matches!(err, ChunkingError::OverlapTooLarge { .. }));
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        let doc = Document::new("empty.md", "");
        assert!(segment(&doc, &ChunkingConfig::default()).unwrap().is_empty());
    }

    #[test]
    fn test_preserved_metadata() {
        let doc = Document::new("docs/guide.md", "Hello there.");
        let chunks = segment(&doc, &ChunkingConfig::default()).unwrap();
        let meta = &chunks[0].metadata;
        assert_eq!(meta["name"], "guide.md");
        assert_eq!(meta["path"], "docs/guide.md");
        assert_eq!(meta["extension"], "md");
        assert_eq!(meta["content_type"], "markdown");
    }
}
