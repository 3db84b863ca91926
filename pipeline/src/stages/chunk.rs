use async_trait::async_trait;
use ragflow_chunking::ChunkingEngine;
use tracing::{debug, warn};

use super::Stage;
use crate::discovery::StageInput;
use crate::error::StageFailure;
use crate::node::StageKind;
use crate::payload::{OutputKind, StageConfig, StageOutput};

/// Segments documents into chunks for the embedding collaborator.
#[derive(Debug, Clone, Default)]
pub struct ChunkStage {
    engine: ChunkingEngine,
}

impl ChunkStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom engine, e.g. one with its own separator registry.
    pub fn with_engine(engine: ChunkingEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Stage for ChunkStage {
    fn kind(&self) -> StageKind {
        StageKind::Chunk
    }

    fn accepts(&self) -> &[OutputKind] {
        &[OutputKind::Documents]
    }

    async fn process(
        &self,
        input: StageInput,
        config: &StageConfig,
    ) -> Result<StageOutput, StageFailure> {
        let chunking = config
            .chunking()
            .ok_or_else(|| StageFailure::new("chunk stage needs a chunking configuration"))?;
        let StageOutput::Documents(documents) = input.payload.as_ref() else {
            return Err(StageFailure::new(format!(
                "chunk stage cannot read {} output",
                input.payload.kind()
            )));
        };

        let batch = self.engine.segment_batch(documents, &chunking)?;

        let fallbacks = batch.chunks().filter(|c| c.is_fallback()).count();
        if fallbacks > 0 {
            warn!("{fallbacks} documents fell back to a single chunk");
        }
        debug!(
            "Chunk stage produced {} chunks with {} strategy",
            batch.total_chunks, chunking.strategy
        );
        Ok(StageOutput::Chunks(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ragflow_chunking::{ChunkingConfig, ChunkingStrategy, Document};
    use std::sync::Arc;

    fn input(documents: Vec<Document>) -> StageInput {
        StageInput {
            source: "parse".into(),
            revision: 1,
            payload: Arc::new(StageOutput::Documents(documents)),
        }
    }

    #[tokio::test]
    async fn test_chunks_every_document() {
        let config = StageConfig::Chunk(
            ChunkingConfig::new(ChunkingStrategy::Fixed)
                .with_chunk_size(4)
                .with_overlap(0),
        );
        let documents = vec![Document::new("a.txt", "abcdefgh"), Document::new("b.txt", "xyz")];

        let output = ChunkStage::new().process(input(documents), &config).await.unwrap();

        let StageOutput::Chunks(batch) = output else {
            panic!("expected chunks");
        };
        assert_eq!(batch.total_chunks, 3);
        assert_eq!(batch.chunked_files[0].chunk_count, 2);
        assert_eq!(batch.chunking_config.chunk_size, 4);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_the_run() {
        let config = StageConfig::Chunk(
            ChunkingConfig::new(ChunkingStrategy::Recursive)
                .with_chunk_size(10)
                .with_overlap(10),
        );

        let err = ChunkStage::new()
            .process(input(vec![Document::new("a.txt", "text")]), &config)
            .await
            .unwrap_err();

        assert_eq!(err.message(), "invalid chunking configuration");
        assert!(err.detail().contains("overlap (10)"));
    }
}
