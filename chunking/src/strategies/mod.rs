//! Built-in segmentation strategies.

mod code;
mod domain;
mod fixed;
mod recursive;
mod semantic;

pub use code::CodeStrategy;
pub use domain::DomainStrategy;
pub use fixed::FixedStrategy;
pub use recursive::RecursiveStrategy;
pub use semantic::SemanticStrategy;

use crate::config::ChunkingStrategy;
use crate::engine::SegmentStrategy;

static FIXED: FixedStrategy = FixedStrategy;
static RECURSIVE: RecursiveStrategy = RecursiveStrategy;
static SEMANTIC: SemanticStrategy = SemanticStrategy;
static CODE: CodeStrategy = CodeStrategy;
static DOMAIN: DomainStrategy = DomainStrategy;

/// The implementation behind a configured strategy.
pub fn builtin(strategy: ChunkingStrategy) -> &'static dyn SegmentStrategy {
    match strategy {
        ChunkingStrategy::Fixed => &FIXED,
        ChunkingStrategy::Recursive => &RECURSIVE,
        ChunkingStrategy::Semantic => &SEMANTIC,
        ChunkingStrategy::Code => &CODE,
        ChunkingStrategy::Domain => &DOMAIN,
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Line slices of `text` with their starting byte position, newlines kept.
pub(crate) fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0, |pos, line| {
        let start = *pos;
        *pos += line.len();
        Some((start, line))
    })
}
