//! Recursive splitting over a coarse-to-fine separator list.

use std::ops::Range;

use super::char_len;
use crate::chunk::ChunkKind;
use crate::engine::{OffsetMap, Segment, SegmentContext, SegmentStrategy};
use crate::error::SegmentationError;
use crate::separators::Separator;

/// Splits on the coarsest separator first and only descends into pieces
/// that are still too large.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveStrategy;

impl SegmentStrategy for RecursiveStrategy {
    fn name(&self) -> &'static str {
        "recursive"
    }

    fn split(&self, ctx: &SegmentContext<'_>) -> Result<Vec<Segment>, SegmentationError> {
        let separators = ctx.separators.get(ctx.content_type());
        Ok(recursive_segments(ctx, separators, ChunkKind::Text))
    }
}

/// Recursive chunking of the whole document with overlap applied.
pub(crate) fn recursive_segments(
    ctx: &SegmentContext<'_>,
    separators: &[Separator],
    kind: ChunkKind,
) -> Vec<Segment> {
    let size = ctx.config.chunk_size;
    let overlap = ctx.config.overlap;
    let ranges = split_ranges(ctx.text(), separators, size - overlap);

    with_overlap(ranges, ctx.offsets(), overlap)
        .into_iter()
        .map(|range| Segment::new(range, kind))
        .collect()
}

/// Extend every range after the first with the `overlap` characters that
/// precede it.
///
/// `ranges` must tile the text from its start. The leading range absorbs its
/// successors until it holds at least `overlap` characters, so every later
/// range gets a full prefix and skipping `overlap` characters of each later
/// chunk rebuilds the text.
pub(crate) fn with_overlap(
    ranges: Vec<Range<usize>>,
    offsets: &OffsetMap,
    overlap: usize,
) -> Vec<Range<usize>> {
    if overlap == 0 {
        return ranges;
    }
    let mut ranges = ranges.into_iter();
    let Some(mut lead) = ranges.next() else {
        return Vec::new();
    };
    while offsets.char_at(lead.end) - offsets.char_at(lead.start) < overlap {
        match ranges.next() {
            Some(next) => lead.end = next.end,
            None => break,
        }
    }

    std::iter::once(lead)
        .chain(ranges.map(|range| {
            let start = offsets.char_at(range.start).saturating_sub(overlap);
            offsets.byte_at(start)..range.end
        }))
        .collect()
}

/// Contiguous byte ranges of `text` of at most `budget` characters each,
/// except pieces no separator can break.
///
/// The ranges tile `text` exactly.
pub(crate) fn split_ranges(
    text: &str,
    separators: &[Separator],
    budget: usize,
) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    split_into(text, 0, separators, budget.max(1), &mut out);
    out
}

fn split_into(
    text: &str,
    base: usize,
    separators: &[Separator],
    budget: usize,
    out: &mut Vec<Range<usize>>,
) {
    if text.is_empty() {
        return;
    }
    if char_len(text) <= budget {
        out.push(base..base + text.len());
        return;
    }
    let Some((separator, finer)) = separators.split_first() else {
        out.push(base..base + text.len());
        return;
    };

    let pieces = separator.split(text);
    if pieces.len() <= 1 {
        split_into(text, base, finer, budget, out);
        return;
    }

    let mut buf_start = base;
    let mut buf_chars = 0;
    let mut pos = base;
    for piece in pieces {
        let piece_chars = char_len(piece);
        if buf_chars + piece_chars <= budget {
            buf_chars += piece_chars;
            pos += piece.len();
            continue;
        }

        if buf_chars > 0 {
            out.push(buf_start..pos);
        }
        if piece_chars > budget {
            split_into(piece, pos, finer, budget, out);
            pos += piece.len();
            buf_start = pos;
            buf_chars = 0;
        } else {
            buf_start = pos;
            buf_chars = piece_chars;
            pos += piece.len();
        }
    }
    if buf_chars > 0 {
        out.push(buf_start..pos);
    }
}
