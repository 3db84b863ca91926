//! Fixed-size windows with overlap.

use crate::chunk::ChunkKind;
use crate::engine::{Segment, SegmentContext, SegmentStrategy};
use crate::error::SegmentationError;

/// Windows of `chunk_size` characters advancing by `chunk_size - overlap`.
///
/// Whitespace-only windows are dropped. With `smart_boundaries` a window that
/// would end mid-text is pulled back to the last whitespace in its second
/// half and the next window starts `overlap` characters before that end.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedStrategy;

impl SegmentStrategy for FixedStrategy {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn split(&self, ctx: &SegmentContext<'_>) -> Result<Vec<Segment>, SegmentationError> {
        let text = ctx.text();
        let offsets = ctx.offsets();
        let size = ctx.config.chunk_size;
        let overlap = ctx.config.overlap;
        let smart = ctx.config.smart_boundaries;
        let total = offsets.char_len();
        let chars: Vec<char> = if smart { text.chars().collect() } else { Vec::new() };

        let mut segments = Vec::new();
        let mut start = 0;
        while start < total {
            let mut end = (start + size).min(total);
            if smart && end < total {
                let floor = (start + size / 2).max(start + 1);
                if let Some(ws) = (floor..end).rev().find(|&i| chars[i].is_whitespace()) {
                    end = ws + 1;
                }
            }

            let range = offsets.byte_at(start)..offsets.byte_at(end);
            if !text[range.clone()].trim().is_empty() {
                segments.push(Segment::new(range, ChunkKind::Text));
            }

            if smart {
                if end >= total {
                    break;
                }
                start = end.saturating_sub(overlap).max(start + 1);
            } else {
                start += size - overlap;
            }
        }
        Ok(segments)
    }
}
