//! Heading sections first, then paragraph groups.

use std::ops::Range;

use regex_lite::Regex;

use super::recursive::split_ranges;
use super::{char_len, lines_with_offsets};
use crate::chunk::ChunkKind;
use crate::content_type::ContentType;
use crate::engine::{Segment, SegmentContext, SegmentStrategy};
use crate::error::SegmentationError;
use crate::separators::Separator;

const HTML_HEADING: &str = r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>";

const PARAGRAPH: Separator = Separator::after("\n\n");

const SENTENCE: &[Separator] = &[
    Separator::after("\n"),
    Separator::after(". "),
    Separator::after(" "),
];

/// Splits markup on heading boundaries and groups paragraphs inside
/// oversized sections. Other content, and markup without headings, is
/// grouped paragraph-wise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemanticStrategy;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Heading {
    start: usize,
    level: usize,
    title: String,
}

impl SegmentStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn split(&self, ctx: &SegmentContext<'_>) -> Result<Vec<Segment>, SegmentationError> {
        let text = ctx.text();
        let size = ctx.config.chunk_size;
        let headings = match ctx.content_type() {
            ContentType::Markdown => markdown_headings(text),
            ContentType::Html | ContentType::Xml => html_headings(text)?,
            _ => Vec::new(),
        };

        if headings.is_empty() {
            return Ok(group_paragraphs(text, 0..text.len(), size, None));
        }

        let mut segments = Vec::new();
        let preamble = 0..headings[0].start;
        if !text[preamble.clone()].trim().is_empty() {
            segments.extend(section_segments(text, preamble, size, None));
        }
        for (i, heading) in headings.iter().enumerate() {
            let end = headings.get(i + 1).map_or(text.len(), |next| next.start);
            segments.extend(section_segments(text, heading.start..end, size, Some(heading)));
        }
        Ok(segments)
    }
}

fn section_segments(
    text: &str,
    range: Range<usize>,
    size: usize,
    heading: Option<&Heading>,
) -> Vec<Segment> {
    if char_len(&text[range.clone()]) <= size {
        return vec![annotate(Segment::new(range, ChunkKind::Section), heading)];
    }
    group_paragraphs(text, range, size, heading)
}

fn group_paragraphs(
    text: &str,
    range: Range<usize>,
    size: usize,
    heading: Option<&Heading>,
) -> Vec<Segment> {
    let base = range.start;
    let mut ranges = Vec::new();
    let mut buf_start = base;
    let mut buf_chars = 0;
    let mut pos = base;

    for paragraph in PARAGRAPH.split(&text[range]) {
        let n = char_len(paragraph);
        if buf_chars + n <= size {
            buf_chars += n;
            pos += paragraph.len();
            continue;
        }
        if buf_chars > 0 {
            ranges.push(buf_start..pos);
        }
        if n > size {
            ranges.extend(
                split_ranges(paragraph, SENTENCE, size)
                    .into_iter()
                    .map(|r| pos + r.start..pos + r.end),
            );
            pos += paragraph.len();
            buf_start = pos;
            buf_chars = 0;
        } else {
            buf_start = pos;
            buf_chars = n;
            pos += paragraph.len();
        }
    }
    if buf_chars > 0 {
        ranges.push(buf_start..pos);
    }

    ranges
        .into_iter()
        .filter(|r| !text[r.clone()].trim().is_empty())
        .map(|r| annotate(Segment::new(r, ChunkKind::Paragraph), heading))
        .collect()
}

fn annotate(segment: Segment, heading: Option<&Heading>) -> Segment {
    match heading {
        Some(h) => segment
            .with_meta("heading", h.title.clone())
            .with_meta("level", h.level.to_string()),
        None => segment,
    }
}

/// ATX headings outside fenced code blocks.
fn markdown_headings(text: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut fence: Option<&str> = None;

    for (start, line) in lines_with_offsets(text) {
        let trimmed = line.trim_end();
        let indent = trimmed.len() - trimmed.trim_start().len();
        let body = trimmed.trim_start();

        if indent <= 3 {
            if let Some(marker) = ["```", "~~~"].into_iter().find(|m| body.starts_with(m)) {
                fence = match fence {
                    Some(open) if open == marker => None,
                    Some(open) => Some(open),
                    None => Some(marker),
                };
                continue;
            }
        }
        if fence.is_some() || indent > 3 {
            continue;
        }

        let level = body.chars().take_while(|c| *c == '#').count();
        if !(1..=6).contains(&level) {
            continue;
        }
        let rest = &body[level..];
        if rest.is_empty() || rest.starts_with([' ', '\t']) {
            headings.push(Heading {
                start,
                level,
                title: rest.trim().trim_end_matches('#').trim_end().to_string(),
            });
        }
    }
    headings
}

/// `<h1>`..`<h6>` elements; a section starts at the opening tag.
fn html_headings(text: &str) -> Result<Vec<Heading>, SegmentationError> {
    let heading = Regex::new(HTML_HEADING)?;
    let tag = Regex::new(r"<[^>]*>")?;

    Ok(heading
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let level = caps.get(1)?.as_str().parse().ok()?;
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let title = tag.replace_all(inner, "");
            Some(Heading {
                start: whole.start(),
                level,
                title: title.split_whitespace().collect::<Vec<_>>().join(" "),
            })
        })
        .collect())
}
