//! Code-aware segmentation on top-level declarations.

use std::ops::Range;

use regex_lite::Regex;

use super::recursive::{recursive_segments, split_ranges};
use super::{char_len, lines_with_offsets};
use crate::chunk::ChunkKind;
use crate::content_type::ContentType;
use crate::engine::{Segment, SegmentContext, SegmentStrategy};
use crate::error::SegmentationError;
use crate::separators::Separator;

/// Carves named chunks out of top-level declarations.
///
/// Everything between declarations is chunked recursively and tagged
/// `Residual`. Unsupported languages are chunked recursively in full.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeStrategy;

impl SegmentStrategy for CodeStrategy {
    fn name(&self) -> &'static str {
        "code"
    }

    fn split(&self, ctx: &SegmentContext<'_>) -> Result<Vec<Segment>, SegmentationError> {
        let content_type = ctx.content_type();
        let separators = ctx.separators.get(content_type);

        let Some(language) = Language::of(content_type) else {
            return Ok(recursive_segments(ctx, separators, ChunkKind::Text)
                .into_iter()
                .map(|s| s.with_meta("fallback", "recursive"))
                .collect());
        };

        let text = ctx.text();
        let size = ctx.config.chunk_size;
        let tag = content_type.as_str();
        let declarations = find_declarations(text, &language)?;

        let mut segments = Vec::new();
        let mut cursor = 0;
        for decl in declarations {
            segments.extend(residual(text, cursor..decl.range.start, separators, size, tag));
            let end = decl.range.end;

            let body = &text[decl.range.clone()];
            if char_len(body) <= size {
                segments.push(
                    Segment::new(decl.range, ChunkKind::Declaration)
                        .with_meta("symbol", decl.symbol.clone())
                        .with_meta("language", tag),
                );
            } else {
                let base = decl.range.start;
                for (part, range) in split_ranges(body, separators, size).into_iter().enumerate() {
                    segments.push(
                        Segment::new(base + range.start..base + range.end, ChunkKind::Declaration)
                            .with_meta("symbol", decl.symbol.clone())
                            .with_meta("language", tag)
                            .with_meta("part", (part + 1).to_string()),
                    );
                }
            }
            cursor = end;
        }
        segments.extend(residual(text, cursor..text.len(), separators, size, tag));
        Ok(segments)
    }
}

fn residual(
    text: &str,
    range: Range<usize>,
    separators: &[Separator],
    size: usize,
    tag: &str,
) -> Vec<Segment> {
    let region = &text[range.clone()];
    if region.trim().is_empty() {
        return Vec::new();
    }
    split_ranges(region, separators, size)
        .into_iter()
        .map(|r| range.start + r.start..range.start + r.end)
        .filter(|r| !text[r.clone()].trim().is_empty())
        .map(|r| Segment::new(r, ChunkKind::Residual).with_meta("language", tag))
        .collect()
}

/// How a declaration body ends.
#[derive(Debug, Clone, Copy)]
enum Body {
    /// Next non-blank line at column zero.
    Indent,
    /// Matching close brace.
    Braces(BraceSyntax),
    /// Column-zero `end`.
    EndKeyword,
}

/// Lexical rules needed to skip strings and comments while matching braces.
#[derive(Debug, Clone, Copy)]
struct BraceSyntax {
    line_comment: &'static str,
    block_comments: bool,
    /// `'a` may be a lifetime rather than a char literal.
    lifetimes: bool,
    backticks: bool,
}

const C_LIKE: BraceSyntax = BraceSyntax {
    line_comment: "//",
    block_comments: true,
    lifetimes: false,
    backticks: false,
};

struct Language {
    patterns: &'static [&'static str],
    body: Body,
    /// Line prefixes that attach to the declaration below them.
    leading: &'static [&'static str],
}

impl Language {
    fn of(content_type: ContentType) -> Option<Self> {
        let language = match content_type {
            ContentType::Python => Self {
                patterns: &[
                    r"(?m)^(?:async[ \t]+)?def[ \t]+([A-Za-z_]\w*)",
                    r"(?m)^class[ \t]+([A-Za-z_]\w*)",
                ],
                body: Body::Indent,
                leading: &["@", "#"],
            },
            ContentType::JavaScript | ContentType::TypeScript => Self {
                patterns: &[
                    r"(?m)^(?:export[ \t]+)?(?:default[ \t]+)?(?:declare[ \t]+)?(?:abstract[ \t]+)?(?:async[ \t]+)?(?:function|class|interface|enum|namespace)[ \t]*\*?[ \t]*([A-Za-z_$][\w$]*)",
                    r"(?m)^(?:export[ \t]+)?(?:const|let|var)[ \t]+([A-Za-z_$][\w$]*)[^=\n]*=[ \t]*(?:async[ \t]*)?(?:function\b|\([^)\n]*\)[^=\n]*=>|[A-Za-z_$][\w$]*[ \t]*=>)",
                    r"(?m)^(?:export[ \t]+)?type[ \t]+([A-Za-z_$][\w$]*)",
                ],
                body: Body::Braces(BraceSyntax {
                    backticks: true,
                    ..C_LIKE
                }),
                leading: &["@", "/**", "*", "//"],
            },
            ContentType::Rust => Self {
                patterns: &[
                    r#"(?m)^(?:pub(?:\([^)\n]*\))?[ \t]+)?(?:const[ \t]+)?(?:async[ \t]+)?(?:unsafe[ \t]+)?(?:extern[ \t]+"[^"\n]*"[ \t]+)?(?:fn|struct|enum|trait|mod|union|type|static|const)[ \t]+([A-Za-z_]\w*)"#,
                    r"(?m)^(?:unsafe[ \t]+)?(impl\b[^{;\n]*)",
                    r"(?m)^macro_rules![ \t]*([A-Za-z_]\w*)",
                ],
                body: Body::Braces(BraceSyntax {
                    lifetimes: true,
                    ..C_LIKE
                }),
                leading: &["#[", "///", "//"],
            },
            ContentType::Go => Self {
                patterns: &[
                    r"(?m)^func[ \t]+(?:\([^)\n]*\)[ \t]*)?([A-Za-z_]\w*)",
                    r"(?m)^type[ \t]+([A-Za-z_]\w*)",
                    r"(?m)^(?:var|const)[ \t]+([A-Za-z_]\w*)",
                ],
                body: Body::Braces(BraceSyntax {
                    backticks: true,
                    ..C_LIKE
                }),
                leading: &["//"],
            },
            ContentType::Java => Self {
                patterns: &[
                    r"(?m)^(?:(?:public|private|protected|static|final|abstract|sealed|strictfp)[ \t]+)*(?:class|interface|enum|record|@interface)[ \t]+([A-Za-z_]\w*)",
                ],
                body: Body::Braces(C_LIKE),
                leading: &["@", "/**", "*", "//"],
            },
            ContentType::CSharp => Self {
                patterns: &[
                    r"(?m)^(?:(?:public|private|protected|internal|static|sealed|abstract|partial|readonly|unsafe)[ \t]+)*(?:class|interface|enum|record|struct|namespace)[ \t]+([A-Za-z_][\w.]*)",
                ],
                body: Body::Braces(C_LIKE),
                leading: &["[", "///", "//"],
            },
            ContentType::C | ContentType::Cpp => Self {
                patterns: &[
                    r"(?m)^(?:template[ \t]*<[^>\n]*>[ \t]*)?(?:class|struct|union|namespace|enum(?:[ \t]+class)?)[ \t]+([A-Za-z_]\w*)",
                    r"(?m)^(?:[A-Za-z_][\w:<>,]*[ \t\*&]+)+\**([A-Za-z_~][\w:~]*)[ \t]*\([^;\n]*$",
                ],
                body: Body::Braces(C_LIKE),
                leading: &["//", "/*", "*", "template", "[["],
            },
            ContentType::Ruby => Self {
                patterns: &[
                    r"(?m)^(?:module|class)[ \t]+([A-Z][\w:]*)",
                    r"(?m)^def[ \t]+((?:self\.)?[A-Za-z_][\w?!=]*)",
                ],
                body: Body::EndKeyword,
                leading: &["#"],
            },
            ContentType::Shell => Self {
                patterns: &[
                    r"(?m)^function[ \t]+([A-Za-z_][\w-]*)",
                    r"(?m)^([A-Za-z_][\w-]*)[ \t]*\([ \t]*\)",
                ],
                body: Body::Braces(BraceSyntax {
                    line_comment: "#",
                    block_comments: false,
                    lifetimes: false,
                    backticks: false,
                }),
                leading: &["#"],
            },
            _ => return None,
        };
        Some(language)
    }
}

#[derive(Debug, Clone)]
struct HeadMatch {
    line_start: usize,
    head_end: usize,
    symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    range: Range<usize>,
    symbol: String,
}

fn find_declarations(text: &str, language: &Language) -> Result<Vec<Declaration>, SegmentationError> {
    let mut heads = Vec::new();
    for pattern in language.patterns {
        let re = Regex::new(pattern)?;
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let symbol = caps.get(1).unwrap_or(whole).as_str().trim().to_string();
            heads.push(HeadMatch {
                line_start: whole.start(),
                head_end: whole.end(),
                symbol,
            });
        }
    }
    heads.sort_by_key(|h| h.line_start);
    heads.dedup_by_key(|h| h.line_start);

    let mut declarations: Vec<Declaration> = Vec::new();
    let mut consumed = 0;
    for (i, head) in heads.iter().enumerate() {
        if head.line_start < consumed {
            continue;
        }
        let end = match language.body {
            Body::Indent => indented_end(text, head.line_start),
            Body::EndKeyword => keyword_end(text, head)?,
            Body::Braces(syntax) => {
                let limit = heads[i + 1..]
                    .iter()
                    .map(|h| h.line_start)
                    .find(|start| *start >= head.head_end)
                    .unwrap_or(text.len());
                braced_end(text, head, limit, syntax)?
            }
        };

        let floor = declarations.last().map_or(0, |d| d.range.end);
        let start = leading_start(text, head.line_start, floor, language.leading);
        declarations.push(Declaration {
            range: start..end,
            symbol: head.symbol.clone(),
        });
        consumed = end;
    }
    Ok(declarations)
}

/// Walk back over attribute, decorator and doc-comment lines.
fn leading_start(text: &str, line_start: usize, floor: usize, leading: &[&str]) -> usize {
    let mut start = line_start;
    while start > floor {
        let prev_start = text[..start - 1].rfind('\n').map_or(0, |i| i + 1).max(floor);
        let line = text[prev_start..start].trim();
        if line.is_empty() || !leading.iter().any(|p| line.starts_with(p)) {
            break;
        }
        start = prev_start;
    }
    start
}

fn line_end(text: &str, from: usize) -> usize {
    text[from..].find('\n').map_or(text.len(), |i| from + i + 1)
}

fn line_number(text: &str, pos: usize) -> usize {
    text[..pos].matches('\n').count() + 1
}

fn indented_end(text: &str, line_start: usize) -> usize {
    let head_end = line_end(text, line_start);
    let mut end = head_end;
    for (offset, line) in lines_with_offsets(&text[head_end..]) {
        if line.trim().is_empty() {
            continue;
        }
        match line.as_bytes()[0] {
            b' ' | b'\t' | b')' | b']' | b'}' => end = head_end + offset + line.len(),
            b'#' => {}
            _ => break,
        }
    }
    end
}

fn keyword_end(text: &str, head: &HeadMatch) -> Result<usize, SegmentationError> {
    let head_end = line_end(text, head.line_start);
    let head_line = text[head.line_start..head_end].trim_end();
    if head_line.ends_with("; end") || head_line.ends_with(";end") {
        return Ok(head_end);
    }
    lines_with_offsets(&text[head_end..])
        .find(|(_, line)| line.trim_end() == "end")
        .map(|(offset, line)| head_end + offset + line.len())
        .ok_or_else(|| SegmentationError::UnbalancedDelimiters {
            symbol: head.symbol.clone(),
            line: line_number(text, head.line_start),
        })
}

fn braced_end(
    text: &str,
    head: &HeadMatch,
    limit: usize,
    syntax: BraceSyntax,
) -> Result<usize, SegmentationError> {
    let limit = text[head.head_end..limit]
        .find("\n\n")
        .map_or(limit, |i| head.head_end + i + 1);
    let opener = scan(&text[..limit], head.head_end, syntax, |b| b == b'{' || b == b';');

    match opener {
        Some(open) if text.as_bytes()[open] == b'{' => {
            let mut depth = 0usize;
            let close = scan(text, open, syntax, |b| match b {
                b'{' => {
                    depth += 1;
                    false
                }
                b'}' => {
                    depth = depth.saturating_sub(1);
                    depth == 0
                }
                _ => false,
            });
            close
                .map(|idx| line_end(text, idx))
                .ok_or_else(|| SegmentationError::UnbalancedDelimiters {
                    symbol: head.symbol.clone(),
                    line: line_number(text, head.line_start),
                })
        }
        Some(semicolon) => Ok(line_end(text, semicolon)),
        None => Ok(line_end(text, head.line_start)),
    }
}

/// Position of the first structural byte accepted by `hit`, skipping string
/// literals and comments.
fn scan(
    text: &str,
    from: usize,
    syntax: BraceSyntax,
    mut hit: impl FnMut(u8) -> bool,
) -> Option<usize> {
    let bytes = text.as_bytes();
    let comment = syntax.line_comment.as_bytes();
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        let at_comment = bytes[i..].starts_with(comment)
            && (comment != b"#" || i == 0 || bytes[i - 1].is_ascii_whitespace());
        if at_comment {
            i = bytes[i..]
                .iter()
                .position(|c| *c == b'\n')
                .map_or(bytes.len(), |p| i + p);
            continue;
        }
        if syntax.block_comments && bytes[i..].starts_with(b"/*") {
            i = text[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
            continue;
        }

        match b {
            b'"' => i = skip_quoted(bytes, i, b'"', true),
            b'`' if syntax.backticks => i = skip_quoted(bytes, i, b'`', true),
            b'\'' if syntax.lifetimes => i = skip_char_literal(text, i),
            b'\'' => i = skip_quoted(bytes, i, b'\'', false),
            _ => {
                if hit(b) {
                    return Some(i);
                }
                i += 1;
            }
        }
    }
    None
}

fn skip_quoted(bytes: &[u8], open: usize, quote: u8, multiline: bool) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 2,
            b'\n' if !multiline => return j,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Skip `'x'` or `'\n'`; a lone `'` is a lifetime or label.
fn skip_char_literal(text: &str, open: usize) -> usize {
    let rest = &text[open + 1..];
    if rest.starts_with('\\') {
        return skip_quoted(text.as_bytes(), open, b'\'', false);
    }
    match rest.chars().next() {
        Some(c) if rest[c.len_utf8()..].starts_with('\'') => open + 1 + c.len_utf8() + 1,
        _ => open + 1,
    }
}
