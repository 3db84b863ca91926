//! Job-script and build-recipe sections.
//!
//! Recognised sections:
//!
//! - `directives`: consecutive scheduler directive lines (`#SBATCH`, `#PBS`,
//!   `#BSUB`, `#$`), including a shebang directly above them
//! - `modules`: environment setup (`module`, `ml`, `spack load`, `conda activate`)
//! - `commands`: parallel launchers (`srun`, `mpirun`, ...)
//! - `header` and `%post`, `%environment`, ...: container definition files
//! - EasyBuild keys (`name = ...`, `dependencies = [...]`, ...)

use std::ops::Range;

use super::lines_with_offsets;
use super::recursive::{recursive_segments, split_ranges};
use crate::chunk::ChunkKind;
use crate::content_type::is_scheduler_directive;
use crate::engine::{Segment, SegmentContext, SegmentStrategy};
use crate::error::SegmentationError;

const MODULE_PREFIXES: &[&str] = &[
    "module ",
    "ml ",
    "spack load",
    "conda activate",
    "source activate",
];

const LAUNCHERS: &[&str] = &["srun", "mpirun", "mpiexec", "aprun", "jsrun", "ibrun"];

const HEADER_KEYS: &[&str] = &["bootstrap:", "from:", "stage:"];

const BLOCKS: &[&str] = &[
    "%post",
    "%environment",
    "%runscript",
    "%files",
    "%labels",
    "%help",
    "%test",
    "%setup",
    "%startscript",
];

const RECIPE_KEYS: &[&str] = &[
    "name",
    "version",
    "toolchain",
    "easyblock",
    "dependencies",
    "builddependencies",
    "sources",
    "source_urls",
    "configopts",
    "sanity_check_paths",
    "moduleclass",
    "homepage",
    "description",
];

/// One chunk per recognised section, recursive chunks for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainStrategy;

impl SegmentStrategy for DomainStrategy {
    fn name(&self) -> &'static str {
        "domain"
    }

    fn split(&self, ctx: &SegmentContext<'_>) -> Result<Vec<Segment>, SegmentationError> {
        let text = ctx.text();
        let separators = ctx.separators.get(ctx.content_type());
        let sections = find_sections(text);

        if sections.is_empty() {
            return Ok(recursive_segments(ctx, separators, ChunkKind::Text)
                .into_iter()
                .map(|s| s.with_meta("fallback", "recursive"))
                .collect());
        }

        let size = ctx.config.chunk_size;
        let mut segments = Vec::new();
        let mut cursor = 0;
        let residual = |range: Range<usize>, segments: &mut Vec<Segment>| {
            if text[range.clone()].trim().is_empty() {
                return;
            }
            segments.extend(
                split_ranges(&text[range.clone()], separators, size)
                    .into_iter()
                    .map(|r| range.start + r.start..range.start + r.end)
                    .filter(|r| !text[r.clone()].trim().is_empty())
                    .map(|r| Segment::new(r, ChunkKind::Residual)),
            );
        };

        for section in sections {
            residual(cursor..section.range.start, &mut segments);
            cursor = section.range.end;
            segments.push(
                Segment::new(section.range, ChunkKind::Directive).with_meta("section", section.name),
            );
        }
        residual(cursor..text.len(), &mut segments);
        Ok(segments)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    name: String,
    range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    Directives,
    Modules,
    Commands,
    Header,
}

impl Run {
    fn classify(line: &str) -> Option<Self> {
        let trimmed = line.trim_start();
        if is_scheduler_directive(trimmed) {
            return Some(Self::Directives);
        }
        if MODULE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
            return Some(Self::Modules);
        }
        let first = trimmed.split_whitespace().next().unwrap_or_default();
        if LAUNCHERS.contains(&first) {
            return Some(Self::Commands);
        }
        let lower = trimmed.to_ascii_lowercase();
        if HEADER_KEYS.iter().any(|k| lower.starts_with(k)) {
            return Some(Self::Header);
        }
        None
    }

    fn name(self) -> &'static str {
        match self {
            Self::Directives => "directives",
            Self::Modules => "modules",
            Self::Commands => "commands",
            Self::Header => "header",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Consecutive lines of one kind.
    Run(Run),
    /// `%section` up to the next `%section`.
    Block,
    /// `key = value` up to the next key or a blank line.
    Assignment,
}

struct Open {
    name: String,
    mode: Mode,
    range: Range<usize>,
}

fn block_header(line: &str) -> Option<&'static str> {
    let word = line.split_whitespace().next()?;
    if !line.starts_with('%') {
        return None;
    }
    BLOCKS.iter().copied().find(|b| *b == word)
}

fn recipe_key(line: &str) -> Option<&'static str> {
    RECIPE_KEYS.iter().copied().find(|key| {
        line.strip_prefix(key).is_some_and(|rest| {
            let value = rest.trim_start_matches([' ', '\t']);
            rest.starts_with([' ', '\t', '='])
                && value.starts_with('=')
                && !value.starts_with("==")
        })
    })
}

fn find_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut open: Option<Open> = None;
    let mut previous_line: Option<Range<usize>> = None;

    for (start, line) in lines_with_offsets(text) {
        let line_range = start..start + line.len();

        if let Some(current) = open.as_mut() {
            let continues = match current.mode {
                Mode::Block => block_header(line).is_none(),
                Mode::Assignment => !line.trim().is_empty() && recipe_key(line).is_none(),
                Mode::Run(run) => Run::classify(line) == Some(run),
            };
            if continues {
                current.range.end = line_range.end;
                previous_line = Some(line_range);
                continue;
            }
        }
        if let Some(done) = open.take() {
            sections.push(Section {
                name: done.name,
                range: done.range,
            });
        }

        open = if let Some(block) = block_header(line) {
            Some(Open {
                name: block.to_string(),
                mode: Mode::Block,
                range: line_range.clone(),
            })
        } else if let Some(key) = recipe_key(line) {
            Some(Open {
                name: key.to_string(),
                mode: Mode::Assignment,
                range: line_range.clone(),
            })
        } else if let Some(run) = Run::classify(line) {
            let mut range = line_range.clone();
            let after_last = sections.last().map_or(0, |s| s.range.end);
            if let Some(prev) = previous_line.as_ref().filter(|p| p.start >= after_last) {
                if run == Run::Directives && text[prev.clone()].starts_with("#!") {
                    range.start = prev.start;
                }
            }
            Some(Open {
                name: run.name().to_string(),
                mode: Mode::Run(run),
                range,
            })
        } else {
            None
        };
        previous_line = Some(line_range);
    }

    if let Some(done) = open {
        sections.push(Section {
            name: done.name,
            range: done.range,
        });
    }
    sections
}
