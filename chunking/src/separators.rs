//! Separator tables for recursive splitting.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::content_type::ContentType;

/// A split point pattern.
///
/// Splitting never drops text: with `After` the separator stays at the end
/// of the preceding piece, with `Before` it opens the following piece.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separator {
    /// Cut after each match (whitespace, punctuation).
    After(Cow<'static, str>),
    /// Cut before each match (keywords, tags).
    Before(Cow<'static, str>),
}

impl Separator {
    pub const fn after(pattern: &'static str) -> Self {
        Self::After(Cow::Borrowed(pattern))
    }

    pub const fn before(pattern: &'static str) -> Self {
        Self::Before(Cow::Borrowed(pattern))
    }

    /// The literal pattern.
    pub fn pattern(&self) -> &str {
        match self {
            Self::After(p) | Self::Before(p) => p,
        }
    }

    /// Split `text` into pieces that concatenate back to `text`.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let pattern = self.pattern();
        if text.is_empty() {
            return Vec::new();
        }
        if pattern.is_empty() {
            return vec![text];
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        for (idx, matched) in text.match_indices(pattern) {
            let cut = match self {
                Self::After(_) => idx + matched.len(),
                Self::Before(_) => idx,
            };
            if cut > start && cut < text.len() {
                pieces.push(&text[start..cut]);
                start = cut;
            }
        }
        pieces.push(&text[start..]);
        pieces
    }
}

const PROSE: &[Separator] = &[
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(". "),
    Separator::after(" "),
];

const MARKDOWN: &[Separator] = &[
    Separator::before("\n# "),
    Separator::before("\n## "),
    Separator::before("\n### "),
    Separator::before("\n#### "),
    Separator::before("\n```"),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(". "),
    Separator::after(" "),
];

const MARKUP: &[Separator] = &[
    Separator::before("<body"),
    Separator::before("<section"),
    Separator::before("<div"),
    Separator::before("<h1"),
    Separator::before("<h2"),
    Separator::before("<h3"),
    Separator::before("<p"),
    Separator::before("<li"),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const PYTHON: &[Separator] = &[
    Separator::before("\nclass "),
    Separator::before("\ndef "),
    Separator::before("\nasync def "),
    Separator::before("\n    def "),
    Separator::before("\n\tdef "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const JAVASCRIPT: &[Separator] = &[
    Separator::before("\nexport "),
    Separator::before("\nfunction "),
    Separator::before("\nclass "),
    Separator::before("\nconst "),
    Separator::before("\nlet "),
    Separator::before("\nvar "),
    Separator::before("\ninterface "),
    Separator::before("\ntype "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const RUST: &[Separator] = &[
    Separator::before("\npub fn "),
    Separator::before("\nfn "),
    Separator::before("\nimpl"),
    Separator::before("\npub struct "),
    Separator::before("\nstruct "),
    Separator::before("\npub enum "),
    Separator::before("\nenum "),
    Separator::before("\ntrait "),
    Separator::before("\nmod "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const GO: &[Separator] = &[
    Separator::before("\nfunc "),
    Separator::before("\ntype "),
    Separator::before("\nvar "),
    Separator::before("\nconst "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const C_FAMILY: &[Separator] = &[
    Separator::before("\nclass "),
    Separator::before("\nstruct "),
    Separator::before("\nnamespace "),
    Separator::before("\npublic "),
    Separator::before("\nprivate "),
    Separator::before("\nprotected "),
    Separator::before("\nstatic "),
    Separator::before("\nvoid "),
    Separator::before("\nint "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const RUBY: &[Separator] = &[
    Separator::before("\nmodule "),
    Separator::before("\nclass "),
    Separator::before("\ndef "),
    Separator::before("\n  def "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const SHELL: &[Separator] = &[
    Separator::before("\nfunction "),
    Separator::before("\n#SBATCH"),
    Separator::before("\nmodule "),
    Separator::before("\nif "),
    Separator::before("\nfor "),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const JSON: &[Separator] = &[
    Separator::after("},\n"),
    Separator::after("],\n"),
    Separator::after(",\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

const YAML: &[Separator] = &[
    Separator::after("\n\n"),
    Separator::before("\n- "),
    Separator::after("\n"),
    Separator::after(" "),
];

const SECTIONED: &[Separator] = &[
    Separator::before("\n["),
    Separator::before("\n%"),
    Separator::after("\n\n"),
    Separator::after("\n"),
    Separator::after(" "),
];

/// Separator lists keyed by content type, coarse to fine.
///
/// Types without an entry use the prose fallback.
#[derive(Debug, Clone)]
pub struct SeparatorRegistry {
    table: HashMap<ContentType, Vec<Separator>>,
    fallback: Vec<Separator>,
}

impl SeparatorRegistry {
    /// An empty registry that answers every lookup with `fallback`.
    pub fn with_fallback(fallback: Vec<Separator>) -> Self {
        Self {
            table: HashMap::new(),
            fallback,
        }
    }

    /// Replace the list for one content type.
    pub fn set(&mut self, content_type: ContentType, separators: Vec<Separator>) {
        self.table.insert(content_type, separators);
    }

    /// Builder form of [`SeparatorRegistry::set`].
    pub fn with(mut self, content_type: ContentType, separators: Vec<Separator>) -> Self {
        self.set(content_type, separators);
        self
    }

    /// Separators for `content_type`.
    pub fn get(&self, content_type: ContentType) -> &[Separator] {
        self.table
            .get(&content_type)
            .map_or(self.fallback.as_slice(), Vec::as_slice)
    }

    /// Whether `content_type` has its own entry.
    pub fn contains(&self, content_type: ContentType) -> bool {
        self.table.contains_key(&content_type)
    }

    /// The default list.
    pub fn fallback(&self) -> &[Separator] {
        &self.fallback
    }
}

impl Default for SeparatorRegistry {
    fn default() -> Self {
        let entries: [(ContentType, &[Separator]); 20] = [
            (ContentType::Markdown, MARKDOWN),
            (ContentType::Html, MARKUP),
            (ContentType::Xml, MARKUP),
            (ContentType::Python, PYTHON),
            (ContentType::JavaScript, JAVASCRIPT),
            (ContentType::TypeScript, JAVASCRIPT),
            (ContentType::Rust, RUST),
            (ContentType::Go, GO),
            (ContentType::Java, C_FAMILY),
            (ContentType::C, C_FAMILY),
            (ContentType::Cpp, C_FAMILY),
            (ContentType::CSharp, C_FAMILY),
            (ContentType::Ruby, RUBY),
            (ContentType::Shell, SHELL),
            (ContentType::JobScript, SHELL),
            (ContentType::Json, JSON),
            (ContentType::Yaml, YAML),
            (ContentType::Toml, SECTIONED),
            (ContentType::Ini, SECTIONED),
            (ContentType::BuildRecipe, SECTIONED),
        ];

        let mut registry = Self::with_fallback(PROSE.to_vec());
        for (content_type, separators) in entries {
            registry.set(content_type, separators.to_vec());
        }
        registry
    }
}
