//! File format classification.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::listing::RepoListing;

/// Format class of a file, used by the format filter.
///
/// Well-known file names get a class of their own; everything else is
/// classed by its lowercase extension, or `none` without one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileClass(String);

impl FileClass {
    /// Classify a file name.
    pub fn of(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if let Some(special) = special_class(&lower) {
            return Self(special.to_string());
        }

        match lower.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Self(ext.to_string()),
            _ => Self::none(),
        }
    }

    /// Class of folders and extensionless names.
    pub fn none() -> Self {
        Self("none".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn special_class(lower: &str) -> Option<&'static str> {
    if lower == "dockerfile" || lower.starts_with("dockerfile.") || lower.ends_with(".dockerfile") {
        return Some("dockerfile");
    }
    if lower.starts_with("readme") {
        return Some("readme");
    }
    if lower.starts_with("license") || lower.starts_with("licence") || lower == "copying" {
        return Some("license");
    }
    match lower {
        ".gitignore" => Some("gitignore"),
        "makefile" | "gnumakefile" => Some("makefile"),
        "package.json" => Some("package.json"),
        "package-lock.json" => Some("lock"),
        _ if lower.ends_with(".lock") => Some("lock"),
        _ => None,
    }
}

/// Counts of a listing's entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub files: usize,
    pub folders: usize,
    /// File count per format class.
    pub by_class: BTreeMap<String, usize>,
}

/// Count files and folders per class.
pub fn summarize(listing: &RepoListing) -> ListingSummary {
    let mut summary = ListingSummary::default();
    for entry in &listing.contents {
        if entry.is_folder() {
            summary.folders += 1;
            continue;
        }
        summary.files += 1;
        *summary
            .by_class
            .entry(entry.class().as_str().to_string())
            .or_default() += 1;
    }
    summary
}
