//! Folder and format filtering of listings.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::listing::{ListingEntry, RepoListing, normalize};

/// User selection applied to a listing.
///
/// An entry is kept when it passes the location rule (a root file while no
/// folder is selected, or inside a selected folder) and the format rule (a
/// folder while no extension is selected, or a file whose class is selected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// Folder prefixes, without leading or trailing `/`.
    pub selected_folders: Vec<String>,

    /// Allowed format classes (lowercase extensions or special names).
    pub extensions: Vec<String>,

    /// Keep root-level files while no folder is selected.
    pub include_root_files: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            selected_folders: Vec::new(),
            extensions: Vec::new(),
            include_root_files: true,
        }
    }
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a folder.
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.selected_folders.push(folder.into());
        self
    }

    /// Allow a format class.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extensions.push(extension.into());
        self
    }

    /// Set whether root files are kept.
    pub fn with_root_files(mut self, include: bool) -> Self {
        self.include_root_files = include;
        self
    }

    /// Copy with folders and extensions in canonical form.
    pub fn normalized(&self) -> Self {
        Self {
            selected_folders: self
                .selected_folders
                .iter()
                .map(|f| normalize(f))
                .filter(|f| !f.is_empty())
                .collect(),
            extensions: self
                .extensions
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            include_root_files: self.include_root_files,
        }
    }

    /// Whether `entry` passes the filter. Expects a normalised config.
    pub fn retains(&self, entry: &ListingEntry) -> bool {
        let root_rule =
            self.selected_folders.is_empty() && self.include_root_files && entry.is_root();
        let folder_rule = self.selected_folders.iter().any(|folder| {
            entry.path == *folder
                || entry
                    .path
                    .strip_prefix(folder.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        let format_rule = if self.extensions.is_empty() {
            entry.is_folder()
        } else {
            let class = entry.class();
            entry.is_file() && self.extensions.iter().any(|e| e == class.as_str())
        };

        (root_rule || folder_rule) && format_rule
    }
}

/// The filter's output: the retained entries of one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelection {
    pub owner: String,
    pub repo: String,
    pub platform: String,
    pub entries: Vec<ListingEntry>,
}

impl FileSelection {
    pub fn files(&self) -> impl Iterator<Item = &ListingEntry> {
        self.entries.iter().filter(|e| e.is_file())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Apply `config` to every entry of `listing`, preserving order.
pub fn apply_filter(listing: &RepoListing, config: &FilterConfig) -> FileSelection {
    let config = config.normalized();
    let entries: Vec<ListingEntry> = listing
        .contents
        .iter()
        .filter(|entry| config.retains(entry))
        .cloned()
        .collect();

    debug!(
        "Filter kept {} of {} entries in {}/{}",
        entries.len(),
        listing.contents.len(),
        listing.owner,
        listing.repo
    );

    FileSelection {
        owner: listing.owner.clone(),
        repo: listing.repo.clone(),
        platform: listing.platform.clone(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(selection: &FileSelection) -> Vec<&str> {
        selection.entries.iter().map(|e| e.path.as_str()).collect()
    }

    fn listing() -> RepoListing {
        RepoListing::new("octo", "demo", "github").with_entries([
            ListingEntry::file("README.md", 10),
            ListingEntry::file("setup.py", 10),
            ListingEntry::folder("src"),
            ListingEntry::file("src/app.py", 10),
            ListingEntry::folder("src/utils"),
            ListingEntry::file("src/utils/io.py", 10),
            ListingEntry::folder("srcgen"),
            ListingEntry::file("srcgen/out.py", 10),
        ])
    }

    #[test]
    fn test_root_files_without_folder_selection() {
        let config = FilterConfig::new().with_extension(".PY");
        assert_eq!(paths(&apply_filter(&listing(), &config)), vec!["setup.py"]);

        let config = config.with_root_files(false);
        assert!(apply_filter(&listing(), &config).is_empty());
    }

    #[test]
    fn test_folder_prefix_is_path_aware() {
        let config = FilterConfig::new().with_folder("/src/").with_extension("py");
        assert_eq!(
            paths(&apply_filter(&listing(), &config)),
            vec!["src/app.py", "src/utils/io.py"]
        );
    }

    #[test]
    fn test_no_extensions_keeps_only_folders() {
        let config = FilterConfig::new().with_folder("src");
        assert_eq!(
            paths(&apply_filter(&listing(), &config)),
            vec!["src", "src/utils"]
        );
    }

    #[test]
    fn test_special_class_selection() {
        let config = FilterConfig::new().with_extension("readme");
        assert_eq!(paths(&apply_filter(&listing(), &config)), vec!["README.md"]);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: FilterConfig =
            serde_json::from_str(r#"{"selectedFolders":["docs"]}"#).unwrap();
        assert!(config.include_root_files);
        assert!(config.extensions.is_empty());
    }
}
