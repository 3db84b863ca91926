//! Build a listing from a local directory.

use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{ListingError, Result};
use crate::listing::{ListingEntry, RepoListing};

/// Options for [`scan_with`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory names skipped at any depth.
    pub exclude_dirs: Vec<String>,

    /// Maximum depth to recurse (None = unlimited).
    pub max_depth: Option<usize>,

    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,

    /// Owner reported in the listing.
    pub owner: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude_dirs: default_excludes(),
            max_depth: None,
            follow_symlinks: false,
            owner: "local".to_string(),
        }
    }
}

impl ScanOptions {
    /// Skip another directory name.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude_dirs.push(name.into());
        self
    }

    /// Set the maximum depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Enable following symbolic links.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    fn is_excluded(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.exclude_dirs.iter().any(|x| x == name))
    }
}

fn default_excludes() -> Vec<String> {
    [
        // Version control
        ".git",
        ".svn",
        ".hg",
        // Dependencies
        "node_modules",
        "target",
        "vendor",
        ".venv",
        "venv",
        // Build artifacts
        "build",
        "dist",
        "__pycache__",
        // IDE/Editor
        ".idea",
        ".vscode",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Scan `root` with the default options.
pub fn scan_directory(root: &Path) -> Result<RepoListing> {
    scan_with(root, &ScanOptions::default())
}

/// Walk `root` and list its files and folders, sorted by path.
pub fn scan_with(root: &Path, options: &ScanOptions) -> Result<RepoListing> {
    if !root.is_dir() {
        return Err(ListingError::InvalidRoot(root.display().to_string()));
    }

    let repo = root
        .canonicalize()?
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut listing = RepoListing::new(options.owner.clone(), repo, "local");

    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .max_depth(options.max_depth.unwrap_or(usize::MAX))
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !options.is_excluded(entry));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                warn!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            listing.contents.push(ListingEntry::folder(path));
        } else {
            let size = entry.metadata().map(|m| m.len()).unwrap_or_default();
            debug!("Listed file: {path}");
            listing.contents.push(ListingEntry::file(path, size));
        }
    }

    info!(
        "Scanned {}: {} files, {} folders",
        root.display(),
        listing.files().count(),
        listing.folders().count()
    );
    Ok(listing)
}
