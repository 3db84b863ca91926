//! Repository listing model.

use serde::{Deserialize, Serialize};

use crate::classify::FileClass;
use crate::error::Result;

/// Kind of a listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    #[serde(alias = "dir")]
    Folder,
}

/// One file or folder of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Path relative to the repository root, `/` separated.
    pub path: String,

    /// Last path component.
    #[serde(default)]
    pub name: String,

    /// File or folder.
    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Size in bytes (files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ListingEntry {
    /// Create a file entry.
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self::new(path, EntryType::File, Some(size))
    }

    /// Create a folder entry.
    pub fn folder(path: impl Into<String>) -> Self {
        Self::new(path, EntryType::Folder, None)
    }

    fn new(path: impl Into<String>, entry_type: EntryType, size: Option<u64>) -> Self {
        let path = normalize(&path.into());
        Self {
            name: name_of(&path).to_string(),
            path,
            entry_type,
            size,
        }
    }

    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }

    pub fn is_folder(&self) -> bool {
        self.entry_type == EntryType::Folder
    }

    /// Whether the entry sits directly in the repository root.
    pub fn is_root(&self) -> bool {
        !self.path.contains('/')
    }

    /// Derived format class of this entry.
    pub fn class(&self) -> FileClass {
        if self.is_folder() {
            return FileClass::none();
        }
        FileClass::of(&self.name)
    }
}

/// A repository listing as produced by the fetch collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoListing {
    pub contents: Vec<ListingEntry>,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub repo: String,

    #[serde(default)]
    pub platform: String,
}

impl RepoListing {
    /// Create an empty listing.
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            contents: Vec::new(),
            owner: owner.into(),
            repo: repo.into(),
            platform: platform.into(),
        }
    }

    /// Add entries.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = ListingEntry>) -> Self {
        self.contents.extend(entries);
        self
    }

    /// Decode a listing, normalising paths and filling in missing names.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut listing: Self = serde_json::from_str(json)?;
        for entry in &mut listing.contents {
            entry.path = normalize(&entry.path);
            if entry.name.is_empty() {
                entry.name = name_of(&entry.path).to_string();
            }
        }
        Ok(listing)
    }

    pub fn files(&self) -> impl Iterator<Item = &ListingEntry> {
        self.contents.iter().filter(|e| e.is_file())
    }

    pub fn folders(&self) -> impl Iterator<Item = &ListingEntry> {
        self.contents.iter().filter(|e| e.is_folder())
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// Strip leading `./`, surrounding `/` and backslashes.
pub(crate) fn normalize(path: &str) -> String {
    path.replace('\\', "/")
        .trim_start_matches("./")
        .trim_matches('/')
        .to_string()
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entry_constructors() {
        let file = ListingEntry::file("./src/lib.rs", 42);
        assert_eq!(file.path, "src/lib.rs");
        assert_eq!(file.name, "lib.rs");
        assert!(!file.is_root());

        let folder = ListingEntry::folder("docs/");
        assert_eq!(folder.path, "docs");
        assert!(folder.is_root());
        assert!(folder.is_folder());
    }

    #[test]
    fn test_from_json_accepts_dir_alias() {
        let listing = RepoListing::from_json(
            r#"{
                "contents": [
                    {"path": "src", "type": "dir"},
                    {"path": "src/main.py", "name": "main.py", "type": "file", "size": 10}
                ],
                "owner": "octo",
                "repo": "demo",
                "platform": "github"
            }"#,
        )
        .unwrap();

        assert_eq!(listing.contents[0].entry_type, EntryType::Folder);
        assert_eq!(listing.contents[0].name, "src");
        assert_eq!(listing.files().count(), 1);
        assert_eq!(listing.owner, "octo");
    }

    #[test]
    fn test_serializes_type_field() {
        let json = serde_json::to_value(ListingEntry::folder("a")).unwrap();
        assert_eq!(json["type"], "folder");
        assert!(json.get("size").is_none());
    }
}
