use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use ragflow_chunking::Document;
use ragflow_listing::ListingEntry;
use tracing::{debug, warn};

use super::Stage;
use crate::discovery::StageInput;
use crate::error::StageFailure;
use crate::node::StageKind;
use crate::payload::{OutputKind, StageConfig, StageOutput};

/// Source of file contents, standing in for the repository fetch service.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Read the text of the file at the repository-relative `path`.
    async fn fetch(&self, path: &str) -> io::Result<String>;
}

/// Serves contents from a path to text map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFetcher {
    files: HashMap<String, String>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file.
    pub fn with_file(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.files.insert(path.into(), text.into());
        self
    }
}

#[async_trait]
impl ContentFetcher for InMemoryFetcher {
    async fn fetch(&self, path: &str) -> io::Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}")))
    }
}

/// Reads files below a root directory.
#[derive(Debug, Clone)]
pub struct LocalFsFetcher {
    root: PathBuf,
}

impl LocalFsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentFetcher for LocalFsFetcher {
    async fn fetch(&self, path: &str) -> io::Result<String> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes the repository root: {path}"),
            ));
        }
        tokio::fs::read_to_string(self.root.join(relative)).await
    }
}

/// Turns selected file entries into documents.
pub struct ParseStage {
    fetcher: Box<dyn ContentFetcher>,
}

impl ParseStage {
    pub fn new(fetcher: impl ContentFetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
        }
    }
}

impl std::fmt::Debug for ParseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl Stage for ParseStage {
    fn kind(&self) -> StageKind {
        StageKind::Parse
    }

    fn accepts(&self) -> &[OutputKind] {
        &[OutputKind::Selection, OutputKind::Listing]
    }

    async fn process(
        &self,
        input: StageInput,
        _config: &StageConfig,
    ) -> Result<StageOutput, StageFailure> {
        let files: Vec<&ListingEntry> = match input.payload.as_ref() {
            StageOutput::Selection(selection) => selection.files().collect(),
            StageOutput::Listing(listing) => listing.files().collect(),
            other => {
                return Err(StageFailure::new(format!(
                    "parse stage cannot read {} output",
                    other.kind()
                )));
            }
        };
        if files.is_empty() {
            return Err(StageFailure::new("no files selected"));
        }

        let mut documents = Vec::with_capacity(files.len());
        let mut last_error = None;
        for entry in &files {
            match self.fetcher.fetch(&entry.path).await {
                Ok(text) => {
                    debug!("Fetched {} ({} bytes)", entry.path, text.len());
                    documents.push(Document::new(&entry.path, text));
                }
                Err(e) => {
                    warn!("Skipping {}: {e}", entry.path);
                    last_error = Some(e);
                }
            }
        }

        if documents.is_empty() {
            let failure = StageFailure::new(format!("failed to fetch all {} files", files.len()));
            return Err(match last_error {
                Some(e) => failure.with_source(e),
                None => failure,
            });
        }

        Ok(StageOutput::Documents(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ragflow_listing::{FileSelection, RepoListing};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn input(output: StageOutput) -> StageInput {
        StageInput {
            source: "filter".into(),
            revision: 1,
            payload: Arc::new(output),
        }
    }

    fn selection(entries: Vec<ListingEntry>) -> StageOutput {
        StageOutput::Selection(FileSelection {
            owner: "o".to_string(),
            repo: "r".to_string(),
            platform: "local".to_string(),
            entries,
        })
    }

    #[tokio::test]
    async fn test_skips_unfetchable_files() {
        let stage = ParseStage::new(InMemoryFetcher::new().with_file("a.md", "# A"));
        let payload = selection(vec![
            ListingEntry::folder("docs"),
            ListingEntry::file("a.md", 3),
            ListingEntry::file("missing.md", 3),
        ]);

        let output = stage.process(input(payload), &StageConfig::None).await.unwrap();

        let StageOutput::Documents(documents) = output else {
            panic!("expected documents");
        };
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "a.md");
        assert_eq!(documents[0].text, "# A");
    }

    #[tokio::test]
    async fn test_fails_when_every_fetch_fails() {
        let stage = ParseStage::new(InMemoryFetcher::new());
        let payload = selection(vec![ListingEntry::file("a.md", 3)]);

        let err = stage.process(input(payload), &StageConfig::None).await.unwrap_err();

        assert_eq!(err.message(), "failed to fetch all 1 files");
        assert!(err.detail().contains("no such file: a.md"));
    }

    #[tokio::test]
    async fn test_reads_listing_from_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        let stage = ParseStage::new(LocalFsFetcher::new(dir.path()));
        let listing = RepoListing::new("local", "demo", "local").with_entries([
            ListingEntry::folder("src"),
            ListingEntry::file("src/lib.rs", 14),
        ]);

        let output = stage
            .process(input(StageOutput::Listing(listing)), &StageConfig::None)
            .await
            .unwrap();

        let StageOutput::Documents(documents) = output else {
            panic!("expected documents");
        };
        assert_eq!(documents[0].meta.name, "lib.rs");
        assert_eq!(documents[0].content_type(), ragflow_chunking::ContentType::Rust);
    }

    #[tokio::test]
    async fn test_local_fetcher_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let err = LocalFsFetcher::new(dir.path())
            .fetch("../secret")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
