//! Documents fed to the segmentation engine.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::content_type::ContentType;

/// File metadata carried alongside a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    /// File name without directories.
    pub name: String,

    /// Repository-relative path.
    pub path: String,

    /// Size in bytes.
    pub size: u64,

    /// Lowercase extension without the dot, if any.
    pub extension: Option<String>,

    /// Detected content type.
    pub content_type: ContentType,
}

/// A text document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Stable identifier (the normalised path).
    pub id: String,

    /// File metadata.
    #[serde(flatten)]
    pub meta: DocumentMeta,

    /// Raw text.
    pub text: String,
}

impl Document {
    /// Create a document, deriving metadata from `path` and `text`.
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let path = normalize_path(&path.into());
        let text = text.into();
        let file_path = Path::new(&path);

        let name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&path)
            .to_string();
        let extension = file_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let content_type = ContentType::detect(&path, &text);

        Self {
            id: path.clone(),
            meta: DocumentMeta {
                name,
                path,
                size: text.len() as u64,
                extension,
                content_type,
            },
            text,
        }
    }

    /// Override the detected content type.
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.meta.content_type = content_type;
        self
    }

    /// Override the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn content_type(&self) -> ContentType {
        self.meta.content_type
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Strip leading `./` and `/`, and use forward slashes.
fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let trimmed = unified.trim_start_matches("./").trim_start_matches('/');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_document_metadata() {
        let doc = Document::new("./src/Lib.RS", "fn main() {}\n");
        assert_eq!(doc.id, "src/Lib.RS");
        assert_eq!(doc.meta.name, "Lib.RS");
        assert_eq!(doc.meta.extension.as_deref(), Some("rs"));
        assert_eq!(doc.meta.size, 13);
        assert_eq!(doc.content_type(), ContentType::Rust);
    }

    #[test]
    fn test_document_serializes_flat() {
        let doc = Document::new("notes.txt", "hi");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["contentType"], "plain_text");
        assert_eq!(json["path"], "notes.txt");
        assert_eq!(json["text"], "hi");
    }
}
