//! Detected content types.
//!
//! The set is closed on purpose: separator tables and declaration patterns
//! are keyed by it, and every lookup has a single default for anything that
//! is not listed here.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Content type of a document, detected from its file name and text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Markdown,
    Html,
    Xml,
    Python,
    #[serde(rename = "javascript")]
    JavaScript,
    #[serde(rename = "typescript")]
    TypeScript,
    Rust,
    Go,
    Java,
    C,
    Cpp,
    #[serde(rename = "csharp")]
    CSharp,
    Ruby,
    Shell,
    Json,
    Yaml,
    Toml,
    Ini,
    /// Batch scheduler job script (SLURM, PBS, LSF, SGE).
    JobScript,
    /// Container definition or EasyBuild recipe.
    BuildRecipe,
    PlainText,
}

impl ContentType {
    /// Detect the content type of `path`, using `text` to recognise job
    /// scripts hidden behind a generic shell extension.
    pub fn detect(path: &str, text: &str) -> Self {
        let by_name = Self::from_path(path);
        if matches!(by_name, Self::Shell | Self::PlainText) && has_scheduler_directives(text) {
            return Self::JobScript;
        }
        by_name
    }

    /// Detect the content type from the file name alone.
    pub fn from_path(path: &str) -> Self {
        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(path)
            .to_ascii_lowercase();

        match file_name.as_str() {
            "singularity" | "apptainer" => return Self::BuildRecipe,
            "makefile" | "gnumakefile" | "dockerfile" => return Self::Shell,
            "cargo.lock" | "pipfile" => return Self::Toml,
            _ => {}
        }

        let extension = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match extension {
            "md" | "markdown" | "mdx" | "rst" => Self::Markdown,
            "html" | "htm" | "xhtml" | "vue" | "svelte" => Self::Html,
            "xml" | "svg" | "xsd" | "plist" => Self::Xml,
            "py" | "pyi" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Self::TypeScript,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" | "kt" | "kts" | "scala" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" | "rake" | "gemspec" => Self::Ruby,
            "sh" | "bash" | "zsh" | "ksh" => Self::Shell,
            "sbatch" | "slurm" | "pbs" | "lsf" | "qsub" | "job" => Self::JobScript,
            "def" | "eb" => Self::BuildRecipe,
            "json" | "jsonc" | "ipynb" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            "toml" | "lock" => Self::Toml,
            "ini" | "cfg" | "conf" | "properties" | "env" => Self::Ini,
            _ => Self::PlainText,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Shell => "shell",
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Ini => "ini",
            Self::JobScript => "job_script",
            Self::BuildRecipe => "build_recipe",
            Self::PlainText => "plain_text",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `text` carries batch scheduler directives in its header.
pub(crate) fn has_scheduler_directives(text: &str) -> bool {
    text.lines()
        .take(64)
        .any(|line| is_scheduler_directive(line.trim_start()))
}

pub(crate) fn is_scheduler_directive(line: &str) -> bool {
    ["#SBATCH", "#PBS", "#BSUB", "#$ "]
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(ContentType::from_path("src/main.rs"), ContentType::Rust);
        assert_eq!(ContentType::from_path("docs/README.md"), ContentType::Markdown);
        assert_eq!(ContentType::from_path("app.TSX"), ContentType::TypeScript);
        assert_eq!(ContentType::from_path("notes"), ContentType::PlainText);
        assert_eq!(ContentType::from_path("Singularity"), ContentType::BuildRecipe);
        assert_eq!(ContentType::from_path("GROMACS-2023.eb"), ContentType::BuildRecipe);
    }

    #[test]
    fn test_detect_job_script_from_content() {
        let script = "#!/bin/bash\n#SBATCH --nodes=2\nsrun ./a.out\n";
        assert_eq!(ContentType::detect("run.sh", script), ContentType::JobScript);
        assert_eq!(
            ContentType::detect("build.sh", "make -j8\n"),
            ContentType::Shell
        );
    }
}
