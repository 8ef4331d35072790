//! Markdown discovery and loading.

use std::path::{Path, PathBuf};

use crate::document::Document;
use crate::error::{RagError, Result};

/// File extensions treated as markdown, compared case-insensitively.
pub const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// Whether `path` has a markdown extension.
pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MARKDOWN_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

/// List the markdown files directly inside `dir`, sorted by path.
///
/// Subdirectories are not descended into.
///
/// # Errors
///
/// Returns [`RagError::SourceDirectory`] if `dir` cannot be read.
pub async fn discover_markdown(dir: &Path) -> Result<Vec<PathBuf>> {
    let source_error = |source| RagError::SourceDirectory { path: dir.to_path_buf(), source };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(source_error)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(source_error)? {
        let path = entry.path();
        if !is_markdown(&path) {
            continue;
        }
        // Follows symlinks; an entry that vanished in between is simply skipped.
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load a markdown file as a [`Document`].
///
/// The text is kept as written; only a leading byte-order mark is removed.
///
/// # Errors
///
/// Returns [`RagError::IngestionFile`] if the file cannot be read or is not
/// valid UTF-8.
pub async fn load_markdown(path: &Path) -> Result<Document> {
    let file_error =
        |message: String| RagError::IngestionFile { path: path.to_path_buf(), message };

    let bytes = tokio::fs::read(path).await.map_err(|e| file_error(e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|e| file_error(format!("not valid UTF-8: {e}")))?;
    let content = content.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(content);
    Ok(Document::new(path, content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_markdown_extensions() {
        assert!(is_markdown(Path::new("sop_qa.md")));
        assert!(is_markdown(Path::new("notes.MARKDOWN")));
        assert!(!is_markdown(Path::new("notes.txt")));
        assert!(!is_markdown(Path::new("md")));
    }

    #[tokio::test]
    async fn discovery_is_sorted_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("c.txt"), "c").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("d.md"), "d").unwrap();

        let files = discover_markdown(dir.path()).await.unwrap();
        let names: Vec<_> =
            files.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
        assert_eq!(names, ["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = discover_markdown(&dir.path().join("absent")).await;
        assert!(matches!(result, Err(RagError::SourceDirectory { .. })));
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.md");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        assert!(matches!(load_markdown(&path).await, Err(RagError::IngestionFile { .. })));
    }
}
