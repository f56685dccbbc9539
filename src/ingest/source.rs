//! Page extraction.
//!
//! PDF text extraction sits behind [`PageSource`]. The bundled
//! [`TextPageSource`] reads plain-text dumps where pages are separated by
//! form feeds, the layout `pdftotext` produces.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ingest::IngestError;

/// Separator `pdftotext` writes between pages
const PAGE_BREAK: char = '\x0c';

/// Raw text of one page of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub file_path: PathBuf,
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(file_path: impl Into<PathBuf>, page_number: u32, text: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            page_number,
            text: text.into(),
        }
    }
}

/// Yields the pages of a document in order.
pub trait PageSource: Send + Sync {
    fn pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

/// Reads form-feed separated text files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextPageSource;

impl TextPageSource {
    /// Split already loaded text into pages.
    ///
    /// Page numbers count every page, blank ones included, so they match
    /// the source document.
    pub fn split_pages(path: &Path, text: &str) -> Vec<PageText> {
        text.split(PAGE_BREAK)
            .zip(1u32..)
            .filter(|(page, _)| !page.trim().is_empty())
            .map(|(page, page_number)| PageText::new(path, page_number, page))
            .collect()
    }
}

impl PageSource for TextPageSource {
    fn pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&bytes);

        let pages = Self::split_pages(path, &text);
        log::debug!("{}: {} pages with text", path.display(), pages.len());
        Ok(pages)
    }
}

/// Resolve input paths into a list of files to ingest.
///
/// Files are taken as given. Directories are listed (not recursively) and
/// filtered by extension, case-insensitively, in sorted order. A file that
/// appears twice is kept once, at its first position.
pub fn expand_inputs(paths: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>, IngestError> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for path in paths {
        let metadata = std::fs::metadata(path).map_err(|source| IngestError::Io {
            path: path.clone(),
            source,
        })?;

        let mut found = if metadata.is_dir() {
            list_dir(path, extensions)?
        } else if metadata.is_file() {
            vec![path.clone()]
        } else {
            return Err(IngestError::UnsupportedInput(path.clone()));
        };

        found.retain(|file| seen.insert(file.clone()));
        files.append(&mut found);
    }

    Ok(files)
}

fn list_dir(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, IngestError> {
    let io_err = |source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && has_extension(&path, extensions) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pages_numbers_from_one() {
        let pages = TextPageSource::split_pages(Path::new("a.txt"), "first\x0csecond\x0cthird");

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], PageText::new("a.txt", 1, "first"));
        assert_eq!(pages[2].page_number, 3);
        assert_eq!(pages[2].text, "third");
    }

    #[test]
    fn test_split_pages_skips_blank_pages() {
        let pages = TextPageSource::split_pages(Path::new("a.txt"), "intro\x0c  \n \x0cbody\x0c");

        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[test]
    fn test_split_pages_empty_file() {
        assert!(TextPageSource::split_pages(Path::new("a.txt"), "").is_empty());
    }

    #[test]
    fn test_read_pages_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "page one\x0cpage two").unwrap();

        let pages = TextPageSource.pages(&path).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].file_path, path);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TextPageSource.pages(&dir.path().join("missing.txt"));
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }

    #[test]
    fn test_expand_inputs() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.TXT", "notes.md", "c.txt"] {
            std::fs::write(dir.path().join(name), "text").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("d.txt"), "text").unwrap();

        let explicit = dir.path().join("notes.md");
        let files = expand_inputs(
            &[explicit.clone(), dir.path().to_path_buf(), dir.path().join("c.txt")],
            &["txt".to_string()],
        )
        .unwrap();

        assert_eq!(
            files,
            vec![
                explicit,
                dir.path().join("a.TXT"),
                dir.path().join("b.txt"),
                dir.path().join("c.txt"),
            ]
        );
    }

    #[test]
    fn test_expand_inputs_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = expand_inputs(&[dir.path().join("nope")], &["txt".to_string()]);
        assert!(matches!(result, Err(IngestError::Io { .. })));
    }
}
