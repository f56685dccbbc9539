//! Document metadata keyed by vector id.
//!
//! The catalog is filled in lockstep with the [`VectorStore`]: record `n`
//! describes vector `n`. Search results are joined against it to build
//! display hits.
//!
//! [`VectorStore`]: crate::semantic::VectorStore

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::semantic::topk::SearchResult;

/// Metadata for one indexed PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    /// Matches the vector id in the store
    pub id: usize,
    pub file_path: PathBuf,
    /// 1-based page number
    pub page_number: u32,
    pub content: String,
}

impl DocumentRecord {
    pub fn new(
        id: usize,
        file_path: impl Into<PathBuf>,
        page_number: u32,
        content: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        if page_number == 0 {
            return Err(CatalogError::InvalidPageNumber);
        }

        Ok(Self {
            id,
            file_path: file_path.into(),
            page_number,
            content: content.into(),
        })
    }
}

/// A search result joined with its document metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: usize,
    pub similarity: f32,
    pub file_path: PathBuf,
    pub page_number: u32,
    pub content: String,
}

/// Indexed file with its page count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogFile {
    pub file_path: PathBuf,
    pub pages: usize,
}

/// Dense, append-only list of document records.
#[derive(Debug, Default)]
pub struct DocumentCatalog {
    records: Vec<DocumentRecord>,
    /// (file, page) pairs already present
    pages: HashSet<(PathBuf, u32)>,
}

impl DocumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add the record for the vector that was just appended.
    ///
    /// The record id must equal the current length, mirroring store id
    /// assignment.
    pub fn insert(&mut self, record: DocumentRecord) -> Result<(), CatalogError> {
        if record.id != self.records.len() {
            return Err(CatalogError::IdOutOfSequence {
                expected: self.records.len(),
                got: record.id,
            });
        }

        self.pages
            .insert((record.file_path.clone(), record.page_number));
        self.records.push(record);
        Ok(())
    }

    pub fn get(&self, id: usize) -> Option<&DocumentRecord> {
        self.records.get(id)
    }

    /// Check whether a page of a file is already indexed.
    pub fn contains_page(&self, file_path: &Path, page_number: u32) -> bool {
        self.pages
            .contains(&(file_path.to_path_buf(), page_number))
    }

    /// Indexed files in first-seen order.
    pub fn files(&self) -> Vec<CatalogFile> {
        let mut files: Vec<CatalogFile> = Vec::new();
        for record in &self.records {
            match files.iter_mut().find(|f| f.file_path == record.file_path) {
                Some(file) => file.pages += 1,
                None => files.push(CatalogFile {
                    file_path: record.file_path.clone(),
                    pages: 1,
                }),
            }
        }
        files
    }

    /// Attach metadata to search results, preserving their order.
    pub fn join(&self, results: &[SearchResult]) -> Vec<SearchHit> {
        results
            .iter()
            .filter_map(|result| match self.records.get(result.id) {
                Some(record) => Some(SearchHit {
                    id: result.id,
                    similarity: result.similarity,
                    file_path: record.file_path.clone(),
                    page_number: record.page_number,
                    content: record.content.clone(),
                }),
                None => {
                    log::warn!("search result {} has no catalog record", result.id);
                    None
                }
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.pages.clear();
    }
}

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Record id out of sequence: expected {expected}, got {got}")]
    IdOutOfSequence { expected: usize, got: usize },

    #[error("Page numbers start at 1")]
    InvalidPageNumber,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: usize, file: &str, page: u32) -> DocumentRecord {
        DocumentRecord::new(id, file, page, format!("{file} page {page}")).unwrap()
    }

    #[test]
    fn test_page_zero_rejected() {
        let result = DocumentRecord::new(0, "a.pdf", 0, "text");
        assert!(matches!(result, Err(CatalogError::InvalidPageNumber)));
    }

    #[test]
    fn test_insert_in_sequence() {
        let mut catalog = DocumentCatalog::new();
        catalog.insert(record(0, "a.pdf", 1)).unwrap();
        catalog.insert(record(1, "a.pdf", 2)).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(1).unwrap().page_number, 2);
        assert!(catalog.get(2).is_none());
    }

    #[test]
    fn test_insert_out_of_sequence() {
        let mut catalog = DocumentCatalog::new();
        let result = catalog.insert(record(3, "a.pdf", 1));

        assert!(matches!(
            result,
            Err(CatalogError::IdOutOfSequence { expected: 0, got: 3 })
        ));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_contains_page() {
        let mut catalog = DocumentCatalog::new();
        catalog.insert(record(0, "a.pdf", 4)).unwrap();

        assert!(catalog.contains_page(Path::new("a.pdf"), 4));
        assert!(!catalog.contains_page(Path::new("a.pdf"), 5));
        assert!(!catalog.contains_page(Path::new("b.pdf"), 4));
    }

    #[test]
    fn test_files_with_page_counts() {
        let mut catalog = DocumentCatalog::new();
        catalog.insert(record(0, "b.pdf", 1)).unwrap();
        catalog.insert(record(1, "a.pdf", 1)).unwrap();
        catalog.insert(record(2, "b.pdf", 2)).unwrap();

        let files = catalog.files();
        assert_eq!(
            files,
            vec![
                CatalogFile {
                    file_path: PathBuf::from("b.pdf"),
                    pages: 2
                },
                CatalogFile {
                    file_path: PathBuf::from("a.pdf"),
                    pages: 1
                },
            ]
        );
    }

    #[test]
    fn test_join_preserves_order_and_skips_unknown() {
        let mut catalog = DocumentCatalog::new();
        catalog.insert(record(0, "a.pdf", 1)).unwrap();
        catalog.insert(record(1, "a.pdf", 2)).unwrap();

        let results = vec![
            SearchResult { id: 1, similarity: 0.9 },
            SearchResult { id: 7, similarity: 0.8 },
            SearchResult { id: 0, similarity: 0.4 },
        ];

        let hits = catalog.join(&results);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 1);
        assert_eq!(hits[0].page_number, 2);
        assert_eq!(hits[0].content, "a.pdf page 2");
        assert_eq!(hits[1].id, 0);
        assert!((hits[1].similarity - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clear() {
        let mut catalog = DocumentCatalog::new();
        catalog.insert(record(0, "a.pdf", 1)).unwrap();
        catalog.clear();

        assert!(catalog.is_empty());
        assert!(!catalog.contains_page(Path::new("a.pdf"), 1));
        catalog.insert(record(0, "a.pdf", 1)).unwrap();
    }
}
