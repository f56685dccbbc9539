//! Semantic search service for PDF pages.
//!
//! Provides a high-level interface over the index:
//! - Owns the vector store, the document catalog and the search engine
//! - Uses an injected embedder for pages and queries
//! - Keeps store and catalog in lockstep so ids always line up

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::config::SemanticSearchConfig;
use crate::ingest::{IngestReport, PageText};
use crate::semantic::catalog::{CatalogError, CatalogFile, DocumentCatalog, DocumentRecord, SearchHit};
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::preprocess::{l2_normalize, prepare_page};
use crate::semantic::search::{SearchError, SimilaritySearchEngine};
use crate::semantic::store::{Normalization, StoreError, VectorStore};

/// Errors that can occur during semantic search operations.
#[derive(Debug, thiserror::Error)]
pub enum SemanticSearchError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Page has no text")]
    EmptyContent,

    #[error("{} page {page_number} is already indexed", file_path.display())]
    DuplicatePage { file_path: PathBuf, page_number: u32 },

    #[error("Index is full ({0} documents)")]
    CapacityExceeded(usize),

    #[error("Embedder returned {got} vectors for {expected} pages")]
    BatchSizeMismatch { expected: usize, got: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SemanticSearchError {
    /// Pages that were deliberately not indexed, as opposed to failures.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            SemanticSearchError::EmptyContent | SemanticSearchError::DuplicatePage { .. }
        )
    }
}

/// A page with its embedding, ready to be inserted.
#[derive(Debug, Clone)]
pub struct EmbeddedPage {
    pub file_path: PathBuf,
    pub page_number: u32,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Summary of the current index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub model: String,
    pub dimensions: usize,
    pub documents: usize,
    pub files: Vec<CatalogFile>,
    pub memory_bytes: usize,
}

/// Service for indexing and searching PDF pages.
///
/// Mutations take `&mut self` and searches take `&self`, so appends and
/// scans on one instance never overlap. Share it as `Arc<RwLock<_>>` to
/// ingest in the background while serving queries.
pub struct SemanticSearchService {
    config: SemanticSearchConfig,
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    catalog: DocumentCatalog,
    engine: SimilaritySearchEngine,
}

impl SemanticSearchService {
    /// Create an empty index around an embedder.
    ///
    /// # Arguments
    /// * `config` - Semantic search configuration
    /// * `engine` - Configured similarity engine
    /// * `embedder` - Shared embedding provider, constructed once by the caller
    pub fn new(
        config: SemanticSearchConfig,
        engine: SimilaritySearchEngine,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, SemanticSearchError> {
        let dimensions = embedder.dimensions();
        if dimensions == 0 {
            return Err(EmbeddingError::ZeroDimensions.into());
        }

        let normalization = if config.normalize_vectors {
            Normalization::Renormalize
        } else {
            Normalization::AsIs
        };

        let store = match config.max_documents {
            Some(max) => VectorStore::with_capacity(dimensions, max),
            None => VectorStore::new(dimensions),
        }
        .with_normalization(normalization);

        log::debug!(
            "semantic index created: model={} dimensions={} strategy={:?}",
            embedder.name(),
            dimensions,
            engine.strategy()
        );

        Ok(Self {
            config,
            embedder,
            store,
            catalog: DocumentCatalog::new(),
            engine,
        })
    }

    pub fn embed_batch_size(&self) -> usize {
        self.config.embed_batch_size.max(1)
    }

    /// Number of indexed pages.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn catalog(&self) -> &DocumentCatalog {
        &self.catalog
    }

    /// Embed pages without touching the index.
    ///
    /// Only needs `&self`, so a background ingester can do the expensive part
    /// under a read lock. Results are in page order; empty and already
    /// indexed pages come back as skip errors.
    pub fn embed_pages(&self, pages: &[PageText]) -> Vec<Result<EmbeddedPage, SemanticSearchError>> {
        let mut results: Vec<Result<EmbeddedPage, SemanticSearchError>> =
            Vec::with_capacity(pages.len());
        let mut inputs = Vec::new();
        // (result slot, page content) for pages that need a vector
        let mut pending = Vec::new();

        for page in pages {
            if self.catalog.contains_page(&page.file_path, page.page_number) {
                results.push(Err(SemanticSearchError::DuplicatePage {
                    file_path: page.file_path.clone(),
                    page_number: page.page_number,
                }));
                continue;
            }

            match prepare_page(
                &page.text,
                self.config.min_page_chars,
                self.config.max_content_length,
            ) {
                Some(prepared) => {
                    pending.push((results.len(), prepared.content));
                    inputs.push(prepared.embed_input);
                    // placeholder, replaced below
                    results.push(Err(SemanticSearchError::EmptyContent));
                }
                None => results.push(Err(SemanticSearchError::EmptyContent)),
            }
        }

        if inputs.is_empty() {
            return results;
        }

        let embeddings = match self.embedder.embed_batch(&inputs) {
            Ok(embeddings) if embeddings.len() == inputs.len() => embeddings
                .into_iter()
                .map(Ok)
                .collect::<Vec<Result<Vec<f32>, SemanticSearchError>>>(),
            Ok(embeddings) => {
                let got = embeddings.len();
                (0..inputs.len())
                    .map(|_| {
                        Err(SemanticSearchError::BatchSizeMismatch {
                            expected: inputs.len(),
                            got,
                        })
                    })
                    .collect()
            }
            Err(e) => {
                // retry one by one so a single bad page doesn't sink the batch
                log::warn!("batch embedding failed, retrying pages individually: {e}");
                inputs
                    .iter()
                    .map(|input| self.embedder.embed(input).map_err(Into::into))
                    .collect()
            }
        };

        for ((slot, content), embedding) in pending.into_iter().zip(embeddings) {
            let page = &pages[slot];
            results[slot] = embedding.map(|embedding| EmbeddedPage {
                file_path: page.file_path.clone(),
                page_number: page.page_number,
                content,
                embedding,
            });
        }

        results
    }

    /// Append an embedded page to the store and the catalog.
    ///
    /// Returns the id shared by the vector and its document record.
    pub fn insert_page(&mut self, page: EmbeddedPage) -> Result<usize, SemanticSearchError> {
        if let Some(max) = self.config.max_documents {
            if self.store.len() >= max {
                return Err(SemanticSearchError::CapacityExceeded(max));
            }
        }

        if self.catalog.contains_page(&page.file_path, page.page_number) {
            return Err(SemanticSearchError::DuplicatePage {
                file_path: page.file_path,
                page_number: page.page_number,
            });
        }

        // validate the record before the vector goes in; the store is append-only
        let record = DocumentRecord::new(
            self.store.len(),
            page.file_path,
            page.page_number,
            page.content,
        )?;

        let id = self.store.append(&page.embedding)?;
        debug_assert_eq!(id, record.id);
        self.catalog.insert(record)?;

        Ok(id)
    }

    /// Embed and index a single page.
    pub fn add_page(&mut self, page: &PageText) -> Result<usize, SemanticSearchError> {
        let embedded = self
            .embed_pages(std::slice::from_ref(page))
            .into_iter()
            .next()
            .ok_or_else(|| SemanticSearchError::Internal("no embedding result".to_string()))??;

        self.insert_page(embedded)
    }

    /// Embed and index pages in batches.
    ///
    /// A page that fails is logged and counted; the rest are still indexed.
    pub fn add_pages(&mut self, pages: &[PageText]) -> IngestReport {
        let mut report = IngestReport::default();

        for batch in pages.chunks(self.embed_batch_size()) {
            for result in self.embed_pages(batch) {
                let inserted = result.and_then(|page| self.insert_page(page));
                report.record(&inserted);
            }
        }

        log::info!(
            "indexed {} pages ({} skipped, {} failed)",
            report.added,
            report.skipped,
            report.failed
        );

        report
    }

    /// Search for pages similar to a text query.
    ///
    /// # Arguments
    /// * `query` - The search query text
    /// * `top_k` - Maximum results to return (uses config default if None)
    /// * `min_similarity` - Minimum similarity score (uses config default if None)
    ///
    /// # Returns
    /// Hits sorted by similarity (highest first).
    pub fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<SearchHit>, SemanticSearchError> {
        let query_embedding = self.embedder.embed(query)?;
        self.search_vector(&query_embedding, top_k, min_similarity)
    }

    /// Search with an already computed query vector.
    pub fn search_vector(
        &self,
        query: &[f32],
        top_k: Option<usize>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<SearchHit>, SemanticSearchError> {
        let query = self.unit_query(query.to_vec());
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let min_similarity = min_similarity.unwrap_or(self.config.default_threshold);

        let results = self
            .engine
            .search(&self.store, &query, top_k, min_similarity)?;

        Ok(self.catalog.join(&results))
    }

    /// Run several text queries at once, one hit list per query.
    pub fn search_batch(
        &self,
        queries: &[String],
        top_k: Option<usize>,
        min_similarity: Option<f32>,
    ) -> Result<Vec<Vec<SearchHit>>, SemanticSearchError> {
        let embeddings = self.embedder.embed_batch(queries)?;
        if embeddings.len() != queries.len() {
            return Err(SemanticSearchError::BatchSizeMismatch {
                expected: queries.len(),
                got: embeddings.len(),
            });
        }

        let embeddings: Vec<Vec<f32>> = embeddings
            .into_iter()
            .map(|embedding| self.unit_query(embedding))
            .collect();

        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let min_similarity = min_similarity.unwrap_or(self.config.default_threshold);

        let results = self
            .engine
            .search_batch(&self.store, &embeddings, top_k, min_similarity)?;

        Ok(results
            .iter()
            .map(|results| self.catalog.join(results))
            .collect())
    }

    /// Queries go through the same normalization as stored vectors.
    fn unit_query(&self, mut query: Vec<f32>) -> Vec<f32> {
        if self.config.normalize_vectors && !l2_normalize(&mut query) {
            log::debug!("query vector has zero norm; every similarity will be 0");
        }
        query
    }

    /// Drop every page. Ids restart at 0.
    pub fn clear(&mut self) {
        self.store.clear();
        self.catalog.clear();
        log::info!("semantic index cleared");
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            model: self.embedder.name().to_string(),
            dimensions: self.store.dimensions(),
            documents: self.store.len(),
            files: self.catalog.files(),
            memory_bytes: self.store.memory_usage(),
        }
    }
}
