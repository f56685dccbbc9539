//! Exact cosine similarity search over a [`VectorStore`].
//!
//! Stored vectors and queries are unit length, so cosine similarity is a
//! plain dot product. The scan is either serial or split into contiguous row
//! ranges scored on the rayon pool; each range keeps its own bounded top-k and
//! the partial lists are merged at the end.

use std::num::NonZeroUsize;
use std::sync::Arc;

use rayon::prelude::*;

use crate::semantic::store::VectorStore;
use crate::semantic::topk::{merge_sorted, SearchResult, TopK};

/// Store size at which `ScanStrategy::Auto` switches to the parallel scan.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Accumulator lanes for the dot product kernel.
const LANES: usize = 8;

/// How the engine walks the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    /// Single pass on the calling thread.
    Serial,
    /// Partitioned scan on the rayon pool.
    Parallel,
    /// Serial below `parallel_threshold` rows, parallel at or above it.
    Auto { parallel_threshold: usize },
}

impl Default for ScanStrategy {
    fn default() -> Self {
        ScanStrategy::Auto {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

/// Stateless top-k similarity search.
#[derive(Debug, Clone, Default)]
pub struct SimilaritySearchEngine {
    strategy: ScanStrategy,
    /// Fixed number of row partitions; defaults to the pool's thread count
    partitions: Option<NonZeroUsize>,
    /// Dedicated pool; the global rayon pool is used when unset
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl SimilaritySearchEngine {
    pub fn new(strategy: ScanStrategy) -> Self {
        Self {
            strategy,
            partitions: None,
            pool: None,
        }
    }

    /// Split parallel scans into exactly `partitions` row ranges (0 means auto).
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = NonZeroUsize::new(partitions);
        self
    }

    /// Run scans on a dedicated pool of `threads` workers.
    pub fn with_threads(mut self, threads: usize) -> Result<Self, SearchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pdfseek-scan-{i}"))
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;

        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    pub fn strategy(&self) -> ScanStrategy {
        self.strategy
    }

    /// Find the `top_k` stored vectors most similar to `query`.
    ///
    /// # Arguments
    /// * `store` - The vectors to scan
    /// * `query` - Unit-length query vector
    /// * `top_k` - Maximum number of results, at least 1
    /// * `min_similarity` - Results scoring below this are dropped
    ///
    /// # Returns
    /// Results sorted by similarity (highest first), ties by ascending id.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SearchResult>, SearchError> {
        Self::validate(store, query, top_k)?;

        if store.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self.install(|| self.scan(store, query, top_k, min_similarity)))
    }

    /// Run several queries against the same store.
    ///
    /// Every query is validated before any scanning starts; results come
    /// back in query order.
    pub fn search_batch(
        &self,
        store: &VectorStore,
        queries: &[Vec<f32>],
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<Vec<SearchResult>>, SearchError> {
        for query in queries {
            Self::validate(store, query, top_k)?;
        }

        if store.is_empty() {
            return Ok(vec![Vec::new(); queries.len()]);
        }

        Ok(self.install(|| {
            queries
                .par_iter()
                .map(|query| self.scan(store, query, top_k, min_similarity))
                .collect()
        }))
    }

    fn validate(store: &VectorStore, query: &[f32], top_k: usize) -> Result<(), SearchError> {
        if query.len() != store.dimensions() {
            return Err(SearchError::DimensionMismatch {
                expected: store.dimensions(),
                got: query.len(),
            });
        }

        if top_k == 0 {
            return Err(SearchError::InvalidTopK);
        }

        Ok(())
    }

    fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    fn scan(
        &self,
        store: &VectorStore,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<SearchResult> {
        let parallel = match self.strategy {
            ScanStrategy::Serial => false,
            ScanStrategy::Parallel => true,
            ScanStrategy::Auto { parallel_threshold } => store.len() >= parallel_threshold,
        };

        if parallel {
            self.scan_parallel(store, query, top_k, min_similarity)
        } else {
            scan_rows(store.as_slice(), store.dimensions(), 0, query, top_k, min_similarity)
        }
    }

    fn scan_parallel(
        &self,
        store: &VectorStore,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<SearchResult> {
        let dims = store.dimensions();
        let rows = store.len();
        let partitions = self
            .partitions
            .map(NonZeroUsize::get)
            .unwrap_or_else(rayon::current_num_threads)
            .clamp(1, rows);
        let rows_per_partition = rows.div_ceil(partitions);

        log::trace!(
            "parallel scan: rows={rows} partitions={partitions} rows_per_partition={rows_per_partition}"
        );

        let partials: Vec<Vec<SearchResult>> = store
            .as_slice()
            .par_chunks(rows_per_partition * dims)
            .enumerate()
            .map(|(part, chunk)| {
                scan_rows(
                    chunk,
                    dims,
                    part * rows_per_partition,
                    query,
                    top_k,
                    min_similarity,
                )
            })
            .collect();

        merge_sorted(&partials, top_k)
    }
}

/// Score a contiguous block of rows whose first row has id `first_id`.
fn scan_rows(
    rows: &[f32],
    dims: usize,
    first_id: usize,
    query: &[f32],
    top_k: usize,
    min_similarity: f32,
) -> Vec<SearchResult> {
    let mut top = TopK::new(top_k);

    for (offset, row) in rows.chunks_exact(dims).enumerate() {
        let similarity = dot(row, query);
        // written so NaN never passes
        if !(similarity >= min_similarity) {
            continue;
        }
        top.push(SearchResult {
            id: first_id + offset,
            similarity,
        });
    }

    top.into_sorted_vec()
}

/// Dot product over fixed-width lanes.
///
/// Independent accumulators per lane let the compiler emit packed
/// multiply-adds for the main loop; the tail is summed separately.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);

    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| x * y)
        .sum();

    let mut acc = [0.0f32; LANES];
    for (x, y) in a_chunks.zip(b_chunks) {
        for lane in 0..LANES {
            acc[lane] += x[lane] * y[lane];
        }
    }

    acc.iter().sum::<f32>() + tail
}

/// Errors that can occur during search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("Failed to build search thread pool: {0}")]
    ThreadPool(String),
}
