//! Semantic search over PDF pages.
//!
//! Pages are embedded into fixed-size vectors and held in memory; queries
//! are answered by an exhaustive cosine-similarity scan that can be split
//! across threads.
//!
//! # Architecture
//!
//! - `store`: Contiguous, append-only vector storage
//! - `search`: Serial and partitioned top-k similarity scan
//! - `topk`: Bounded result heap and the k-way merge of partial lists
//! - `catalog`: Page metadata keyed by vector id
//! - `embeddings`: Embedder trait, fastembed wrapper and an offline embedder
//! - `preprocess`: Page text cleanup and vector normalization
//! - `service`: High-level index tying the pieces together

pub mod catalog;
pub mod embeddings;
mod preprocess;
pub mod search;
mod service;
pub mod store;
pub mod topk;

pub use catalog::{CatalogError, CatalogFile, DocumentCatalog, DocumentRecord, SearchHit};
pub use embeddings::{Embedder, EmbeddingError, FastEmbedModel, HashEmbedder};
pub use preprocess::{
    collapse_whitespace, l2_norm, l2_normalize, prepare_page, PreparedPage,
    DEFAULT_MAX_CONTENT_LENGTH, DEFAULT_MIN_PAGE_CHARS,
};
pub use search::{dot, ScanStrategy, SearchError, SimilaritySearchEngine, DEFAULT_PARALLEL_THRESHOLD};
pub use service::{EmbeddedPage, IndexStats, SemanticSearchError, SemanticSearchService};
pub use store::{Normalization, StoreError, VectorStore};
pub use topk::{merge_sorted, SearchResult, TopK};
