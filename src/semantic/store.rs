//! Append-only, contiguous vector store.
//!
//! Every vector lives in one row-major `Vec<f32>` of `len * dimensions`
//! floats, so the search engine can scan it in contiguous chunks.
//! Ids are dense and assigned in insertion order.

use crate::semantic::preprocess::l2_normalize;

/// How the store treats incoming vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Scale every appended vector to unit length.
    #[default]
    Renormalize,
    /// Trust the caller; vectors are stored as given.
    AsIs,
}

/// Append-only store of embedding vectors.
#[derive(Debug, Clone)]
pub struct VectorStore {
    /// Row-major vector data, `len * dimensions` floats
    data: Vec<f32>,
    /// Expected embedding dimensions
    dimensions: usize,
    normalization: Normalization,
}

impl VectorStore {
    /// Create a new empty store with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            data: Vec::new(),
            dimensions,
            normalization: Normalization::default(),
        }
    }

    /// Create a store with room for `rows` vectors.
    pub fn with_capacity(dimensions: usize, rows: usize) -> Self {
        Self {
            data: Vec::with_capacity(rows.saturating_mul(dimensions)),
            dimensions,
            normalization: Normalization::default(),
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            return 0;
        }
        self.data.len() / self.dimensions
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector and return its id.
    ///
    /// The id equals the number of vectors stored before the call.
    /// Growth is geometric, so appends are amortized O(1).
    pub fn append(&mut self, vector: &[f32]) -> Result<usize, StoreError> {
        if vector.len() != self.dimensions || self.dimensions == 0 {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimensions,
                got: vector.len(),
            });
        }

        if vector.iter().any(|x| !x.is_finite()) {
            return Err(StoreError::NonFiniteVector);
        }

        let id = self.len();

        self.data
            .try_reserve(self.dimensions)
            .map_err(|e| StoreError::Allocation(e.to_string()))?;

        let start = self.data.len();
        self.data.extend_from_slice(vector);

        if self.normalization == Normalization::Renormalize
            && !l2_normalize(&mut self.data[start..])
        {
            self.data.truncate(start);
            return Err(StoreError::ZeroNormVector);
        }

        Ok(id)
    }

    /// Get a stored vector by id.
    pub fn get(&self, id: usize) -> Result<&[f32], StoreError> {
        let len = self.len();
        if id >= len {
            return Err(StoreError::NotFound { id, len });
        }

        let start = id * self.dimensions;
        Ok(&self.data[start..start + self.dimensions])
    }

    /// Contiguous view of all vectors, row-major in id order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Iterate over `(id, vector)` pairs in id order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[f32])> {
        self.data.chunks_exact(self.dimensions.max(1)).enumerate()
    }

    /// Remove every vector. Ids restart at 0; capacity is kept.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Bytes held by the vector buffer, including spare capacity.
    pub fn memory_usage(&self) -> usize {
        self.data.capacity() * std::mem::size_of::<f32>()
    }
}

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Vector {id} not found (store holds {len} vectors)")]
    NotFound { id: usize, len: usize },

    #[error("Cannot normalize a zero-norm vector")]
    ZeroNormVector,

    #[error("Vector contains NaN or infinite components")]
    NonFiniteVector,

    #[error("Failed to grow vector storage: {0}")]
    Allocation(String),
}
