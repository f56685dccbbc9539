//! Embedding providers.
//!
//! The index never talks to a model directly; it is handed an
//! `Arc<dyn Embedder>` at construction:
//! - `FastEmbedModel` wraps fastembed's ONNX text models
//! - `HashEmbedder` is a deterministic, model-free bag-of-words embedder
//!   used for offline runs and tests

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};

use crate::semantic::preprocess::l2_normalize;

/// Turns text into fixed-size unit vectors.
pub trait Embedder: Send + Sync {
    /// Model name, for logging and stats
    fn name(&self) -> &str;

    /// Length of every vector this embedder produces
    fn dimensions(&self) -> usize;

    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Failed to load embedding model: {0}")]
    InitFailed(String),

    #[error("Failed to embed text: {0}")]
    EmbeddingFailed(String),

    #[error("Unknown embedding model: {0}")]
    InvalidModel(String),

    #[error("Embedder must produce at least one dimension")]
    ZeroDimensions,
}

/// Accepted model names (lowercase) and the fastembed models they load.
const KNOWN_MODELS: &[(&str, fastembed::EmbeddingModel)] = &[
    ("all-minilm-l6-v2", fastembed::EmbeddingModel::AllMiniLML6V2),
    ("all-minilm-l6-v2-q", fastembed::EmbeddingModel::AllMiniLML6V2Q),
    (
        "paraphrase-multilingual-minilm-l12-v2",
        fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2,
    ),
    ("bge-small-en-v1.5", fastembed::EmbeddingModel::BGESmallENV15),
    ("bge-base-en-v1.5", fastembed::EmbeddingModel::BGEBaseENV15),
    ("multilingual-e5-small", fastembed::EmbeddingModel::MultilingualE5Small),
];

/// Local ONNX text embedding model.
///
/// fastembed needs `&mut` to embed, so calls are serialized on a mutex.
pub struct FastEmbedModel {
    model: Mutex<TextEmbedding>,
    name: String,
    dimensions: usize,
}

impl FastEmbedModel {
    /// Load `model_name`, downloading it into `<cache_dir>/models` on first use.
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Result<Self, EmbeddingError> {
        let kind = Self::lookup(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("cannot create {}: {e}", models_dir.display()))
        })?;

        log::info!("Loading embedding model '{model_name}'");
        let model = TextEmbedding::try_new(
            InitOptions::new(kind)
                .with_cache_dir(models_dir)
                .with_show_download_progress(true),
        )
        .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let mut loaded = Self {
            model: Mutex::new(model),
            name: model_name.to_string(),
            dimensions: 0,
        };

        // probe for the vector size
        loaded.dimensions = loaded
            .run(vec!["dimension probe".to_string()])
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| EmbeddingError::InitFailed("model returned no vector".to_string()))?;
        log::info!("Embedding model ready ({} dimensions)", loaded.dimensions);

        Ok(loaded)
    }

    fn lookup(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        let wanted = name.to_lowercase();
        KNOWN_MODELS
            .iter()
            .find(|(known, _)| *known == wanted)
            .map(|(_, kind)| kind.clone())
            .ok_or_else(|| {
                let names: Vec<&str> = KNOWN_MODELS.iter().map(|(known, _)| *known).collect();
                EmbeddingError::InvalidModel(format!("{name} (supported: {})", names.join(", ")))
            })
    }

    fn run(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::EmbeddingFailed("model lock poisoned".to_string()))?;

        model
            .embed(texts, None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

impl Embedder for FastEmbedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.run(vec![text.to_string()])?
            .pop()
            .ok_or_else(|| EmbeddingError::EmbeddingFailed("model returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts.to_vec())
    }
}

/// Deterministic embedder based on signed feature hashing of words.
///
/// Texts sharing words get similar vectors, which is enough to exercise
/// the index without downloading a model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub const NAME: &'static str = "hash-bow";

    pub fn new(dimensions: usize) -> Result<Self, EmbeddingError> {
        if dimensions == 0 {
            return Err(EmbeddingError::ZeroDimensions);
        }
        Ok(Self { dimensions })
    }

    /// Map a token to a (bucket, sign) pair.
    fn feature(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        (bucket, sign)
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = vec![0.0f32; self.dimensions];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (bucket, sign) = self.feature(&token.to_lowercase());
            out[bucket] += sign;
        }

        // texts without words still need a unit vector
        if !l2_normalize(&mut out) {
            out[0] = 1.0;
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::preprocess::l2_norm;
    use crate::semantic::search::dot;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(64).unwrap();
        let a = embedder.embed("Rust ownership and borrowing").unwrap();
        let b = embedder.embed("Rust ownership and borrowing").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_embedder_unit_length() {
        let embedder = HashEmbedder::new(384).unwrap();
        for text in ["hello world", "", "!!!", "데이터베이스 설계 및 최적화"] {
            let v = embedder.embed(text).unwrap();
            assert_eq!(v.len(), 384);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-5, "text={text:?}");
        }
    }

    #[test]
    fn test_hash_embedder_is_case_insensitive() {
        let embedder = HashEmbedder::new(128).unwrap();
        let a = embedder.embed("Vector Search").unwrap();
        let b = embedder.embed("vector search").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_embedder_shared_words_score_higher() {
        let embedder = HashEmbedder::new(512).unwrap();
        let query = embedder.embed("borrow checker lifetimes").unwrap();
        let related = embedder.embed("the borrow checker enforces lifetimes").unwrap();
        let unrelated = embedder.embed("baking sourdough bread at home").unwrap();

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn test_hash_embedder_batch_matches_single() {
        let embedder = HashEmbedder::new(32).unwrap();
        let texts = vec!["one".to_string(), "two three".to_string()];

        let batch = embedder.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(batch[1], embedder.embed("two three").unwrap());
    }

    #[test]
    fn test_hash_embedder_zero_dimensions() {
        assert!(matches!(
            HashEmbedder::new(0),
            Err(EmbeddingError::ZeroDimensions)
        ));
    }

    #[test]
    fn test_invalid_model_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = FastEmbedModel::new("nonexistent-model", temp_dir.path().to_path_buf());
        assert!(matches!(result, Err(EmbeddingError::InvalidModel(_))));
    }

    #[test]
    fn test_model_lookup_is_case_insensitive() {
        assert!(FastEmbedModel::lookup("All-MiniLM-L6-v2").is_ok());
        assert!(FastEmbedModel::lookup("BGE-small-en-v1.5").is_ok());
        assert!(FastEmbedModel::lookup("gpt-embed").is_err());
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_model_creation() {
        let temp_dir = tempfile::tempdir().unwrap();
        let model = FastEmbedModel::new("all-MiniLM-L6-v2", temp_dir.path().to_path_buf()).unwrap();

        assert_eq!(model.name(), "all-MiniLM-L6-v2");
        assert_eq!(model.dimensions(), 384);

        let embedding = model.embed("Hello, world!").unwrap();
        assert_eq!(embedding.len(), 384);

        assert!((l2_norm(&embedding) - 1.0).abs() < 0.01);
    }
}
