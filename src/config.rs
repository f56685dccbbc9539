use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::semantic::{
    ScanStrategy, SimilaritySearchEngine, DEFAULT_MAX_CONTENT_LENGTH,
    DEFAULT_MIN_PAGE_CHARS, DEFAULT_PARALLEL_THRESHOLD,
};

const CONFIG_FILE: &str = "config.yaml";

/// Default embedding model (384 dimensions, ~23MB download)
const DEFAULT_SEMANTIC_MODEL: &str = "all-MiniLM-L6-v2";
/// Default similarity threshold for semantic search
const DEFAULT_SEMANTIC_THRESHOLD: f32 = 0.15;
/// Default number of hits per query
const DEFAULT_TOP_K: usize = 10;
/// Default number of pages embedded per model call
const DEFAULT_EMBED_BATCH_SIZE: usize = 16;
/// Shortest embedder input the truncation logic supports
const MIN_CONTENT_LENGTH: usize = 16;

/// Configuration for semantic search functionality
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Model name for embeddings (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_semantic_model")]
    pub model: String,

    /// Default similarity threshold [-1.0, 1.0]
    #[serde(default = "default_semantic_threshold")]
    pub default_threshold: f32,

    /// Default number of results per query
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Refuse new pages once this many are indexed
    #[serde(default)]
    pub max_documents: Option<usize>,

    /// Pages shorter than this (after whitespace collapsing) are skipped
    #[serde(default = "default_min_page_chars")]
    pub min_page_chars: usize,

    /// Characters of page text handed to the embedder
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    /// Pages embedded per model call
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Re-normalize vectors to unit length on insert
    #[serde(default = "default_true")]
    pub normalize_vectors: bool,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_SEMANTIC_MODEL.to_string(),
            default_threshold: DEFAULT_SEMANTIC_THRESHOLD,
            default_top_k: DEFAULT_TOP_K,
            max_documents: None,
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            normalize_vectors: true,
        }
    }
}

fn default_semantic_model() -> String {
    DEFAULT_SEMANTIC_MODEL.to_string()
}

fn default_semantic_threshold() -> f32 {
    DEFAULT_SEMANTIC_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_min_page_chars() -> usize {
    DEFAULT_MIN_PAGE_CHARS
}

fn default_max_content_length() -> usize {
    DEFAULT_MAX_CONTENT_LENGTH
}

fn default_embed_batch_size() -> usize {
    DEFAULT_EMBED_BATCH_SIZE
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Auto,
    Serial,
    Parallel,
}

/// Configuration for the similarity scan
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Store size at which `auto` switches to the parallel scan
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Scan threads: "auto" (shared rayon pool) or a positive integer
    #[serde(default = "default_threads")]
    pub threads: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Auto,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            threads: default_threads(),
        }
    }
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

fn default_threads() -> String {
    "auto".to_string()
}

impl EngineConfig {
    pub fn scan_strategy(&self) -> ScanStrategy {
        match self.strategy {
            StrategyKind::Auto => ScanStrategy::Auto {
                parallel_threshold: self.parallel_threshold,
            },
            StrategyKind::Serial => ScanStrategy::Serial,
            StrategyKind::Parallel => ScanStrategy::Parallel,
        }
    }

    /// Dedicated thread count, or `None` for the shared rayon pool.
    pub fn thread_count(&self) -> Result<Option<usize>, ConfigError> {
        if self.threads == "auto" {
            return Ok(None);
        }

        match self.threads.parse::<usize>() {
            Ok(0) | Err(_) => Err(ConfigError::Invalid {
                key: "engine.threads",
                message: format!("must be 'auto' or a positive integer, got '{}'", self.threads),
            }),
            Ok(n) => Ok(Some(n)),
        }
    }

    /// Build the search engine described by this section.
    pub fn build_engine(&self) -> anyhow::Result<SimilaritySearchEngine> {
        let engine = SimilaritySearchEngine::new(self.scan_strategy());

        let engine = match self.thread_count()? {
            Some(threads) => engine.with_threads(threads)?,
            None => engine,
        };

        Ok(engine)
    }
}

/// Configuration for collecting input files
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// File extensions picked up when a directory is given as input
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sem = &self.semantic_search;

        if !(-1.0..=1.0).contains(&sem.default_threshold) {
            return Err(ConfigError::Invalid {
                key: "semantic_search.default_threshold",
                message: format!("must be between -1.0 and 1.0, got {}", sem.default_threshold),
            });
        }

        if sem.default_top_k == 0 {
            return Err(ConfigError::Invalid {
                key: "semantic_search.default_top_k",
                message: "must be greater than 0".to_string(),
            });
        }

        if sem.max_documents == Some(0) {
            return Err(ConfigError::Invalid {
                key: "semantic_search.max_documents",
                message: "must be greater than 0 when set".to_string(),
            });
        }

        if sem.max_content_length < MIN_CONTENT_LENGTH {
            return Err(ConfigError::Invalid {
                key: "semantic_search.max_content_length",
                message: format!(
                    "must be at least {MIN_CONTENT_LENGTH}, got {}",
                    sem.max_content_length
                ),
            });
        }

        if sem.min_page_chars > sem.max_content_length {
            return Err(ConfigError::Invalid {
                key: "semantic_search.min_page_chars",
                message: format!(
                    "must not exceed max_content_length ({}), got {}",
                    sem.max_content_length, sem.min_page_chars
                ),
            });
        }

        if sem.embed_batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "semantic_search.embed_batch_size",
                message: "must be greater than 0".to_string(),
            });
        }

        self.engine.thread_count()?;

        if self.ingest.extensions.iter().any(|ext| ext.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                key: "ingest.extensions",
                message: "extensions must not be empty strings".to_string(),
            });
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, writing defaults if it is missing.
    pub fn load_with(base_path: &Path) -> Result<Self, ConfigError> {
        std::fs::create_dir_all(base_path)?;
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            log::info!("Creating default config at {}", path.display());
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)?;
        }

        let config_str = std::fs::read_to_string(&path)?;
        let mut config: Self = serde_yml::from_str(&config_str)?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(self.base_path.join(CONFIG_FILE), config_str)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("{key} {message}")]
    Invalid { key: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.semantic_search.model, "all-MiniLM-L6-v2");
        assert!((config.semantic_search.default_threshold - 0.15).abs() < f32::EPSILON);
        assert_eq!(config.semantic_search.default_top_k, 10);
        assert_eq!(config.engine.strategy, StrategyKind::Auto);
        assert_eq!(config.engine.thread_count().unwrap(), None);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::load_with(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.base_path(), dir.path());
        assert_eq!(config.ingest.extensions, vec!["txt".to_string()]);
    }

    #[test]
    fn test_load_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "semantic_search:\n  default_threshold: 0.3\nengine:\n  strategy: parallel\n  threads: '2'\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path()).unwrap();
        assert!((config.semantic_search.default_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.semantic_search.default_top_k, 10);
        assert_eq!(config.engine.scan_strategy(), ScanStrategy::Parallel);
        assert_eq!(config.engine.thread_count().unwrap(), Some(2));

        // resaved with defaults filled in
        let saved = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(saved.contains("default_top_k"));
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = Config::default();
        config.semantic_search.default_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "semantic_search.default_threshold",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_threads() {
        let mut config = Config::default();
        for threads in ["0", "many", "-1"] {
            config.engine.threads = threads.to_string();
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::Invalid { key: "engine.threads", .. })
                ),
                "threads={threads}"
            );
        }
    }

    #[test]
    fn test_invalid_top_k_and_capacity() {
        let mut config = Config::default();
        config.semantic_search.default_top_k = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.semantic_search.max_documents = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_page_chars() {
        let config = Config::default();
        assert_eq!(config.semantic_search.min_page_chars, 50);

        let mut config = Config::default();
        config.semantic_search.max_content_length = 64;
        config.semantic_search.min_page_chars = 65;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                key: "semantic_search.min_page_chars",
                ..
            })
        ));

        config.semantic_search.min_page_chars = 0;
        config.validate().unwrap();
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "semantic_search: [oops").unwrap();

        assert!(matches!(
            Config::load_with(dir.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_auto_strategy_uses_threshold() {
        let engine = EngineConfig {
            parallel_threshold: 7,
            ..Default::default()
        };
        assert_eq!(
            engine.scan_strategy(),
            ScanStrategy::Auto {
                parallel_threshold: 7
            }
        );
        let built = engine.build_engine().unwrap();
        assert_eq!(built.strategy(), engine.scan_strategy());
    }
}
