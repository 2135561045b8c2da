/// Configuration system for repograph
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, RepoGraphError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Graph store configuration
    #[serde(default)]
    pub graph_store: GraphStoreConfig,

    /// Vector index configuration
    #[serde(default)]
    pub vector_index: VectorIndexConfig,

    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,
}

/// Graph store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStoreConfig {
    /// SQLite database file holding repositories, entities and relationships
    #[serde(default = "default_graph_db_path")]
    pub db_path: PathBuf,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Index backend: "lancedb" or "memory"
    #[serde(default = "default_vector_backend")]
    pub backend: String,

    /// LanceDB data directory path
    #[serde(default = "default_lancedb_path")]
    pub lancedb_path: PathBuf,
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider: "fastembed" (local ONNX model) or "hashing" (offline, deterministic)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// Model name (e.g., "all-MiniLM-L6-v2", "BAAI/bge-small-en-v1.5")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Vector dimension for the hashing provider
    #[serde(default = "default_hashing_dimension")]
    pub dimension: usize,

    /// Batch size for embedding generation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Timeout in seconds for one embedding batch
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Directory under which per-run working copies are created
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Deadline for a whole indexing run, in seconds
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,

    /// Maximum source file size to parse (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Glob patterns for directories excluded from discovery (test sources)
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Source language of indexed repositories
    #[serde(default = "default_language")]
    pub language: String,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum vector similarity for semantic results (0.0 to 1.0)
    #[serde(default = "default_similarity_floor")]
    pub similarity_floor: f32,

    /// Result ceiling for structural search
    #[serde(default = "default_structural_limit")]
    pub structural_limit: usize,

    /// Result ceiling for semantic search
    #[serde(default = "default_semantic_limit")]
    pub semantic_limit: usize,

    /// Result ceiling for hybrid search
    #[serde(default = "default_hybrid_limit")]
    pub hybrid_limit: usize,

    /// Result ceiling for keyword fallback search
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,

    /// Multiplier applied to type-level keyword/structural matches
    #[serde(default = "default_type_boost")]
    pub type_boost: f32,

    /// Multiplier applied to field-level matches
    #[serde(default = "default_field_weight")]
    pub field_weight: f32,

    /// Maximum hops considered when explaining a relationship
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,
}

// Default value functions
fn default_graph_db_path() -> PathBuf {
    crate::paths::PlatformPaths::default_graph_db_path()
}

fn default_vector_backend() -> String {
    "lancedb".to_string()
}

fn default_lancedb_path() -> PathBuf {
    crate::paths::PlatformPaths::default_lancedb_path()
}

fn default_embedding_provider() -> String {
    "fastembed".to_string()
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_hashing_dimension() -> usize {
    384
}

fn default_batch_size() -> usize {
    32
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_workspace_root() -> PathBuf {
    crate::paths::PlatformPaths::default_workspace_root()
}

fn default_run_timeout() -> u64 {
    30 * 60
}

fn default_max_file_size() -> usize {
    1_048_576 // 1 MB
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/src/test/**".to_string(),
        "**/test/**".to_string(),
        "**/tests/**".to_string(),
    ]
}

fn default_language() -> String {
    "java".to_string()
}

fn default_similarity_floor() -> f32 {
    0.65
}

fn default_structural_limit() -> usize {
    50
}

fn default_semantic_limit() -> usize {
    20
}

fn default_hybrid_limit() -> usize {
    30
}

fn default_keyword_limit() -> usize {
    50
}

fn default_type_boost() -> f32 {
    1.2
}

fn default_field_weight() -> f32 {
    0.8
}

fn default_max_path_depth() -> usize {
    6
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_graph_db_path(),
        }
    }
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            lancedb_path: default_lancedb_path(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model_name: default_model_name(),
            dimension: default_hashing_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            run_timeout_secs: default_run_timeout(),
            max_file_size: default_max_file_size(),
            exclude_patterns: default_exclude_patterns(),
            language: default_language(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_floor: default_similarity_floor(),
            structural_limit: default_structural_limit(),
            semantic_limit: default_semantic_limit(),
            hybrid_limit: default_hybrid_limit(),
            keyword_limit: default_keyword_limit(),
            type_boost: default_type_boost(),
            field_weight: default_field_weight(),
            max_path_depth: default_max_path_depth(),
        }
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RepoGraphError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, RepoGraphError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, RepoGraphError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), RepoGraphError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), RepoGraphError> {
        if !["lancedb", "memory"].contains(&self.vector_index.backend.as_str()) {
            return Err(invalid(
                "vector_index.backend",
                format!(
                    "must be 'lancedb' or 'memory', got '{}'",
                    self.vector_index.backend
                ),
            ));
        }

        if !["fastembed", "hashing"].contains(&self.embedding.provider.as_str()) {
            return Err(invalid(
                "embedding.provider",
                format!(
                    "must be 'fastembed' or 'hashing', got '{}'",
                    self.embedding.provider
                ),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size", "must be greater than 0"));
        }

        if self.embedding.dimension == 0 {
            return Err(invalid("embedding.dimension", "must be greater than 0"));
        }

        if self.embedding.timeout_secs == 0 {
            return Err(invalid("embedding.timeout_secs", "must be greater than 0"));
        }

        if self.indexing.run_timeout_secs == 0 {
            return Err(invalid("indexing.run_timeout_secs", "must be greater than 0"));
        }

        if self.indexing.max_file_size == 0 {
            return Err(invalid("indexing.max_file_size", "must be greater than 0"));
        }

        if self.indexing.language != "java" {
            return Err(invalid(
                "indexing.language",
                format!("only 'java' is supported, got '{}'", self.indexing.language),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.similarity_floor) {
            return Err(invalid(
                "search.similarity_floor",
                format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.search.similarity_floor
                ),
            ));
        }

        let limits = [
            ("search.structural_limit", self.search.structural_limit),
            ("search.semantic_limit", self.search.semantic_limit),
            ("search.hybrid_limit", self.search.hybrid_limit),
            ("search.keyword_limit", self.search.keyword_limit),
            ("search.max_path_depth", self.search.max_path_depth),
        ];
        for (key, value) in limits {
            if value == 0 {
                return Err(invalid(key, "must be greater than 0"));
            }
        }

        if self.search.type_boost < 1.0 {
            return Err(invalid(
                "search.type_boost",
                format!("must be at least 1.0, got {}", self.search.type_boost),
            ));
        }

        if !(0.0..=1.0).contains(&self.search.field_weight) {
            return Err(invalid(
                "search.field_weight",
                format!(
                    "must be between 0.0 and 1.0, got {}",
                    self.search.field_weight
                ),
            ));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("REPOGRAPH_DB_PATH") {
            self.graph_store.db_path = PathBuf::from(path);
        }

        if let Ok(backend) = std::env::var("REPOGRAPH_VECTOR_BACKEND") {
            self.vector_index.backend = backend;
        }

        if let Ok(path) = std::env::var("REPOGRAPH_LANCEDB_PATH") {
            self.vector_index.lancedb_path = PathBuf::from(path);
        }

        if let Ok(provider) = std::env::var("REPOGRAPH_EMBEDDING_PROVIDER") {
            self.embedding.provider = provider;
        }

        if let Ok(model) = std::env::var("REPOGRAPH_MODEL") {
            self.embedding.model_name = model;
        }

        if let Ok(batch_size) = std::env::var("REPOGRAPH_BATCH_SIZE")
            && let Ok(size) = batch_size.parse()
        {
            self.embedding.batch_size = size;
        }

        if let Ok(root) = std::env::var("REPOGRAPH_WORKSPACE_ROOT") {
            self.indexing.workspace_root = PathBuf::from(root);
        }

        if let Ok(timeout) = std::env::var("REPOGRAPH_RUN_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse()
        {
            self.indexing.run_timeout_secs = secs;
        }

        if let Ok(floor) = std::env::var("REPOGRAPH_SIMILARITY_FLOOR")
            && let Ok(value) = floor.parse()
        {
            self.search.similarity_floor = value;
        }
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, RepoGraphError> {
        let mut config = Self::load_or_default()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
